//! A render-graph compiler and executor sitting atop a Vulkan-class GPU API.
//!
//! Callers declare GPU work as a lazy dataflow of `Value`s (images, buffers,
//! composites) flowing through named passes; `Value::submit`/`wait`/`get`
//! compile that dataflow into a correctly synchronized, queue-scheduled
//! command stream and drive its execution.
//!
//! Compilation runs four passes in order over the IR built by the `Value`
//! façade (`value.rs`): Reify Inference (`passes::reify`) resolves
//! unspecified attachment fields, the link builder (`passes::link`) derives
//! per-resource use chains, slice resolution and reconvergence
//! (`passes::slice`, `passes::reconverge`) resolve subresource ranges and
//! detect illegal torn reads, and the scheduler (`scheduler`) assigns each
//! `CALL` to an executor domain and splices cross-domain synchronization.
//! The executor (`executor`) then walks the scheduled IR and invokes each
//! pass's callback against a backend-supplied `CommandBuffer`.
//!
//! This crate is not a scene graph, not a shader compiler, and not a memory
//! allocator: pipeline/shader compilation, device resource pools, and
//! command-buffer recording primitives are all external collaborators,
//! consumed here as the `Allocator` and `CommandBuffer` traits and an opaque
//! `PipelineBaseInfo` handle.

extern crate log;

pub mod allocator;
pub mod arena;
pub mod attachment;
pub mod command_buffer;
pub mod domain;
pub mod error;
pub mod executor;
pub mod options;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod scheduler;
pub mod signal;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use options::CompileOptions;
pub use rendergraph_macros::Composite;
pub use signal::Signal;
pub use value::{Context, Value};

// Lets `#[derive(Composite)]`'s generated `::rendergraph::types::...` paths
// resolve when exercised by this crate's own tests, the same trick
// `lgn-data-runtime` uses to test its own derive macros in-crate.
#[cfg(test)]
extern crate self as rendergraph;

#[cfg(test)]
mod tests;
