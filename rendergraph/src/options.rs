//! Compiler options, chosen at submission time.

/// Opaque compile parameters threaded through `compile`/`submit`.
///
/// Unlike `Allocator` or `CommandBuffer`, this is a plain value, not a
/// trait: the set of knobs is closed and small, so there is nothing for a
/// caller to customize beyond setting these fields.
#[derive(Copy, Clone, Debug)]
pub struct CompileOptions {
    /// Dump the linked IR (post Reify Inference, post Link) to the log at
    /// `debug` level before scheduling. Off by default; expensive on large
    /// graphs.
    pub dump_graph: bool,
    /// Treat the first `GraphError` encountered during the link/reify
    /// passes as fatal instead of collecting and reporting all of them.
    pub fail_fast: bool,
    /// Opaque key used to look up a previously scheduled plan for a
    /// structurally identical graph. `None` disables the cache.
    pub graph_cache_key: Option<u64>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            dump_graph: false,
            fail_fast: true,
            graph_cache_key: None,
        }
    }
}
