//! Error type.
//!
//! This is the shared error type for the whole crate. Every fallible
//! operation returns a `Result<T>`; the core never panics on caller input
//! and never logs errors itself (callers decide what to do with them).

use std::{error, fmt};

/// Failure reported by an `Allocator` when it cannot satisfy a request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocateError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    Fragmentation,
    ResourceExhausted,
}

/// Failure reported by the (external) shader/pipeline front end.
///
/// The core only stores these verbatim; it never produces them itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShaderCompileError {
    Syntax,
    Link,
    UnsupportedFeature,
}

/// Failure detected while building or analyzing the IR.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GraphError {
    UnattachedResource,
    TypeMismatch,
    AttachmentInconsistency,
    UseBeforeInit,
    CyclicDependency,
    TimeTravel,
    InvalidSlice,
    IncompleteConstruct,
}

/// Failure observed at submission or execution time, surfaced via `Signal`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RuntimeError {
    SubmitFailed,
    DeviceLost,
    Timeout,
    PresentOutOfDate,
}

/// Caller misuse of the `Value`/`Signal` API.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvalidState {
    DoubleSubmit,
    ValueAlreadyConsumed,
}

/// Failure raised while constructing or interning a `Type`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvalidType {
    NegativeArrayCount,
    MismatchedMemberOffsets,
    NullCallback,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    Allocate(AllocateError),
    ShaderCompile(ShaderCompileError),
    Graph(GraphError),
    Runtime(RuntimeError),
    InvalidState(InvalidState),
    InvalidType(InvalidType),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Allocate(e) => write!(f, "allocation failed: {:?}", e),
            Error::ShaderCompile(e) => write!(f, "shader compilation failed: {:?}", e),
            Error::Graph(e) => write!(f, "render graph error: {:?}", e),
            Error::Runtime(e) => write!(f, "runtime error: {:?}", e),
            Error::InvalidState(e) => write!(f, "invalid state: {:?}", e),
            Error::InvalidType(e) => write!(f, "invalid type: {:?}", e),
        }
    }
}

impl error::Error for Error {}

impl From<AllocateError> for Error {
    fn from(e: AllocateError) -> Self {
        Error::Allocate(e)
    }
}

impl From<ShaderCompileError> for Error {
    fn from(e: ShaderCompileError) -> Self {
        Error::ShaderCompile(e)
    }
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Graph(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

impl From<InvalidState> for Error {
    fn from(e: InvalidState) -> Self {
        Error::InvalidState(e)
    }
}

impl From<InvalidType> for Error {
    fn from(e: InvalidType) -> Self {
        Error::InvalidType(e)
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
