//! Error types for every stage of the embedding: compilation, linking,
//! instantiation, export lookup, calls and WASI setup.
//!
//! Each stage has its own enum so callers can branch on the exact failure;
//! [`Error`] gathers them for code that only wants one type.

use crate::types::{ExternKind, FunctionType};
use thiserror::Error;

/// Failure to turn bytes or text into a [`crate::Module`].
#[derive(Error, Debug)]
pub enum CompileError {
    /// The text format could not be parsed. The message carries the position.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The engine rejected the binary.
    #[error("invalid module: {0}")]
    Invalid(String),

    /// Serializing or deserializing a compiled artifact failed.
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Failure to resolve a module's imports against an import object.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("unknown import module '{module}' (needed for '{module}.{name}')")]
    MissingModule { module: String, name: String },

    #[error("unknown import '{module}.{name}'")]
    MissingField { module: String, name: String },

    #[error("import '{module}.{name}' expects a {expected}, but a {actual} was provided")]
    KindMismatch {
        module: String,
        name: String,
        expected: ExternKind,
        actual: ExternKind,
    },

    #[error("import '{module}.{name}' has an incompatible type: expected {expected}, got {actual}")]
    SignatureMismatch {
        module: String,
        name: String,
        expected: String,
        actual: String,
    },

    /// Only raised when the import object is in strict mode.
    #[error("import '{module}.{name}' is provided but never imported by the module")]
    UnusedImport { module: String, name: String },

    /// The import object was generated for a store on another engine.
    #[error("import module '{module}' was generated for a different engine")]
    EngineMismatch { module: String },

    /// The engine refused to create a host value for an import.
    #[error("failed to create import '{module}.{name}': {message}")]
    Materialize {
        module: String,
        name: String,
        message: String,
    },
}

/// Failure to create an [`crate::Instance`].
#[derive(Error, Debug)]
pub enum InstantiationError {
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The start function trapped.
    #[error("start function trapped: {message}")]
    Trap { message: String },

    #[error("instantiation failed: {0}")]
    Engine(String),
}

/// Failure to resolve an export by name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("no export named '{name}'")]
    NotFound { name: String },

    #[error("export '{name}' is a {actual}, not a {expected}")]
    WrongKind {
        name: String,
        expected: ExternKind,
        actual: ExternKind,
    },
}

/// Failure to call an exported function.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("signature mismatch calling {expected}: {reason}")]
    SignatureMismatch {
        expected: FunctionType,
        reason: String,
    },

    #[error("trap: {message}")]
    Trap { message: String },

    /// The guest called WASI `proc_exit`.
    #[error("program exited with code {code}")]
    Exit { code: i32 },

    #[error(transparent)]
    Reentrant(#[from] ReentrantAccess),
}

/// An export wrapper was used from a host function while its own instance
/// was running that host function on the same thread.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("re-entrant access to a running instance from one of its host functions")]
pub struct ReentrantAccess;

/// Failure to detect or provide a WASI version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("module does not import any WASI namespace")]
    NotWasi,

    #[error("module imports from several WASI snapshots: {namespaces:?}")]
    Ambiguous { namespaces: Vec<String> },

    #[error("unsupported WASI version: {0}")]
    Unsupported(String),
}

/// Failure accessing an exported memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("access of {len} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: usize, len: usize },

    #[error("failed to grow memory by {delta} pages: {message}")]
    Grow { delta: u64, message: String },

    #[error(transparent)]
    Reentrant(#[from] ReentrantAccess),
}

/// Failure accessing an exported global.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlobalError {
    #[error("global is immutable")]
    Immutable,

    #[error("global has type {expected}, got a {actual} value")]
    TypeMismatch { expected: String, actual: String },

    #[error("global access failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Reentrant(#[from] ReentrantAccess),
}

/// Failure to finalize a WASI state builder.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("invalid environment variable {key:?}: {reason}")]
    InvalidEnvironment { key: String, reason: &'static str },

    #[error("cannot map directory '{alias}' to {path}: {reason}")]
    InvalidDirectory {
        alias: String,
        path: String,
        reason: String,
    },
}

/// Failure to build an engine from a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("engine rejected configuration: {0}")]
    Engine(String),
}

/// Any error produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Instantiation(#[from] InstantiationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Global(#[from] GlobalError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
