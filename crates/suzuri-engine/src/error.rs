//! Engine error types.

use thiserror::Error;

use crate::id::KernelId;

/// Errors reported by an execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No kernel with this id is alive in the engine.
    #[error("kernel not found: {0}")]
    KernelNotFound(KernelId),

    /// The kernel process died or became unreachable.
    #[error("kernel crashed: {0}")]
    Crashed(String),

    /// The engine does not support the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The event stream itself failed, as opposed to the executed code.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Other engine-level error.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create a Crashed error.
    pub fn crashed(msg: impl Into<String>) -> Self {
        Self::Crashed(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a Transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Engine result type.
pub type EngineResult<T> = Result<T, EngineError>;
