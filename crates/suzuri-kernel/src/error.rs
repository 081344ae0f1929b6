//! Supervisor error types.

use thiserror::Error;

use suzuri_engine::EngineError;

/// Errors surfaced by the kernel supervisor.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Kernel creation exceeded the startup ceiling.
    #[error("kernel initialization timed out")]
    InitializationTimeout,

    /// The engine rejected kernel creation.
    #[error("kernel initialization failed: {0}")]
    InitializationFailure(String),

    /// Recreation failed after the previous kernel was destroyed.
    #[error("kernel restart failed: {0}")]
    RestartFailure(String),

    /// No kernel alive, or the engine lacks the mount capability.
    #[error("mount unavailable")]
    MountUnavailable,

    /// No active kernel to interrupt.
    #[error("no active kernel to interrupt")]
    InterruptUnavailable,

    /// No kernel is alive to execute against.
    #[error("kernel not ready")]
    NotReady,

    /// Engine-level failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Supervisor result type.
pub type KernelResult<T> = Result<T, KernelError>;
