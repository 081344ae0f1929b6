//! # suzuri-kernel
//!
//! Lifecycle orchestration for a sandboxed, stateful code-execution
//! kernel, and the session machinery that mediates every asynchronous
//! execution against it.
//!
//! The [`KernelSupervisor`] owns at most one kernel against an injected
//! [`suzuri_engine::ExecutionEngine`] and exposes the full caller surface:
//! start/restart/reset/interrupt/destroy/mount, the visible status state
//! machine, `execute_code` with per-event callbacks, and the append-only
//! execution log. Each execution runs as one [`ExecutionSession`] that
//! consumes the engine's ordered event stream, reassembles stream
//! fragments into lines, and classifies result/display/error events into
//! [`OutputEvent`]s.

pub mod error;
pub mod line_buffer;
pub mod log;
pub mod notify;
pub mod output;
pub mod session;
pub mod status;
pub mod supervisor;

pub use error::{KernelError, KernelResult};
pub use line_buffer::LineBuffer;
pub use log::ExecutionLog;
pub use notify::{Notification, Severity};
pub use output::{OutputEvent, OutputKind};
pub use session::{ExecCallbacks, ExecutionSession, OutputCallback, StatusCallback};
pub use status::{ExecStatus, KernelStatus};
pub use supervisor::{
    KernelExecutor, KernelSupervisor, ReadyHook, ResetHook, SupervisorConfig, DATA_MOUNT_PATH,
    START_TIMEOUT,
};
