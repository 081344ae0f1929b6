//! # suzuri-engine
//!
//! The engine boundary for suzuri: everything the orchestrator needs from
//! the sandboxed code-execution engine, and nothing else.
//!
//! The engine is opaque. It runs submitted code in an isolated context and
//! reports back through an ordered async event stream. This crate defines:
//!
//! - [`ExecutionEngine`] - the adapter trait (create/destroy/stream/interrupt/mount)
//! - [`ExecEvent`] - the wire-level events a stream yields
//! - [`KernelSpec`] / [`KernelOptions`] - creation options and overrides
//! - [`MountFs`] - the one-operation bind-directory-to-path capability
//! - [`MockEngine`] - a scriptable fake engine (behind the `test-mock` feature)

pub mod engine;
pub mod error;
pub mod event;
pub mod fs;
pub mod id;

#[cfg(any(test, feature = "test-mock"))]
pub mod mock;

pub use engine::{
    Activity, ActivityHandler, ExecEventStream, ExecutionEngine, KernelHandle, KernelMode,
    KernelOptions, KernelSpec,
};
pub use error::{EngineError, EngineResult};
pub use event::{ExecEvent, ReprBundle, StreamChannel, NO_VALUE_REPR};
pub use fs::{DirectoryHandle, MemoryMountFs, MountFs, MountMode};
pub use id::KernelId;

#[cfg(any(test, feature = "test-mock"))]
pub use mock::MockEngine;
