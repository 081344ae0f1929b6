//! Filesystem capability at the engine boundary.
//!
//! Some engines can bind an externally supplied directory into the
//! kernel's namespace. The capability is deliberately narrow: one
//! operation, bind-directory-to-path, satisfiable by any concrete backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;

use crate::error::EngineResult;

/// An externally supplied directory capability.
///
/// The orchestrator never opens it - it only forwards it to the engine,
/// which materializes the directory inside the kernel namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHandle {
    /// Human-readable label (typically the directory name).
    pub label: String,
    /// Backend-specific location of the directory.
    pub path: PathBuf,
}

impl DirectoryHandle {
    /// Create a handle for a directory at `path`.
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Access mode for a bound directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// Kernel may only read from the directory.
    ReadOnly,
    /// Kernel may read and write.
    ReadWrite,
}

/// Bind-directory-to-path capability.
#[async_trait]
pub trait MountFs: Send + Sync {
    /// Bind `dir` at `path` inside the kernel namespace.
    async fn bind(&self, path: &str, dir: DirectoryHandle, mode: MountMode) -> EngineResult<()>;
}

/// An in-memory [`MountFs`] that records every bind. For tests.
#[derive(Debug, Default)]
pub struct MemoryMountFs {
    binds: Mutex<Vec<(String, DirectoryHandle, MountMode)>>,
}

impl MemoryMountFs {
    /// Create an empty recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// All binds recorded so far, in order.
    pub fn binds(&self) -> Vec<(String, DirectoryHandle, MountMode)> {
        self.binds.lock().clone()
    }
}

#[async_trait]
impl MountFs for MemoryMountFs {
    async fn bind(&self, path: &str, dir: DirectoryHandle, mode: MountMode) -> EngineResult<()> {
        self.binds.lock().push((path.to_string(), dir, mode));
        Ok(())
    }
}
