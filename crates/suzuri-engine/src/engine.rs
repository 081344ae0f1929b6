//! The execution engine adapter trait.
//!
//! The engine is an opaque sandbox that actually runs code. The
//! orchestrator talks to it exclusively through [`ExecutionEngine`], which
//! makes the engine an explicit, injectable dependency - tests swap in a
//! fake, production wires up the real sandbox.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::EngineResult;
use crate::event::ExecEvent;
use crate::fs::MountFs;
use crate::id::KernelId;

/// One ordered async event sequence for one submission.
pub type ExecEventStream = BoxStream<'static, EngineResult<ExecEvent>>;

/// Kernel activity reported by the engine outside any one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// The kernel started working.
    Busy,
    /// The kernel went back to waiting for input.
    Idle,
}

/// Callback invoked on kernel activity changes.
pub type ActivityHandler = Arc<dyn Fn(Activity) + Send + Sync>;

/// Isolation mode for a new kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelMode {
    /// Fully sandboxed; no ambient host access.
    Sandboxed,
    /// Trusted; the engine may grant host capabilities.
    Trusted,
}

impl Default for KernelMode {
    fn default() -> Self {
        Self::Sandboxed
    }
}

/// Creation options for a kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Isolation mode.
    pub mode: KernelMode,
    /// Language runtime to boot.
    pub language: String,
    /// Whether the engine should sync its filesystem namespace to the host.
    pub filesystem_sync: bool,
    /// Engine-specific options, passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, serde_json::Value>,
}

impl Default for KernelSpec {
    fn default() -> Self {
        Self {
            mode: KernelMode::Sandboxed,
            language: "python".to_string(),
            filesystem_sync: true,
            overrides: BTreeMap::new(),
        }
    }
}

impl KernelSpec {
    /// This spec with `options` merged over it. Absent option fields keep
    /// the spec's values; override entries replace same-keyed ones.
    pub fn merged(&self, options: Option<&KernelOptions>) -> Self {
        let mut spec = self.clone();
        if let Some(opts) = options {
            if let Some(mode) = opts.mode {
                spec.mode = mode;
            }
            if let Some(language) = &opts.language {
                spec.language = language.clone();
            }
            if let Some(sync) = opts.filesystem_sync {
                spec.filesystem_sync = sync;
            }
            spec.overrides
                .extend(opts.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        spec
    }
}

/// Partial [`KernelSpec`]: only the fields the caller wants to change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelOptions {
    /// Replacement isolation mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<KernelMode>,
    /// Replacement language runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Replacement filesystem-sync flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_sync: Option<bool>,
    /// Extra engine-specific options, merged over the spec's.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, serde_json::Value>,
}

/// A resolved kernel: identity plus optional capabilities.
#[derive(Clone)]
pub struct KernelHandle {
    /// The kernel this handle resolves.
    pub id: KernelId,
    fs: Option<Arc<dyn MountFs>>,
}

impl KernelHandle {
    /// A handle without any filesystem capability.
    pub fn new(id: KernelId) -> Self {
        Self { id, fs: None }
    }

    /// A handle exposing a mount-filesystem capability.
    pub fn with_fs(id: KernelId, fs: Arc<dyn MountFs>) -> Self {
        Self { id, fs: Some(fs) }
    }

    /// The mount capability, if this kernel's engine provides one.
    pub fn mount_fs(&self) -> Option<Arc<dyn MountFs>> {
        self.fs.clone()
    }
}

impl std::fmt::Debug for KernelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelHandle")
            .field("id", &self.id)
            .field("fs", &self.fs.as_ref().map(|_| "<capability>"))
            .finish()
    }
}

/// Trait for execution engines.
///
/// Everything here may suspend: creation, each stream pull, interrupt and
/// destroy all cross into the sandbox.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Boot a new kernel and return its id.
    async fn create(&self, spec: &KernelSpec) -> EngineResult<KernelId>;

    /// Tear down a kernel. The id is invalid afterwards.
    async fn destroy(&self, id: KernelId) -> EngineResult<()>;

    /// Submit `code` and open its ordered event stream.
    async fn open_stream(&self, id: KernelId, code: &str) -> EngineResult<ExecEventStream>;

    /// Request cooperative interruption of whatever `id` is running.
    ///
    /// Returns whether the engine accepted the request. Acceptance does
    /// not mean the running code stopped - the active stream keeps
    /// emitting whatever the kernel still produces.
    async fn interrupt(&self, id: KernelId) -> EngineResult<bool>;

    /// Register a handler for busy/idle activity of `id`.
    async fn subscribe(&self, id: KernelId, handler: ActivityHandler) -> EngineResult<()>;

    /// Resolve `id` into a handle exposing optional capabilities.
    async fn resolve(&self, id: KernelId) -> EngineResult<KernelHandle>;
}
