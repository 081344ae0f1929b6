//! Kernel lifecycle supervisor.
//!
//! The supervisor owns kernel identity and the visible status state
//! machine:
//!
//! ```text
//! Starting → Idle    creation succeeds within the ceiling
//! Starting → Error   creation fails or the ceiling expires
//! Idle → Busy        a session begins
//! Busy → Idle|Error  the session ends
//! any  → Starting    restart
//! Error → Starting   only an explicit restart leaves Error
//! ```
//!
//! The engine is an injected dependency; the supervisor holds at most one
//! live kernel against it and runs at most one session at a time (callers
//! must not overlap `execute_code` calls - overlapping behavior is
//! unspecified).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use suzuri_engine::{
    Activity, ActivityHandler, DirectoryHandle, ExecutionEngine, KernelId, KernelOptions,
    KernelSpec, MountMode,
};

use crate::error::{KernelError, KernelResult};
use crate::log::ExecutionLog;
use crate::notify::Notification;
use crate::output::OutputEvent;
use crate::session::{ExecCallbacks, ExecutionSession};
use crate::status::{ExecStatus, KernelStatus};

/// Ceiling on kernel creation. Exceeding it forces `Error` even if the
/// engine eventually comes back.
pub const START_TIMEOUT: Duration = Duration::from_secs(180);

/// Where mounted folders appear inside the kernel namespace.
pub const DATA_MOUNT_PATH: &str = "/mnt/data";

/// Engine-side payload that clears user-visible interpreter state without
/// destroying the kernel process. Opaque to the supervisor.
const RESET_STATE_CODE: &str = "%reset -f";

/// Hook invoked with the bound executor after each successful
/// (re)initialization.
pub type ReadyHook = Box<dyn Fn(KernelExecutor) + Send + Sync>;

/// Hook invoked exactly once per successful restart, so surrounding state
/// tied to the old kernel can be dropped.
pub type ResetHook = Box<dyn Fn() + Send + Sync>;

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Default kernel creation options.
    pub kernel: KernelSpec,
    /// Creation ceiling for `start_kernel`.
    pub start_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            kernel: KernelSpec::default(),
            start_timeout: START_TIMEOUT,
        }
    }
}

/// Owns kernel identity and mediates every execution against it.
pub struct KernelSupervisor {
    engine: Arc<dyn ExecutionEngine>,
    config: SupervisorConfig,
    status: Arc<watch::Sender<KernelStatus>>,
    kernel: RwLock<Option<KernelId>>,
    log: Arc<ExecutionLog>,
    /// Single-flight guard: one start in flight, concurrent calls dropped.
    starting: AtomicBool,
    active_session: Mutex<Option<CancellationToken>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notify_rx: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
    on_ready: Option<ReadyHook>,
    on_reset: Option<ResetHook>,
}

impl KernelSupervisor {
    /// Create a supervisor over `engine` with default configuration.
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self::with_config(engine, SupervisorConfig::default())
    }

    /// Create a supervisor with explicit configuration.
    pub fn with_config(engine: Arc<dyn ExecutionEngine>, config: SupervisorConfig) -> Self {
        let (status, _) = watch::channel(KernelStatus::Starting);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            config,
            status: Arc::new(status),
            kernel: RwLock::new(None),
            log: Arc::new(ExecutionLog::new()),
            starting: AtomicBool::new(false),
            active_session: Mutex::new(None),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
            on_ready: None,
            on_reset: None,
        }
    }

    /// Set the hook invoked with the bound executor on each successful
    /// (re)initialization.
    pub fn on_ready(mut self, f: impl Fn(KernelExecutor) + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Box::new(f));
        self
    }

    /// Set the hook invoked once per successful restart.
    pub fn on_reset(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Box::new(f));
        self
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Current kernel status.
    pub fn status(&self) -> KernelStatus {
        *self.status.borrow()
    }

    /// Watch status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<KernelStatus> {
        self.status.subscribe()
    }

    /// True when a kernel is alive and usable.
    pub async fn is_ready(&self) -> bool {
        self.kernel.read().await.is_some() && self.status().is_ready()
    }

    /// The current kernel id, if one is alive.
    pub async fn kernel_id(&self) -> Option<KernelId> {
        *self.kernel.read().await
    }

    /// Point-in-time copy of the execution log.
    pub fn execution_log(&self) -> Vec<OutputEvent> {
        self.log.snapshot()
    }

    /// Clear the execution log. The only way entries are ever removed.
    pub fn clear_logs(&self) {
        self.log.clear();
    }

    /// Take the notification receiver. Yields `None` after the first call.
    pub fn take_notifications(&self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.notify_rx.lock().take()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the kernel.
    ///
    /// Idempotent: while one start is in flight, further calls are
    /// dropped - they neither queue nor error - and a start with a kernel
    /// already alive is a no-op (use [`restart_kernel`] to recreate).
    /// Creation is bounded by the configured ceiling; on expiry the state
    /// is forced to `Error` and a late-resolving creation is discarded
    /// rather than reviving it.
    ///
    /// [`restart_kernel`]: Self::restart_kernel
    pub async fn start_kernel(self: &Arc<Self>) {
        if self
            .starting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("kernel start already in flight, dropping request");
            return;
        }
        // Released when the guard drops, so every exit path - including
        // this future being dropped mid-await - frees the flag.
        let _guard = StartGuard(&self.starting);

        if self.kernel.read().await.is_some() {
            debug!("kernel already alive, dropping start request");
            return;
        }
        self.start_inner().await;
    }

    async fn start_inner(self: &Arc<Self>) {
        self.set_status(KernelStatus::Starting);

        let engine = self.engine.clone();
        let spec = self.config.kernel.clone();
        let mut create = tokio::spawn(async move { engine.create(&spec).await });

        tokio::select! {
            created = &mut create => match created {
                Ok(Ok(id)) => {
                    info!(kernel = %id, "kernel created");
                    self.bind_kernel(id).await;
                }
                Ok(Err(e)) => {
                    let err = KernelError::InitializationFailure(e.to_string());
                    error!(error = %err, "kernel creation failed");
                    self.set_status(KernelStatus::Error);
                    self.notify(Notification::error(err.to_string()));
                }
                Err(e) => {
                    error!(error = %e, "kernel creation task panicked");
                    self.set_status(KernelStatus::Error);
                    self.notify(Notification::error("failed to start kernel"));
                }
            },
            _ = tokio::time::sleep(self.config.start_timeout) => {
                error!(ceiling = ?self.config.start_timeout, "kernel creation timed out");
                self.set_status(KernelStatus::Error);
                self.notify(Notification::error(
                    KernelError::InitializationTimeout.to_string(),
                ));

                // A creation resolving after the ceiling must not revive a
                // state already forced to Error. Reap it instead.
                let engine = self.engine.clone();
                tokio::spawn(async move {
                    if let Ok(Ok(id)) = create.await {
                        warn!(kernel = %id, "discarding kernel created after the ceiling");
                        if let Err(e) = engine.destroy(id).await {
                            warn!(kernel = %id, error = %e, "failed to destroy late kernel");
                        }
                    }
                });
            }
        }
    }

    /// Destroy the current kernel (if any) and create a fresh one with
    /// `options` merged over the defaults.
    ///
    /// Works with no prior kernel. Destroy failures are swallowed - they
    /// never block recreation.
    pub async fn restart_kernel(
        self: &Arc<Self>,
        options: Option<KernelOptions>,
    ) -> KernelResult<()> {
        self.set_status(KernelStatus::Starting);

        if let Some(id) = self.kernel.write().await.take() {
            if let Err(e) = self.engine.destroy(id).await {
                warn!(kernel = %id, error = %e, "failed to destroy kernel before restart");
            }
        }

        let spec = self.config.kernel.merged(options.as_ref());
        match self.engine.create(&spec).await {
            Ok(id) => {
                info!(kernel = %id, "kernel restarted");
                self.bind_kernel(id).await;
                if let Some(hook) = &self.on_reset {
                    hook();
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "kernel restart failed");
                self.set_status(KernelStatus::Error);
                self.notify(Notification::error(format!("failed to restart kernel: {e}")));
                Err(KernelError::RestartFailure(e.to_string()))
            }
        }
    }

    /// Clear user-visible interpreter state without destroying the kernel.
    ///
    /// Falls back to a full restart when no kernel is usable. Never leaves
    /// the status `Busy`.
    pub async fn reset_kernel_state(self: &Arc<Self>) -> KernelResult<()> {
        if !self.is_ready().await {
            return self.restart_kernel(None).await;
        }
        self.execute_code(RESET_STATE_CODE, ExecCallbacks::new(), None)
            .await
            .map(|_| ())
    }

    /// Request cooperative interruption of the running code.
    ///
    /// Returns `false` (after a notification) when no kernel is alive.
    /// Does not change the kernel status itself - state changes only
    /// arrive through the in-flight session's stream, since interruption
    /// does not guarantee immediate termination.
    pub async fn interrupt_kernel(&self) -> bool {
        let Some(id) = *self.kernel.read().await else {
            warn!("interrupt requested with no active kernel");
            self.notify(Notification::warning(
                KernelError::InterruptUnavailable.to_string(),
            ));
            return false;
        };

        match self.engine.interrupt(id).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(kernel = %id, error = %e, "interrupt request failed");
                self.notify(Notification::warning(format!("interrupt failed: {e}")));
                false
            }
        }
    }

    /// Best-effort teardown of the current kernel. Clears identity; engine
    /// failures are logged, never raised.
    pub async fn destroy_current_kernel(&self) {
        if let Some(token) = self.active_session.lock().take() {
            token.cancel();
        }
        if let Some(id) = self.kernel.write().await.take() {
            if let Err(e) = self.engine.destroy(id).await {
                warn!(kernel = %id, error = %e, "failed to destroy kernel");
            }
        }
    }

    /// Bind an external directory at [`DATA_MOUNT_PATH`] inside the
    /// kernel namespace.
    ///
    /// Fails with [`KernelError::MountUnavailable`] when no kernel is
    /// alive or the engine lacks the mount capability; the kernel status
    /// is unchanged either way.
    pub async fn mount_folder(&self, dir: DirectoryHandle) -> KernelResult<()> {
        let Some(id) = *self.kernel.read().await else {
            return Err(KernelError::MountUnavailable);
        };

        let handle = self.engine.resolve(id).await.map_err(|e| {
            debug!(kernel = %id, error = %e, "kernel resolve failed");
            KernelError::MountUnavailable
        })?;
        let Some(fs) = handle.mount_fs() else {
            return Err(KernelError::MountUnavailable);
        };

        fs.bind(DATA_MOUNT_PATH, dir, MountMode::ReadWrite).await?;
        info!(kernel = %id, path = DATA_MOUNT_PATH, "folder mounted");
        Ok(())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run `code` against the current kernel through one session.
    ///
    /// The status is `Busy` exactly while the session consumes the stream
    /// and returns to `Idle` on every exit path; the session outcome is
    /// reported through `callbacks` and the returned [`ExecStatus`].
    pub async fn execute_code(
        &self,
        code: &str,
        callbacks: ExecCallbacks,
        timeout: Option<Duration>,
    ) -> KernelResult<ExecStatus> {
        let Some(id) = *self.kernel.read().await else {
            return Err(KernelError::NotReady);
        };
        debug!(kernel = %id, bytes = code.len(), "executing code");

        let session = ExecutionSession::new(self.log.clone(), callbacks);
        *self.active_session.lock() = Some(session.cancel_token());

        self.set_status(KernelStatus::Busy);
        let status = match self.engine.open_stream(id, code).await {
            Ok(stream) => session.run(stream, timeout).await,
            // The stream never opened: same contract as it breaking mid-way.
            Err(e) => session.fail_transport(&e.to_string()),
        };
        *self.active_session.lock() = None;
        self.set_status(KernelStatus::Idle);

        debug!(kernel = %id, status = %status, "execution finished");
        Ok(status)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Record the new kernel, wire activity listeners, go Idle, and hand
    /// the bound executor to the ready hook.
    async fn bind_kernel(self: &Arc<Self>, id: KernelId) {
        *self.kernel.write().await = Some(id);

        let status = self.status.clone();
        let handler: ActivityHandler = Arc::new(move |activity| {
            let next = match activity {
                Activity::Busy => KernelStatus::Busy,
                Activity::Idle => KernelStatus::Idle,
            };
            status.send_if_modified(|current| {
                // Error is sticky until an explicit restart.
                if *current == KernelStatus::Error || *current == next {
                    return false;
                }
                *current = next;
                true
            });
        });
        if let Err(e) = self.engine.subscribe(id, handler).await {
            warn!(kernel = %id, error = %e, "failed to subscribe to kernel activity");
        }

        self.set_status(KernelStatus::Idle);
        if let Some(hook) = &self.on_ready {
            hook(KernelExecutor {
                supervisor: Arc::clone(self),
            });
        }
    }

    fn set_status(&self, status: KernelStatus) {
        self.status.send_replace(status);
    }

    /// Surface a failure to the caller exactly once.
    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }
}

/// Releases the start single-flight flag on drop.
struct StartGuard<'a>(&'a AtomicBool);

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for KernelSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSupervisor")
            .field("status", &self.status())
            .field("starting", &self.starting.load(Ordering::SeqCst))
            .finish()
    }
}

/// The bound execution function handed to the ready hook.
///
/// Cheap to clone; every clone talks to the same supervisor and kernel.
#[derive(Clone)]
pub struct KernelExecutor {
    supervisor: Arc<KernelSupervisor>,
}

impl KernelExecutor {
    /// Execute `code` against the bound kernel.
    pub async fn execute(
        &self,
        code: &str,
        callbacks: ExecCallbacks,
        timeout: Option<Duration>,
    ) -> KernelResult<ExecStatus> {
        self.supervisor.execute_code(code, callbacks, timeout).await
    }

    /// Request cooperative interruption of the running code.
    pub async fn interrupt(&self) -> bool {
        self.supervisor.interrupt_kernel().await
    }

    /// The supervisor this executor is bound to.
    pub fn supervisor(&self) -> &Arc<KernelSupervisor> {
        &self.supervisor
    }
}

impl std::fmt::Debug for KernelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelExecutor").finish()
    }
}
