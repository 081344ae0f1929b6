//! A scriptable in-memory engine for tests.
//!
//! Each `open_stream` call pops the next queued script and plays it back
//! as the event stream. Creation delay and failure are configurable so
//! lifecycle tests can exercise timeouts and single-flight behavior.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::engine::{
    Activity, ActivityHandler, ExecEventStream, ExecutionEngine, KernelHandle, KernelSpec,
};
use crate::error::{EngineError, EngineResult};
use crate::event::ExecEvent;
use crate::fs::MemoryMountFs;
use crate::id::KernelId;

#[derive(Default)]
struct MockState {
    create_delay: Duration,
    fail_create: bool,
    interrupt_accepted: bool,
    scripts: VecDeque<Vec<EngineResult<ExecEvent>>>,
    handlers: Vec<ActivityHandler>,
    alive: Option<KernelId>,
    created: Vec<KernelId>,
    destroyed: Vec<KernelId>,
    interrupts: usize,
    create_calls: usize,
    specs: Vec<KernelSpec>,
    executions: Vec<String>,
}

/// Scriptable fake [`ExecutionEngine`].
pub struct MockEngine {
    state: Mutex<MockState>,
    fs: Option<Arc<MemoryMountFs>>,
}

impl MockEngine {
    /// An engine with no mount capability and instant creation.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                interrupt_accepted: true,
                ..MockState::default()
            }),
            fs: None,
        }
    }

    /// An engine whose resolved handles expose a recording [`MemoryMountFs`].
    pub fn with_mount_fs() -> Self {
        Self {
            fs: Some(Arc::new(MemoryMountFs::new())),
            ..Self::new()
        }
    }

    /// Delay every `create` call by `delay`.
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().create_delay = delay;
    }

    /// Make every `create` call fail.
    pub fn fail_create(&self) {
        self.state.lock().fail_create = true;
    }

    /// Set the boolean result of `interrupt`.
    pub fn set_interrupt_accepted(&self, accepted: bool) {
        self.state.lock().interrupt_accepted = accepted;
    }

    /// Queue the event script for the next `open_stream` call.
    pub fn push_script(&self, events: Vec<EngineResult<ExecEvent>>) {
        self.state.lock().scripts.push_back(events);
    }

    /// Queue a script of plain events (no transport failures).
    pub fn push_events(&self, events: Vec<ExecEvent>) {
        self.push_script(events.into_iter().map(Ok).collect());
    }

    /// Fan an activity change out to every subscribed handler.
    pub fn emit_activity(&self, activity: Activity) {
        let handlers = self.state.lock().handlers.clone();
        for handler in handlers {
            handler(activity);
        }
    }

    /// How many times `create` was called.
    pub fn create_calls(&self) -> usize {
        self.state.lock().create_calls
    }

    /// Every kernel id handed out, in order.
    pub fn created(&self) -> Vec<KernelId> {
        self.state.lock().created.clone()
    }

    /// Every kernel id destroyed, in order.
    pub fn destroyed(&self) -> Vec<KernelId> {
        self.state.lock().destroyed.clone()
    }

    /// How many times `interrupt` was called.
    pub fn interrupts(&self) -> usize {
        self.state.lock().interrupts
    }

    /// Every spec passed to `create`, in order.
    pub fn specs(&self) -> Vec<KernelSpec> {
        self.state.lock().specs.clone()
    }

    /// Every code payload submitted through `open_stream`, in order.
    pub fn executions(&self) -> Vec<String> {
        self.state.lock().executions.clone()
    }

    /// The recording mount backend, when constructed with one.
    pub fn mount_fs(&self) -> Option<Arc<MemoryMountFs>> {
        self.fs.clone()
    }

    fn check_alive(&self, id: KernelId) -> EngineResult<()> {
        if self.state.lock().alive == Some(id) {
            Ok(())
        } else {
            Err(EngineError::KernelNotFound(id))
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    async fn create(&self, spec: &KernelSpec) -> EngineResult<KernelId> {
        let (delay, fail) = {
            let mut state = self.state.lock();
            state.create_calls += 1;
            state.specs.push(spec.clone());
            (state.create_delay, state.fail_create)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(EngineError::other("kernel creation refused"));
        }

        let id = KernelId::new();
        debug!(kernel = %id, "mock kernel created");
        let mut state = self.state.lock();
        state.alive = Some(id);
        state.created.push(id);
        state.handlers.clear();
        Ok(id)
    }

    async fn destroy(&self, id: KernelId) -> EngineResult<()> {
        debug!(kernel = %id, "mock kernel destroyed");
        let mut state = self.state.lock();
        if state.alive == Some(id) {
            state.alive = None;
        }
        state.destroyed.push(id);
        Ok(())
    }

    async fn open_stream(&self, id: KernelId, code: &str) -> EngineResult<ExecEventStream> {
        self.check_alive(id)?;
        let script = {
            let mut state = self.state.lock();
            state.executions.push(code.to_string());
            state.scripts.pop_front().unwrap_or_default()
        };
        Ok(futures::stream::iter(script).boxed())
    }

    async fn interrupt(&self, id: KernelId) -> EngineResult<bool> {
        self.check_alive(id)?;
        let mut state = self.state.lock();
        state.interrupts += 1;
        Ok(state.interrupt_accepted)
    }

    async fn subscribe(&self, id: KernelId, handler: ActivityHandler) -> EngineResult<()> {
        self.check_alive(id)?;
        self.state.lock().handlers.push(handler);
        Ok(())
    }

    async fn resolve(&self, id: KernelId) -> EngineResult<KernelHandle> {
        self.check_alive(id)?;
        Ok(match &self.fs {
            Some(fs) => KernelHandle::with_fs(id, fs.clone()),
            None => KernelHandle::new(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_lifecycle() {
        let engine = MockEngine::new();
        let id = engine.create(&KernelSpec::default()).await.unwrap();
        assert_eq!(engine.create_calls(), 1);
        assert_eq!(engine.created(), vec![id]);

        engine.destroy(id).await.unwrap();
        assert_eq!(engine.destroyed(), vec![id]);
        assert!(matches!(
            engine.open_stream(id, "1 + 1").await,
            Err(EngineError::KernelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_plays_back_script() {
        let engine = MockEngine::new();
        let id = engine.create(&KernelSpec::default()).await.unwrap();

        engine.push_events(vec![ExecEvent::stdout("hi\n")]);
        let mut stream = engine.open_stream(id, "print('hi')").await.unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            ExecEvent::stdout("hi\n")
        );
        assert!(stream.next().await.is_none());
    }
}
