//! Execution sessions.
//!
//! One session mediates one submission against the active kernel: it pulls
//! the engine's ordered event stream, reassembles stream fragments into
//! lines, classifies result/display/error events, appends everything to
//! the execution log, and invokes the caller's callbacks. The loop is
//! pull-one/branch-on-kind/repeat, cancellable through a cooperative
//! [`CancellationToken`].

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use suzuri_engine::{EngineResult, ExecEvent, ExecEventStream, ReprBundle, StreamChannel,
    NO_VALUE_REPR};

use crate::line_buffer::LineBuffer;
use crate::log::ExecutionLog;
use crate::output::{OutputEvent, OutputKind};
use crate::status::ExecStatus;

/// Callback invoked for every output event, in emission order.
pub type OutputCallback = Arc<dyn Fn(&OutputEvent) + Send + Sync>;

/// Callback invoked once with the session's final status.
pub type StatusCallback = Arc<dyn Fn(ExecStatus) + Send + Sync>;

/// Optional caller callbacks for one execution.
///
/// Output is appended to the execution log whether or not callbacks are
/// registered; the log grows identically either way.
#[derive(Clone, Default)]
pub struct ExecCallbacks {
    /// Receives each output event as it is emitted.
    pub on_output: Option<OutputCallback>,
    /// Receives the final session status.
    pub on_status: Option<StatusCallback>,
}

impl ExecCallbacks {
    /// No callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-event output callback.
    pub fn on_output(mut self, f: impl Fn(&OutputEvent) + Send + Sync + 'static) -> Self {
        self.on_output = Some(Arc::new(f));
        self
    }

    /// Set the final-status callback.
    pub fn on_status(mut self, f: impl Fn(ExecStatus) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ExecCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCallbacks")
            .field("on_output", &self.on_output.is_some())
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

/// What one stream pull produced.
enum Pull {
    Item(Option<EngineResult<ExecEvent>>),
    Elapsed,
}

/// Per-call coordinator for one execution stream.
pub struct ExecutionSession {
    log: Arc<ExecutionLog>,
    callbacks: ExecCallbacks,
    stdout: LineBuffer,
    stderr: LineBuffer,
    errored: bool,
    cancel: CancellationToken,
}

impl ExecutionSession {
    /// Create a session that appends to `log`.
    pub fn new(log: Arc<ExecutionLog>, callbacks: ExecCallbacks) -> Self {
        Self {
            log,
            callbacks,
            stdout: LineBuffer::new(),
            stderr: LineBuffer::new(),
            errored: false,
            cancel: CancellationToken::new(),
        }
    }

    /// The session's cooperative cancellation token.
    ///
    /// Cancelling stops stream consumption at the next pull; it does not
    /// reach into the engine.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume the stream to completion and return the final status.
    ///
    /// `timeout` bounds the whole session; an elapsed deadline is treated
    /// like a transport failure.
    pub async fn run(mut self, mut stream: ExecEventStream, timeout: Option<Duration>) -> ExecStatus {
        let deadline = timeout.map(|t| Instant::now() + t);
        let cancel = self.cancel.clone();

        loop {
            let pull = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session cancelled, stopping stream consumption");
                    break;
                }
                pull = Self::pull(&mut stream, deadline) => pull,
            };

            match pull {
                Pull::Elapsed => return self.fail_transport("execution timed out"),
                Pull::Item(None) => break,
                Pull::Item(Some(Ok(event))) => self.handle_event(event),
                Pull::Item(Some(Err(e))) => return self.fail_transport(&e.to_string()),
            }
        }

        self.flush();
        let status = if self.errored {
            ExecStatus::Error
        } else {
            ExecStatus::Completed
        };
        self.emit_status(status);
        status
    }

    /// Finish the session on a transport failure: the stream itself broke,
    /// as opposed to the executed code raising. Emits exactly one error
    /// event carrying the failure message.
    pub fn fail_transport(mut self, message: &str) -> ExecStatus {
        warn!(error = message, "execution stream failed");
        self.emit(OutputEvent::error(message));
        self.emit_status(ExecStatus::Error);
        ExecStatus::Error
    }

    async fn pull(stream: &mut ExecEventStream, deadline: Option<Instant>) -> Pull {
        match deadline {
            Some(at) => match tokio::time::timeout_at(at, stream.next()).await {
                Ok(item) => Pull::Item(item),
                Err(_) => Pull::Elapsed,
            },
            None => Pull::Item(stream.next().await),
        }
    }

    fn handle_event(&mut self, event: ExecEvent) {
        match event {
            ExecEvent::Stream { channel, text } => self.handle_stream(channel, &text),
            ExecEvent::ExecuteResult { data } => self.handle_result(&data),
            ExecEvent::DisplayData { data } => self.handle_display(&data),
            ExecEvent::ExecuteError {
                ename,
                evalue,
                traceback,
            } => self.handle_error(ename, evalue, &traceback),
        }
    }

    fn handle_stream(&mut self, channel: StreamChannel, text: &str) {
        let (buffer, kind) = match channel {
            StreamChannel::Stdout => (&mut self.stdout, OutputKind::Stdout),
            StreamChannel::Stderr => (&mut self.stderr, OutputKind::Stderr),
        };
        for line in buffer.push(text) {
            let event = OutputEvent::new(kind, line);
            self.emit(event);
        }
    }

    fn handle_result(&mut self, data: &ReprBundle) {
        match &data.text_plain {
            // The engine's "no value" marker carries nothing to show.
            Some(text) if text == NO_VALUE_REPR => {}
            Some(text) => self.emit(OutputEvent::result(text.as_str())),
            None => {
                let fallback = serde_json::to_string(data).unwrap_or_default();
                self.emit(OutputEvent::result(fallback));
            }
        }
    }

    fn handle_display(&mut self, data: &ReprBundle) {
        if let Some(bytes) = &data.image_png {
            self.emit(OutputEvent::image_png(bytes));
        } else if let Some(markup) = &data.text_html {
            self.emit(OutputEvent::html(markup.as_str()));
        } else if let Some(text) = &data.text_plain {
            self.emit(OutputEvent::result(text.as_str()));
        }
    }

    fn handle_error(&mut self, ename: Option<String>, evalue: Option<String>, traceback: &[String]) {
        self.errored = true;
        let name = ename.as_deref().unwrap_or("ExecutionError");
        let value = evalue.as_deref().unwrap_or("unknown error");
        self.emit(OutputEvent::error(format!("{name}: {value}")));

        for line in traceback {
            if !line.is_empty() {
                self.emit(OutputEvent::stderr(line.as_str()));
            }
        }
    }

    /// Emit the unterminated tails of both channels.
    fn flush(&mut self) {
        if let Some(tail) = self.stdout.take_remainder() {
            self.emit(OutputEvent::stdout(tail));
        }
        if let Some(tail) = self.stderr.take_remainder() {
            self.emit(OutputEvent::stderr(tail));
        }
    }

    /// Log first, then deliver. The log grows even with no callback.
    fn emit(&mut self, event: OutputEvent) {
        self.log.append(event.clone());
        if let Some(cb) = &self.callbacks.on_output {
            cb(&event);
        }
    }

    fn emit_status(&self, status: ExecStatus) {
        if let Some(cb) = &self.callbacks.on_status {
            cb(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use parking_lot::Mutex;
    use suzuri_engine::EngineError;

    fn collecting_callbacks(
        outputs: &Arc<Mutex<Vec<OutputEvent>>>,
        statuses: &Arc<Mutex<Vec<ExecStatus>>>,
    ) -> ExecCallbacks {
        let outputs = outputs.clone();
        let statuses = statuses.clone();
        ExecCallbacks::new()
            .on_output(move |event| outputs.lock().push(event.clone()))
            .on_status(move |status| statuses.lock().push(status))
    }

    async fn run_session(
        events: Vec<EngineResult<ExecEvent>>,
    ) -> (ExecStatus, Vec<OutputEvent>, Vec<ExecStatus>) {
        let log = Arc::new(ExecutionLog::new());
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let session = ExecutionSession::new(log, collecting_callbacks(&outputs, &statuses));

        let status = session
            .run(stream::iter(events).boxed(), None)
            .await;
        let outputs = outputs.lock().clone();
        let statuses = statuses.lock().clone();
        (status, outputs, statuses)
    }

    #[tokio::test]
    async fn test_line_reassembly_and_flush() {
        let (status, outputs, _) = run_session(vec![
            Ok(ExecEvent::stdout("ab")),
            Ok(ExecEvent::stdout("cd\nef")),
        ])
        .await;

        assert_eq!(status, ExecStatus::Completed);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].content, "abcd");
        assert_eq!(outputs[0].kind, OutputKind::Stdout);
        assert_eq!(outputs[1].content, "ef");
    }

    #[tokio::test]
    async fn test_no_value_result_is_silent() {
        let (status, outputs, _) = run_session(vec![Ok(ExecEvent::ExecuteResult {
            data: ReprBundle::text("None"),
        })])
        .await;

        assert_eq!(status, ExecStatus::Completed);
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_plain_result_emitted_once() {
        let (_, outputs, _) = run_session(vec![Ok(ExecEvent::ExecuteResult {
            data: ReprBundle::text("42"),
        })])
        .await;

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, OutputKind::Result);
        assert_eq!(outputs[0].content, "42");
    }

    #[tokio::test]
    async fn test_result_without_repr_falls_back_to_json() {
        let mut data = ReprBundle::default();
        data.extra
            .insert("application/x-custom".to_string(), serde_json::json!({"v": 1}));

        let (_, outputs, _) = run_session(vec![Ok(ExecEvent::ExecuteResult { data })]).await;

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, OutputKind::Result);
        assert!(outputs[0].content.contains("application/x-custom"));
    }

    #[tokio::test]
    async fn test_display_prefers_image_over_html_and_text() {
        let data = ReprBundle {
            text_plain: Some("<Figure>".to_string()),
            image_png: Some(vec![1, 2, 3]),
            text_html: Some("<img/>".to_string()),
            ..ReprBundle::default()
        };
        let (_, outputs, _) = run_session(vec![Ok(ExecEvent::DisplayData { data })]).await;

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, OutputKind::Image);
        assert!(outputs[0].content.starts_with("data:image/png;base64,"));
        assert_eq!(outputs[0].short_content, "[image]");
    }

    #[tokio::test]
    async fn test_display_html_then_text_priority() {
        let (_, outputs, _) = run_session(vec![
            Ok(ExecEvent::DisplayData {
                data: ReprBundle::html("<table/>"),
            }),
            Ok(ExecEvent::DisplayData {
                data: ReprBundle::text("fallback"),
            }),
            Ok(ExecEvent::DisplayData {
                data: ReprBundle::default(),
            }),
        ])
        .await;

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].kind, OutputKind::Html);
        assert_eq!(outputs[1].kind, OutputKind::Result);
    }

    #[tokio::test]
    async fn test_execute_error_emits_summary_and_traceback() {
        let (status, outputs, statuses) = run_session(vec![Ok(ExecEvent::ExecuteError {
            ename: Some("ZeroDivisionError".to_string()),
            evalue: Some("division by zero".to_string()),
            traceback: vec![
                "Traceback (most recent call last):".to_string(),
                String::new(),
                "ZeroDivisionError: division by zero".to_string(),
            ],
        })])
        .await;

        assert_eq!(status, ExecStatus::Error);
        assert_eq!(statuses, vec![ExecStatus::Error]);
        assert_eq!(outputs[0].kind, OutputKind::Error);
        assert_eq!(outputs[0].content, "ZeroDivisionError: division by zero");
        // Empty traceback lines produce nothing.
        assert_eq!(outputs.len(), 3);
        assert!(outputs[1..].iter().all(|e| e.kind == OutputKind::Stderr));
    }

    #[tokio::test]
    async fn test_execute_error_generic_fallback() {
        let (_, outputs, _) = run_session(vec![Ok(ExecEvent::ExecuteError {
            ename: None,
            evalue: None,
            traceback: Vec::new(),
        })])
        .await;

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].content, "ExecutionError: unknown error");
    }

    #[tokio::test]
    async fn test_transport_failure_emits_single_error() {
        let (status, outputs, statuses) = run_session(vec![
            Ok(ExecEvent::stdout("partial\n")),
            Err(EngineError::transport("stream reset")),
        ])
        .await;

        assert_eq!(status, ExecStatus::Error);
        assert_eq!(statuses, vec![ExecStatus::Error]);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].content, "partial");
        assert_eq!(outputs[1].kind, OutputKind::Error);
        assert!(outputs[1].content.contains("stream reset"));
    }

    #[tokio::test]
    async fn test_output_order_matches_event_order() {
        let (_, outputs, _) = run_session(vec![
            Ok(ExecEvent::stdout("a\n")),
            Ok(ExecEvent::stderr("b\n")),
            Ok(ExecEvent::ExecuteResult {
                data: ReprBundle::text("c"),
            }),
        ])
        .await;

        let contents: Vec<_> = outputs.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_log_matches_callback_delivery() {
        let log = Arc::new(ExecutionLog::new());
        let session = ExecutionSession::new(log.clone(), ExecCallbacks::new());
        let status = session
            .run(
                stream::iter(vec![Ok(ExecEvent::stdout("logged\n"))]).boxed(),
                None,
            )
            .await;

        assert_eq!(status, ExecStatus::Completed);
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].content, "logged");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_transport_failure() {
        let log = Arc::new(ExecutionLog::new());
        let session = ExecutionSession::new(log.clone(), ExecCallbacks::new());
        let status = session
            .run(stream::pending().boxed(), Some(Duration::from_secs(5)))
            .await;

        assert_eq!(status, ExecStatus::Error);
        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, OutputKind::Error);
        assert!(entries[0].content.contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_consumption() {
        let log = Arc::new(ExecutionLog::new());
        let session = ExecutionSession::new(log.clone(), ExecCallbacks::new());
        let token = session.cancel_token();
        token.cancel();

        let status = session.run(stream::pending().boxed(), None).await;
        assert_eq!(status, ExecStatus::Completed);
        assert!(log.is_empty());
    }
}
