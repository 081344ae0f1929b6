//! Engine-agnostic execution events.
//!
//! Every submission opens one ordered stream of these events. The
//! orchestrator consumes them one at a time, branches on kind, and never
//! looks past the fields below - whatever else the engine attaches rides
//! along in [`ReprBundle::extra`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The engine's canonical "no value" text representation.
///
/// An `execute_result` whose plain-text repr equals this marker carries no
/// user-visible value and produces no output.
pub const NO_VALUE_REPR: &str = "None";

/// Which output channel a stream fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamChannel {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// The representations attached to a result or display event.
///
/// Mirrors a MIME bundle: each field is one representation of the same
/// value, and any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReprBundle {
    /// Plain-text representation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_plain: Option<String>,
    /// Raw PNG bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_png: Option<Vec<u8>>,
    /// HTML markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_html: Option<String>,
    /// Any further representations, keyed by MIME type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ReprBundle {
    /// A bundle carrying only a plain-text representation.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_plain: Some(text.into()),
            ..Self::default()
        }
    }

    /// A bundle carrying only PNG bytes.
    pub fn png(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            image_png: Some(bytes.into()),
            ..Self::default()
        }
    }

    /// A bundle carrying only HTML markup.
    pub fn html(markup: impl Into<String>) -> Self {
        Self {
            text_html: Some(markup.into()),
            ..Self::default()
        }
    }

    /// True when no known representation is present.
    pub fn is_empty(&self) -> bool {
        self.text_plain.is_none()
            && self.image_png.is_none()
            && self.text_html.is_none()
            && self.extra.is_empty()
    }
}

/// One event on an execution stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    /// A text fragment on stdout or stderr. Fragments are arbitrary -
    /// they may split mid-line or carry several lines at once.
    Stream {
        /// Which channel the fragment belongs to.
        channel: StreamChannel,
        /// The fragment text, possibly without a trailing newline.
        text: String,
    },

    /// The value of the submitted expression, as a repr bundle.
    ExecuteResult {
        /// Available representations of the value.
        data: ReprBundle,
    },

    /// Rich output displayed during execution (plots, tables, ...).
    DisplayData {
        /// Available representations of the display item.
        data: ReprBundle,
    },

    /// The engine reports that execution raised.
    ExecuteError {
        /// Exception name, when the engine knows it.
        ename: Option<String>,
        /// Exception message, when the engine knows it.
        evalue: Option<String>,
        /// Traceback lines, possibly empty.
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl ExecEvent {
    /// Convenience constructor for a stdout fragment.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Stream {
            channel: StreamChannel::Stdout,
            text: text.into(),
        }
    }

    /// Convenience constructor for a stderr fragment.
    pub fn stderr(text: impl Into<String>) -> Self {
        Self::Stream {
            channel: StreamChannel::Stderr,
            text: text.into(),
        }
    }

    /// True for error-kind events.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ExecuteError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_bundle_empty() {
        assert!(ReprBundle::default().is_empty());
        assert!(!ReprBundle::text("42").is_empty());
    }

    #[test]
    fn test_event_serde_tagging() {
        let event = ExecEvent::stdout("hello\n");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stream");
        assert_eq!(json["channel"], "stdout");
    }
}
