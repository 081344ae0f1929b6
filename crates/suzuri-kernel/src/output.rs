//! Captured execution output.
//!
//! Every unit of output a session produces becomes one [`OutputEvent`]
//! carrying both a full and a shortened representation. The short form is
//! what list views render; the full form is what detail views (and the
//! execution log) keep.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Longest short-form content before truncation.
const SHORT_CONTENT_MAX: usize = 160;

/// Fixed short label for image output.
const IMAGE_LABEL: &str = "[image]";

/// Fixed short label for HTML output.
const HTML_LABEL: &str = "[html]";

/// What kind of output an event carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// A completed stdout line.
    Stdout,
    /// A completed stderr line (or a traceback line).
    Stderr,
    /// The value of the submitted expression.
    Result,
    /// A rendered image, as a data URI.
    Image,
    /// HTML markup.
    Html,
    /// An error summary.
    Error,
}

/// One captured unit of execution output. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Output kind.
    pub kind: OutputKind,
    /// Full content.
    pub content: String,
    /// Shortened content for compact display.
    pub short_content: String,
    /// When the event was captured.
    pub timestamp: SystemTime,
}

impl OutputEvent {
    /// Create an event, deriving the short form by truncation.
    pub fn new(kind: OutputKind, content: impl Into<String>) -> Self {
        let content = content.into();
        let short_content = truncate(&content, SHORT_CONTENT_MAX);
        Self {
            kind,
            content,
            short_content,
            timestamp: SystemTime::now(),
        }
    }

    /// Create an event with an explicit short form.
    pub fn with_short(
        kind: OutputKind,
        content: impl Into<String>,
        short_content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            content: content.into(),
            short_content: short_content.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// A completed stdout line.
    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(OutputKind::Stdout, line)
    }

    /// A completed stderr line.
    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new(OutputKind::Stderr, line)
    }

    /// An expression result.
    pub fn result(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Result, text)
    }

    /// An error summary.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(OutputKind::Error, text)
    }

    /// A PNG image, wrapped as a data URI with a fixed short label.
    pub fn image_png(bytes: &[u8]) -> Self {
        let uri = format!("data:image/png;base64,{}", BASE64.encode(bytes));
        Self::with_short(OutputKind::Image, uri, IMAGE_LABEL)
    }

    /// HTML markup with a fixed short label.
    pub fn html(markup: impl Into<String>) -> Self {
        Self::with_short(OutputKind::Html, markup, HTML_LABEL)
    }
}

/// Truncate on a char boundary, marking elision.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut short: String = s.chars().take(max_chars).collect();
    short.push('…');
    short
}
