//! User-facing notifications.
//!
//! Every lifecycle failure is surfaced exactly once on the supervisor's
//! notification channel, in addition to being logged. The channel carries
//! no execution output - that goes through the execution log.

use serde::{Deserialize, Serialize};

/// How loud a notification is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// Degraded but recoverable.
    Warning,
    /// Something failed.
    Error,
}

/// One user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity level.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl Notification {
    /// Create a notification.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// An error-severity notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// A warning-severity notification.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }
}
