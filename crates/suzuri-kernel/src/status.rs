//! Kernel and execution status enums.

use serde::{Deserialize, Serialize};

/// Visible kernel state.
///
/// Exactly one value is active at a time. Mutated only by the supervisor
/// (start/restart/timeout) or by the active session (entering and leaving
/// `Busy`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KernelStatus {
    /// Kernel creation is in flight.
    Starting,
    /// Kernel is alive and waiting for work.
    Idle,
    /// Exactly one session is consuming an execution stream.
    Busy,
    /// Creation or restart failed. Only an explicit restart leaves this.
    Error,
}

impl KernelStatus {
    /// True for states in which a kernel is alive and usable.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

/// Final status of one execution session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// The stream ended without any error event.
    Completed,
    /// An engine-reported error or a transport failure occurred.
    Error,
}
