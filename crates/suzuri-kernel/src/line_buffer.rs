//! Per-channel line reassembly.
//!
//! Stream fragments arrive in arbitrary pieces: mid-line, several lines at
//! once, or without a trailing terminator. A [`LineBuffer`] accumulates
//! one channel's fragments and hands back completed lines as soon as their
//! newline arrives, retaining the unterminated tail.

/// Trailing-fragment accumulator for one output channel.
///
/// Owned by the active session; never persists across sessions.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the lines it completed.
    ///
    /// Lines come back without terminators, in order, empty lines dropped.
    /// The trailing unterminated fragment stays buffered.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.pending.push_str(fragment);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let raw: String = self.pending.drain(..=pos).collect();
            let line = raw.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Take the buffered remainder, if any. Leaves the buffer empty.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
