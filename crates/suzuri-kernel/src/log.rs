//! Append-only execution log.

use parking_lot::RwLock;

use crate::output::OutputEvent;

/// Ordered record of every output event the supervisor's kernel produced.
///
/// Entries are appended as sessions emit them and removed only by an
/// explicit [`clear`](ExecutionLog::clear) - never individually.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: RwLock<Vec<OutputEvent>>,
}

impl ExecutionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn append(&self, event: OutputEvent) {
        self.entries.write().push(event);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// A point-in-time copy of all entries, in append order.
    pub fn snapshot(&self) -> Vec<OutputEvent> {
        self.entries.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let log = ExecutionLog::new();
        log.append(OutputEvent::stdout("first"));
        log.append(OutputEvent::stderr("second"));

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "first");
        assert_eq!(entries[1].content, "second");
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_clear_empties() {
        let log = ExecutionLog::new();
        log.append(OutputEvent::stdout("x"));
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
