//! Append-only journal of sent and received messages.
//!
//! Diagnostics for interactive sessions: one coarse mutex, O(1) append,
//! unbounded by design (no rotation or eviction — `clear` is the only
//! removal path, invoked explicitly by the operator).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether an entry left or entered this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// One journaled message.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub direction: Direction,
    pub topic: String,
    pub qos: u8,
    pub payload_size: usize,
    pub timestamp: DateTime<Utc>,
    /// Payload as text (lossy — the journal is for reading, not replay).
    pub payload: String,
}

impl JournalEntry {
    fn new(direction: Direction, topic: &str, qos: u8, payload: &[u8]) -> Self {
        Self {
            direction,
            topic: topic.to_string(),
            qos,
            payload_size: payload.len(),
            timestamp: Utc::now(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// Thread-safe message journal shared between the foreground loop and the
/// transport's dispatch context.
#[derive(Default)]
pub struct MessageJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MessageJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: JournalEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn record_sent(&self, topic: &str, qos: u8, payload: &[u8]) {
        self.append(JournalEntry::new(Direction::Sent, topic, qos, payload));
    }

    pub fn record_received(&self, topic: &str, qos: u8, payload: &[u8]) {
        self.append(JournalEntry::new(Direction::Received, topic, qos, payload));
    }

    pub fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_both_directions() {
        let journal = MessageJournal::new();
        journal.record_sent("$aws/things/lamp-01/shadow/get", 1, b"");
        journal.record_received("$aws/things/lamp-01/shadow/get/accepted", 1, br#"{"version":1}"#);

        let entries = journal.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].direction, Direction::Sent);
        assert_eq!(entries[0].payload_size, 0);
        assert_eq!(entries[1].direction, Direction::Received);
        assert_eq!(entries[1].payload, r#"{"version":1}"#);
    }

    #[test]
    fn clear_is_the_only_removal_path() {
        let journal = MessageJournal::new();
        journal.record_sent("a", 0, b"x");
        journal.record_sent("b", 0, b"y");
        assert_eq!(journal.len(), 2);

        journal.clear();
        assert!(journal.is_empty());
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let journal = Arc::new(MessageJournal::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let journal = Arc::clone(&journal);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    journal.record_received(&format!("t/{t}/{i}"), 0, b"payload");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(journal.len(), 800);
    }

    #[test]
    fn non_utf8_payload_is_lossy_not_fatal() {
        let journal = MessageJournal::new();
        journal.record_received("bin/topic", 0, &[0xff, 0xfe, 0x61]);
        let entries = journal.snapshot();
        assert_eq!(entries[0].payload_size, 3);
        assert!(entries[0].payload.contains('a'));
    }
}
