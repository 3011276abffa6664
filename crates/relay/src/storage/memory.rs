//! In-memory processed-message log
//!
//! Used by tests and by dry runs, where nothing should persist.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{LogEntry, Outcome, ProcessedLog};
use crate::models::MessageId;

/// In-memory implementation of ProcessedLog
///
/// Keeps insertion order so listings match the SQLite store.
#[derive(Default)]
pub struct InMemoryProcessedLog {
    entries: RwLock<Vec<LogEntry>>,
    index: RwLock<HashMap<String, usize>>,
}

impl InMemoryProcessedLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessedLog for InMemoryProcessedLog {
    fn is_processed(&self, id: &MessageId) -> Result<bool> {
        Ok(self.index.read().unwrap().contains_key(id.as_str()))
    }

    fn record(&self, entry: LogEntry) -> Result<bool> {
        let mut entries = self.entries.write().unwrap();
        let mut index = self.index.write().unwrap();

        if index.contains_key(entry.message_id.as_str()) {
            return Ok(false);
        }
        index.insert(entry.message_id.as_str().to_string(), entries.len());
        entries.push(entry);
        Ok(true)
    }

    fn get(&self, id: &MessageId) -> Result<Option<LogEntry>> {
        let entries = self.entries.read().unwrap();
        let index = self.index.read().unwrap();
        Ok(index.get(id.as_str()).map(|&i| entries[i].clone()))
    }

    fn list_by_outcome(&self, outcome: Outcome) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_record_wins() {
        let log = InMemoryProcessedLog::new();
        let id = MessageId::new("m1");

        assert!(!log.is_processed(&id).unwrap());
        assert!(log.record(LogEntry::new(id.clone(), Outcome::Partial, 1, None)).unwrap());
        assert!(!log.record(LogEntry::new(id.clone(), Outcome::Posted, 3, None)).unwrap());

        let entry = log.get(&id).unwrap().unwrap();
        assert_eq!(entry.outcome, Outcome::Partial);
        assert_eq!(entry.posts, 1);
        assert_eq!(log.count().unwrap(), 1);
    }

    #[test]
    fn test_list_by_outcome() {
        let log = InMemoryProcessedLog::new();
        log.record(LogEntry::new(MessageId::new("a"), Outcome::Posted, 2, None)).unwrap();
        log.record(LogEntry::new(MessageId::new("b"), Outcome::Partial, 1, None)).unwrap();
        log.record(LogEntry::new(MessageId::new("c"), Outcome::Posted, 1, None)).unwrap();

        let posted: Vec<String> = log
            .list_by_outcome(Outcome::Posted)
            .unwrap()
            .into_iter()
            .map(|e| e.message_id.0)
            .collect();
        assert_eq!(posted, vec!["a", "c"]);
    }
}
