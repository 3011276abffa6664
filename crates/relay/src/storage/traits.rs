//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MessageId;

/// How a recorded message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The whole thread was published
    Posted,
    /// Publishing stopped part-way; the thread needs manual reconciliation
    Partial,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "posted" => Some(Self::Posted),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// One entry of the processed-message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message_id: MessageId,
    pub outcome: Outcome,
    /// Posts published for this message
    pub posts: usize,
    /// AT URI of the thread root, when one was posted
    pub root_uri: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(message_id: MessageId, outcome: Outcome, posts: usize, root_uri: Option<String>) -> Self {
        Self {
            message_id,
            outcome,
            posts,
            root_uri,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only log of handled mailbox messages
///
/// Recording is idempotent: the first entry for a message id wins and later
/// writes for the same id are ignored. A recorded message is never relayed
/// again.
pub trait ProcessedLog: Send + Sync {
    /// Check whether a message has an entry
    fn is_processed(&self, id: &MessageId) -> Result<bool>;

    /// Append an entry; returns false if the id was already recorded
    fn record(&self, entry: LogEntry) -> Result<bool>;

    /// Get the entry for a message
    fn get(&self, id: &MessageId) -> Result<Option<LogEntry>>;

    /// List entries with the given outcome, oldest first
    fn list_by_outcome(&self, outcome: Outcome) -> Result<Vec<LogEntry>>;

    /// Count all entries
    fn count(&self) -> Result<usize>;
}
