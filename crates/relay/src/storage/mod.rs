//! Processed-message log storage
//!
//! The log is what makes repeated runs idempotent: a message recorded here is
//! skipped without being fetched or posted again. The trait-based design
//! allows swapping between in-memory and SQLite implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryProcessedLog;
pub use sqlite::SqliteProcessedLog;
pub use traits::{LogEntry, Outcome, ProcessedLog};
