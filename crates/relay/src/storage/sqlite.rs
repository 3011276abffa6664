//! SQLite-based processed-message log

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::{LogEntry, Outcome, ProcessedLog};
use crate::models::MessageId;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE processed_messages (
                message_id TEXT PRIMARY KEY,
                outcome TEXT NOT NULL,
                posts INTEGER NOT NULL DEFAULT 0,
                root_uri TEXT,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX idx_processed_outcome
                ON processed_messages(outcome, recorded_at ASC);
            "#,
        ),
    ])
}

const SELECT_COLUMNS: &str = "SELECT message_id, outcome, posts, root_uri, recorded_at FROM processed_messages";

/// SQLite-based processed-message log
pub struct SqliteProcessedLog {
    conn: Mutex<Connection>,
}

impl SqliteProcessedLog {
    /// Open (or create) the log at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;
        Self::from_connection(conn)
    }

    /// Create a log backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL keeps the log readable while a run appends to it; NORMAL sync is
        // safe under WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("processed log connection poisoned"))
    }
}

/// Read the raw columns of a [`SELECT_COLUMNS`] row
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, i64, Option<String>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn to_entry(raw: (String, String, i64, Option<String>, String)) -> Result<LogEntry> {
    let (message_id, outcome, posts, root_uri, recorded_at) = raw;
    let outcome = Outcome::parse(&outcome)
        .with_context(|| format!("Unknown outcome {:?} for message {}", outcome, message_id))?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .with_context(|| format!("Invalid timestamp for message {}", message_id))?
        .with_timezone(&Utc);

    Ok(LogEntry {
        message_id: MessageId::new(message_id),
        outcome,
        posts: posts.max(0) as usize,
        root_uri,
        recorded_at,
    })
}

impl ProcessedLog for SqliteProcessedLog {
    fn is_processed(&self, id: &MessageId) -> Result<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM processed_messages WHERE message_id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn record(&self, entry: LogEntry) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO processed_messages (message_id, outcome, posts, root_uri, recorded_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(message_id) DO NOTHING",
                params![
                    entry.message_id.as_str(),
                    entry.outcome.as_str(),
                    entry.posts as i64,
                    entry.root_uri,
                    entry.recorded_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to record message {}", entry.message_id))?;
        Ok(inserted == 1)
    }

    fn get(&self, id: &MessageId) -> Result<Option<LogEntry>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{} WHERE message_id = ?", SELECT_COLUMNS),
                [id.as_str()],
                entry_from_row,
            )
            .optional()?;
        raw.map(to_entry).transpose()
    }

    fn list_by_outcome(&self, outcome: Outcome) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE outcome = ? ORDER BY recorded_at ASC, rowid ASC",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([outcome.as_str()], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(to_entry).collect()
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM processed_messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
