//! Whole-snapshot persistence of the visitor log into a durable key-value slot.
//!
//! Every save rewrites the full log as JSON under [`LOG_KEY`]. Loading is
//! strict and reports what went wrong; [`load_or_default`] is the fail-soft
//! wrapper the application uses, which logs the problem and starts with an
//! empty history.

use crate::types::VisitorRecord;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Slot key holding the serialized visitor log.
pub const LOG_KEY: &str = "visioTrackLog";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("stored log is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("stored log is not a JSON array")]
    NotAnArray,
    #[error("failed to encode log: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage backend: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("storage directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable string key-value store.
pub trait Slot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Read the visitor log, newest check-in first.
///
/// A missing key is an empty log, not an error.
pub fn load(slot: &impl Slot) -> Result<Vec<VisitorRecord>, PersistenceError> {
    let Some(text) = slot.read(LOG_KEY)? else {
        return Ok(Vec::new());
    };

    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(PersistenceError::Malformed)?;
    if !value.is_array() {
        return Err(PersistenceError::NotAnArray);
    }

    let mut records: Vec<VisitorRecord> =
        serde_json::from_value(value).map_err(PersistenceError::Malformed)?;
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    Ok(records)
}

/// Read the visitor log, treating any failure as "no history".
pub fn load_or_default(slot: &impl Slot) -> Vec<VisitorRecord> {
    match load(slot) {
        Ok(records) => {
            tracing::debug!(count = records.len(), "visitor log loaded");
            records
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read visitor log; starting empty");
            Vec::new()
        }
    }
}

/// Overwrite the slot with the full record sequence.
pub fn save(slot: &mut impl Slot, records: &[VisitorRecord]) -> Result<(), PersistenceError> {
    let text = serde_json::to_string(records).map_err(PersistenceError::Encode)?;
    slot.write(LOG_KEY, &text)?;
    tracing::debug!(count = records.len(), bytes = text.len(), "visitor log saved");
    Ok(())
}

/// In-process slot. Can be told to reject writes, to exercise failure paths.
#[derive(Debug, Default, Clone)]
pub struct MemorySlot {
    entries: HashMap<String, String>,
    reject_writes: bool,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-populated with `value` under `key`.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut slot = Self::default();
        slot.entries.insert(key.to_string(), value.to_string());
        slot
    }

    pub fn reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }
}

impl Slot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.reject_writes {
            return Err(PersistenceError::Unavailable("quota exceeded".into()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// SQLite-backed slot: one row per key.
pub struct SqliteSlot {
    conn: Connection,
}

impl SqliteSlot {
    /// Open (creating if needed) the slot database at `path`.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened visitor database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl Slot for SqliteSlot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
