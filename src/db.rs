//! Local SQLite journal for the mock backend.
//!
//! The fixture backend has nowhere to send check-ins, stock reports and
//! ratings, so it appends them here instead. Each row keeps the JSON payload
//! exactly as it would have been posted, plus the UTC time it was accepted.

use crate::api::SubmissionKind;
use crate::error::SubmissionError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: i64,
    pub kind: String,
    pub place_id: String,
    pub payload: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct Journal {
    conn: Mutex<Connection>,
}

impl Journal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, SubmissionError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SubmissionError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                place_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one submission and returns its row id.
    pub fn record(
        &self,
        kind: SubmissionKind,
        place_id: &str,
        payload: &str,
    ) -> Result<i64, SubmissionError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO submissions (kind, place_id, payload, recorded_at) VALUES (?, ?, ?, ?)",
            params![kind.as_str(), place_id, payload, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, kind = kind.as_str(), place_id, "Journaled submission");
        Ok(id)
    }

    /// Submissions for one place, oldest first.
    pub fn entries_for(&self, place_id: &str) -> Result<Vec<JournalEntry>, SubmissionError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, kind, place_id, payload, recorded_at
             FROM submissions WHERE place_id = ? ORDER BY id",
        )?;

        let rows = stmt.query_map([place_id], |row| {
            let recorded_at: String = row.get(4)?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
            Ok(JournalEntry {
                id: row.get(0)?,
                kind: row.get(1)?,
                place_id: row.get(2)?,
                payload: row.get(3)?,
                recorded_at,
            })
        })?;

        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_per_place() {
        let journal = Journal::in_memory().unwrap();
        journal
            .record(SubmissionKind::CheckIn, "1", r#"{"place_id":"1"}"#)
            .unwrap();
        journal
            .record(SubmissionKind::Rating, "2", r#"{"place_id":"2","stars":4}"#)
            .unwrap();
        journal
            .record(SubmissionKind::Stock, "1", r#"{"place_id":"1","brand":"camel"}"#)
            .unwrap();

        let entries = journal.entries_for("1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "check_in");
        assert_eq!(entries[1].kind, "stock");
        assert!(entries[0].id < entries[1].id);
        assert!(journal.entries_for("3").unwrap().is_empty());
    }

    #[test]
    fn journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let journal = Journal::open(&path).unwrap();
            journal.record(SubmissionKind::CheckIn, "9", "{}").unwrap();
        }
        let journal = Journal::open(&path).unwrap();
        assert_eq!(journal.entries_for("9").unwrap().len(), 1);
    }
}
