//! Progress journal for step-wise rebuilds.
//!
//! Without a surrounding transaction a crash between the rename and the final
//! drop leaves a table's rows only under `<table>_backup`. Each completed step
//! is written to `_schema_journal` so the next reconciliation can tell its own
//! backup apart from a stray one and finish the job.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::errors::SchemaError;
use super::introspect;
use super::rebuild::{RebuildStep, StepRecorder};

pub const JOURNAL_TABLE: &str = "_schema_journal";

const CREATE_JOURNAL: &str = "
CREATE TABLE IF NOT EXISTS _schema_journal (
    table_name TEXT PRIMARY KEY,
    backup_table TEXT NOT NULL,
    last_step TEXT NOT NULL,
    run_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub table_name: String,
    pub backup_table: String,
    pub last_step: RebuildStep,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn ensure(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(CREATE_JOURNAL)
        .map_err(|e| SchemaError::journal(JOURNAL_TABLE, e))
}

fn journal_exists(conn: &Connection) -> Result<bool, SchemaError> {
    Ok(introspect::inspect(conn, JOURNAL_TABLE)?.table_exists)
}

fn parse_timestamp(table: &str, value: &str) -> Result<DateTime<Utc>, SchemaError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SchemaError::journal(table, format!("bad timestamp '{}': {}", value, e)))
}

type RawEntry = (String, String, String, String, String, String);

fn entry_from_raw(raw: RawEntry) -> Result<JournalEntry, SchemaError> {
    let (table_name, backup_table, last_step, run_id, started_at, updated_at) = raw;
    let last_step = last_step
        .parse::<RebuildStep>()
        .map_err(|e| SchemaError::journal(&table_name, e))?;
    Ok(JournalEntry {
        started_at: parse_timestamp(&table_name, &started_at)?,
        updated_at: parse_timestamp(&table_name, &updated_at)?,
        table_name,
        backup_table,
        last_step,
        run_id,
    })
}

fn raw_row(row: &rusqlite::Row) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Unfinished rebuild of `table`, if one was interrupted.
pub fn pending(conn: &Connection, table: &str) -> Result<Option<JournalEntry>, SchemaError> {
    if !journal_exists(conn)? {
        return Ok(None);
    }
    let raw = conn
        .query_row(
            "SELECT table_name, backup_table, last_step, run_id, started_at, updated_at FROM _schema_journal WHERE table_name = ?1",
            rusqlite::params![table],
            raw_row,
        )
        .optional()
        .map_err(|e| SchemaError::journal(table, e))?;
    raw.map(entry_from_raw).transpose()
}

/// Every unfinished rebuild, oldest first.
pub fn list_pending(conn: &Connection) -> Result<Vec<JournalEntry>, SchemaError> {
    if !journal_exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare("SELECT table_name, backup_table, last_step, run_id, started_at, updated_at FROM _schema_journal ORDER BY started_at")
        .map_err(|e| SchemaError::journal(JOURNAL_TABLE, e))?;
    let rows = stmt
        .query_map([], raw_row)
        .map_err(|e| SchemaError::journal(JOURNAL_TABLE, e))?;

    let mut entries = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| SchemaError::journal(JOURNAL_TABLE, e))?;
        entries.push(entry_from_raw(raw)?);
    }
    Ok(entries)
}

pub fn record(
    conn: &Connection,
    table: &str,
    backup_table: &str,
    step: RebuildStep,
    run_id: &str,
) -> Result<(), SchemaError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO _schema_journal (table_name, backup_table, last_step, run_id, started_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(table_name) DO UPDATE SET last_step = excluded.last_step, run_id = excluded.run_id, updated_at = excluded.updated_at",
        rusqlite::params![table, backup_table, step.as_str(), run_id, now],
    )
    .map_err(|e| SchemaError::journal(table, e))?;
    Ok(())
}

pub fn clear(conn: &Connection, table: &str) -> Result<(), SchemaError> {
    if !journal_exists(conn)? {
        return Ok(());
    }
    conn.execute(
        "DELETE FROM _schema_journal WHERE table_name = ?1",
        rusqlite::params![table],
    )
    .map_err(|e| SchemaError::journal(table, e))?;
    Ok(())
}

/// Writes each completed rebuild step of one table to the journal.
pub struct JournalRecorder {
    table: String,
    backup_table: String,
    run_id: String,
}

impl JournalRecorder {
    pub fn new(table: &str, backup_table: &str, run_id: &str) -> Self {
        Self {
            table: table.to_string(),
            backup_table: backup_table.to_string(),
            run_id: run_id.to_string(),
        }
    }
}

impl StepRecorder for JournalRecorder {
    fn record(&mut self, conn: &Connection, step: RebuildStep) -> Result<(), SchemaError> {
        record(conn, &self.table, &self.backup_table, step, &self.run_id)
    }

    fn finish(&mut self, conn: &Connection) -> Result<(), SchemaError> {
        clear(conn, &self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_without_journal_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(pending(&conn, "user").unwrap().is_none());
        assert!(list_pending(&conn).unwrap().is_empty());
        assert!(clear(&conn, "user").is_ok());
    }

    #[test]
    fn test_record_then_pending() {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        record(&conn, "task", "task_backup", RebuildStep::DropIndexes, "run-1").unwrap();
        record(&conn, "task", "task_backup", RebuildStep::Rename, "run-1").unwrap();

        let entry = pending(&conn, "task").unwrap().unwrap();
        assert_eq!(entry.backup_table, "task_backup");
        assert_eq!(entry.last_step, RebuildStep::Rename);
        assert_eq!(entry.run_id, "run-1");
        assert!(entry.updated_at >= entry.started_at);
    }

    #[test]
    fn test_clear_removes_entry() {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        record(&conn, "user", "user_backup", RebuildStep::Create, "run-2").unwrap();
        clear(&conn, "user").unwrap();
        assert!(pending(&conn, "user").unwrap().is_none());
    }

    #[test]
    fn test_list_pending() {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        record(&conn, "user", "user_backup", RebuildStep::Rename, "run-3").unwrap();
        record(&conn, "result", "result_backup", RebuildStep::Create, "run-3").unwrap();
        let entries = list_pending(&conn).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_corrupt_step_is_journal_error() {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        conn.execute(
            "INSERT INTO _schema_journal VALUES ('user', 'user_backup', 'bogus', 'r', ?1, ?1)",
            rusqlite::params![Utc::now().to_rfc3339()],
        )
        .unwrap();
        let err = pending(&conn, "user").unwrap_err();
        assert!(matches!(err, SchemaError::Journal { .. }));
    }
}
