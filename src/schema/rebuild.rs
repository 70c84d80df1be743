//! Backup-and-rebuild pipeline.
//!
//! An existing table is reconciled by renaming it to `<table>_backup`,
//! recreating it from its descriptor, copying the columns both shapes share,
//! and dropping the backup. Columns that are no longer declared are lost;
//! newly declared columns take their default in every carried row.
//!
//! The functions here issue plain statements and never begin or commit a
//! transaction. The reconciliation driver decides whether the pipeline runs
//! inside one transaction or step by step under the journal.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::errors::SchemaError;
use super::descriptor::EntityDescriptor;
use super::identifier::{quote_ident, quote_list};
use super::introspect::{self, LiveSchemaSnapshot};

/// Steps of the rebuild pipeline in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStep {
    /// Opening the rebuild transaction (transactional strategy only).
    Begin,
    DropIndexes,
    Rename,
    DropOriginal,
    Create,
    Copy,
    DropBackup,
    /// Committing the rebuild transaction (transactional strategy only).
    Commit,
}

impl RebuildStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::DropIndexes => "drop_indexes",
            Self::Rename => "rename",
            Self::DropOriginal => "drop_original",
            Self::Create => "create",
            Self::Copy => "copy",
            Self::DropBackup => "drop_backup",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebuildStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "begin" => Ok(Self::Begin),
            "drop_indexes" => Ok(Self::DropIndexes),
            "rename" => Ok(Self::Rename),
            "drop_original" => Ok(Self::DropOriginal),
            "create" => Ok(Self::Create),
            "copy" => Ok(Self::Copy),
            "drop_backup" => Ok(Self::DropBackup),
            "commit" => Ok(Self::Commit),
            other => Err(format!("unknown rebuild step '{}'", other)),
        }
    }
}

/// An index that could not be dropped during cleanup. Reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDropFailure {
    pub table: String,
    pub index: String,
    pub message: String,
}

/// What one table's rebuild carries across.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub table_name: String,
    pub backup_table_name: String,
    /// Declared columns also present in the backup, in declaration order,
    /// minus columns excluded from migration.
    pub intersecting_columns: Vec<String>,
}

impl MigrationPlan {
    pub fn new(descriptor: &EntityDescriptor, backup: &LiveSchemaSnapshot) -> Self {
        Self {
            table_name: descriptor.table_name().to_string(),
            backup_table_name: descriptor.backup_table_name(),
            intersecting_columns: intersecting_columns(descriptor, backup),
        }
    }

    /// `INSERT … SELECT` carrying the intersecting columns, or `None` when
    /// there is nothing in common to copy.
    pub fn copy_sql(&self) -> Option<String> {
        if self.intersecting_columns.is_empty() {
            return None;
        }
        let cols = quote_list(&self.intersecting_columns);
        Some(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&self.table_name),
            cols,
            cols,
            quote_ident(&self.backup_table_name)
        ))
    }
}

pub fn intersecting_columns(descriptor: &EntityDescriptor, backup: &LiveSchemaSnapshot) -> Vec<String> {
    descriptor
        .columns()
        .iter()
        .filter(|c| !c.exclude_from_migration && backup.contains(&c.name))
        .map(|c| c.name.clone())
        .collect()
}

/// Receives each completed step so progress can be persisted.
pub trait StepRecorder {
    fn record(&mut self, conn: &Connection, step: RebuildStep) -> Result<(), SchemaError>;

    /// Called once the backup has been dropped.
    fn finish(&mut self, conn: &Connection) -> Result<(), SchemaError>;
}

/// Recorder for pipelines that run inside a transaction.
pub struct NoJournal;

impl StepRecorder for NoJournal {
    fn record(&mut self, _conn: &Connection, _step: RebuildStep) -> Result<(), SchemaError> {
        Ok(())
    }

    fn finish(&mut self, _conn: &Connection) -> Result<(), SchemaError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildOutcome {
    pub plan: MigrationPlan,
    pub rows_copied: usize,
    pub index_failures: Vec<IndexDropFailure>,
}

/// Execute the table's DDL from its descriptor: the table, then its indexes.
pub fn create_table(conn: &Connection, descriptor: &EntityDescriptor) -> Result<(), SchemaError> {
    let table = descriptor.table_name();
    for sql in descriptor.create_statements() {
        debug!(table = %table, sql = %sql, "Executing DDL");
        conn.execute_batch(&sql)
            .map_err(|e| SchemaError::ddl(table, RebuildStep::Create, e))?;
    }
    Ok(())
}

/// Best-effort removal of every declared index from the live table so the
/// recreate step does not collide with names the backup still holds.
pub fn drop_declared_indexes(conn: &Connection, descriptor: &EntityDescriptor) -> Vec<IndexDropFailure> {
    let table = descriptor.table_name();
    let mut failures = Vec::new();

    for index in descriptor.indexes() {
        let result = match introspect::index_owner(conn, &index.name) {
            Ok(Some(owner)) if owner.eq_ignore_ascii_case(table) => conn
                .execute_batch(&format!("DROP INDEX {}", quote_ident(&index.name)))
                .map_err(|e| e.to_string()),
            Ok(Some(owner)) => Err(format!("index is attached to table '{}'", owner)),
            Ok(None) => Err("no such index".to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => debug!(table = %table, index = %index.name, "Dropped index"),
            Err(message) => {
                warn!(table = %table, index = %index.name, error = %message, "Ignoring index drop failure");
                failures.push(IndexDropFailure {
                    table: table.to_string(),
                    index: index.name.clone(),
                    message,
                });
            }
        }
    }

    failures
}

/// Move the AUTOINCREMENT high-water mark from the backup to the rebuilt
/// table, so ids of rows deleted before the rebuild are never handed out
/// again. The rename took the `sqlite_sequence` row with it; dropping the
/// backup would discard it.
fn carry_sequence(conn: &Connection, descriptor: &EntityDescriptor, backup: &str) -> Result<(), SchemaError> {
    if !descriptor.columns().iter().any(|c| c.autoincrement) {
        return Ok(());
    }
    let table = descriptor.table_name();

    let saved: Option<i64> = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            rusqlite::params![backup],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SchemaError::data_copy(table, e))?;
    let Some(saved) = saved else {
        return Ok(());
    };

    let updated = conn
        .execute(
            "UPDATE sqlite_sequence SET seq = MAX(seq, ?2) WHERE name = ?1",
            rusqlite::params![table, saved],
        )
        .map_err(|e| SchemaError::data_copy(table, e))?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            rusqlite::params![table, saved],
        )
        .map_err(|e| SchemaError::data_copy(table, e))?;
    }
    debug!(table = %table, seq = saved, "Carried AUTOINCREMENT sequence from backup");
    Ok(())
}

/// Run the rebuild pipeline for an existing table.
///
/// `resume_after` skips every step up to and including the given one; it is
/// set when a journaled rebuild is resumed after a crash.
pub fn rebuild_table(
    conn: &Connection,
    descriptor: &EntityDescriptor,
    resume_after: Option<RebuildStep>,
    recorder: &mut dyn StepRecorder,
) -> Result<RebuildOutcome, SchemaError> {
    let table = descriptor.table_name();
    let backup = descriptor.backup_table_name();
    let pending = |step: RebuildStep| resume_after.map_or(true, |done| step > done);

    let mut index_failures = Vec::new();
    if pending(RebuildStep::DropIndexes) {
        index_failures = drop_declared_indexes(conn, descriptor);
        recorder.record(conn, RebuildStep::DropIndexes)?;
    }

    if pending(RebuildStep::Rename) {
        conn.execute_batch(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(table),
            quote_ident(&backup)
        ))
        .map_err(|e| SchemaError::ddl(table, RebuildStep::Rename, e))?;
        debug!(table = %table, backup = %backup, "Renamed table to backup");
        recorder.record(conn, RebuildStep::Rename)?;
    }

    if pending(RebuildStep::DropOriginal) {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .map_err(|e| SchemaError::ddl(table, RebuildStep::DropOriginal, e))?;
        recorder.record(conn, RebuildStep::DropOriginal)?;
    }

    if pending(RebuildStep::Create) {
        create_table(conn, descriptor)?;
        recorder.record(conn, RebuildStep::Create)?;
    }

    let mut rows_copied = 0;
    let plan = if pending(RebuildStep::Copy) {
        let backup_snapshot = introspect::inspect(conn, &backup)?;
        let plan = MigrationPlan::new(descriptor, &backup_snapshot);
        match plan.copy_sql() {
            Some(sql) => {
                rows_copied = conn
                    .execute(&sql, [])
                    .map_err(|e| SchemaError::data_copy(table, e))?;
                debug!(table = %table, rows = rows_copied, columns = ?plan.intersecting_columns, "Copied rows from backup");
            }
            None => {
                warn!(table = %table, backup = %backup, "No columns in common with backup, rows are not carried over");
            }
        }
        recorder.record(conn, RebuildStep::Copy)?;
        plan
    } else {
        MigrationPlan {
            table_name: table.to_string(),
            backup_table_name: backup.clone(),
            intersecting_columns: Vec::new(),
        }
    };

    carry_sequence(conn, descriptor, &backup)?;

    conn.execute_batch(&format!("DROP TABLE {}", quote_ident(&backup)))
        .map_err(|e| SchemaError::ddl(table, RebuildStep::DropBackup, e))?;
    recorder.finish(conn)?;

    info!(table = %table, rows = rows_copied, "Table rebuilt");
    Ok(RebuildOutcome {
        plan,
        rows_copied,
        index_failures,
    })
}
