use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::errors::SchemaError;
use super::descriptor::EntityDescriptor;
use super::drift::{decide, DriftDecision, SchemaDiff};
use super::introspect;
use super::journal::{self, JournalEntry, JournalRecorder};
use super::rebuild::{self, IndexDropFailure, NoJournal, RebuildOutcome, RebuildStep};

/// How the rebuild steps of one table are made durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildStrategy {
    /// All steps in one transaction; a failure leaves the table untouched.
    #[default]
    Transactional,
    /// Autocommit per step with progress in `_schema_journal`; a failure
    /// leaves rows under `<table>_backup` until the next run resumes.
    Journaled,
}

impl RebuildStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactional => "transactional",
            Self::Journaled => "journaled",
        }
    }
}

impl fmt::Display for RebuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transactional" => Ok(Self::Transactional),
            "journaled" => Ok(Self::Journaled),
            other => Err(format!(
                "unknown rebuild strategy '{}' (expected 'transactional' or 'journaled')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub strategy: RebuildStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableAction {
    Created,
    Rebuilt,
    /// An interrupted journaled rebuild was finished.
    Recovered,
}

impl fmt::Display for TableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Rebuilt => "rebuilt",
            Self::Recovered => "recovered",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub action: TableAction,
    pub copied_columns: Vec<String>,
    pub rows_copied: usize,
    pub added_columns: Vec<String>,
    pub removed_columns: Vec<String>,
    pub index_failures: Vec<IndexDropFailure>,
}

impl TableReport {
    fn from_outcome(action: TableAction, diff: SchemaDiff, outcome: RebuildOutcome) -> Self {
        Self {
            table: outcome.plan.table_name,
            action,
            copied_columns: outcome.plan.intersecting_columns,
            rows_copied: outcome.rows_copied,
            added_columns: diff.added,
            removed_columns: diff.removed,
            index_failures: outcome.index_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub run_id: String,
    pub strategy: RebuildStrategy,
    pub tables: Vec<TableReport>,
}

impl ReconcileReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn index_failures(&self) -> impl Iterator<Item = &IndexDropFailure> {
        self.tables.iter().flat_map(|t| t.index_failures.iter())
    }
}

/// A connection whose tables all match their descriptors.
#[derive(Debug)]
pub struct ReadyConnection {
    conn: Connection,
    report: ReconcileReport,
}

impl ReadyConnection {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    pub fn into_parts(self) -> (Connection, ReconcileReport) {
        (self.conn, self.report)
    }
}

/// Round-trip `SELECT 1` to prove the database answers.
pub fn ping(conn: &Connection) -> Result<(), SchemaError> {
    let value: i64 = conn
        .query_row("SELECT 1", [], |row| row.get(0))
        .map_err(|e| SchemaError::Connectivity(e.to_string()))?;
    if value != 1 {
        return Err(SchemaError::Connectivity(format!(
            "unexpected reply to SELECT 1: {}",
            value
        )));
    }
    Ok(())
}

/// Reconcile every descriptor in order and hand the connection back ready
/// for use. Must complete before anything else touches these tables.
pub fn reconcile_schema(
    mut conn: Connection,
    descriptors: &[EntityDescriptor],
    options: &ReconcileOptions,
) -> Result<ReadyConnection, SchemaError> {
    let report = reconcile(&mut conn, descriptors, options)?;
    Ok(ReadyConnection { conn, report })
}

/// Reconcile every descriptor in order, stopping at the first failure.
pub fn reconcile(
    conn: &mut Connection,
    descriptors: &[EntityDescriptor],
    options: &ReconcileOptions,
) -> Result<ReconcileReport, SchemaError> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("reconcile", run_id = %run_id, strategy = %options.strategy);
    let _enter = span.enter();

    ping(conn)?;
    if options.strategy == RebuildStrategy::Journaled {
        journal::ensure(conn)?;
    }

    let mut tables = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        tables.push(reconcile_table(conn, descriptor, options, &run_id)?);
    }

    info!(tables = tables.len(), "Schema reconciliation complete");
    Ok(ReconcileReport {
        run_id,
        strategy: options.strategy,
        tables,
    })
}

fn reconcile_table(
    conn: &mut Connection,
    descriptor: &EntityDescriptor,
    options: &ReconcileOptions,
    run_id: &str,
) -> Result<TableReport, SchemaError> {
    descriptor.validate()?;
    let table = descriptor.table_name();

    if let Some(entry) = journal::pending(conn, table)? {
        let recovered = match options.strategy {
            RebuildStrategy::Transactional => {
                run_atomically(conn, table, |tx| recover(tx, descriptor, entry, run_id))?
            }
            RebuildStrategy::Journaled => recover(conn, descriptor, entry, run_id)?,
        };
        if let Some(report) = recovered {
            return Ok(report);
        }
    }

    let snapshot = introspect::inspect(conn, table)?;
    let diff = SchemaDiff::between(descriptor, &snapshot);

    match decide(descriptor.columns(), &snapshot) {
        DriftDecision::CreateFresh => {
            info!(table = %table, "Table missing, creating");
            match options.strategy {
                RebuildStrategy::Transactional => {
                    run_atomically(conn, table, |tx| rebuild::create_table(tx, descriptor))?
                }
                RebuildStrategy::Journaled => rebuild::create_table(conn, descriptor)?,
            }
            Ok(TableReport {
                table: table.to_string(),
                action: TableAction::Created,
                copied_columns: Vec::new(),
                rows_copied: 0,
                added_columns: diff.added,
                removed_columns: Vec::new(),
                index_failures: Vec::new(),
            })
        }
        DriftDecision::Rebuild => {
            info!(table = %table, added = ?diff.added, removed = ?diff.removed, "Rebuilding table");
            let outcome = match options.strategy {
                RebuildStrategy::Transactional => run_atomically(conn, table, |tx| {
                    rebuild::rebuild_table(tx, descriptor, None, &mut NoJournal)
                })?,
                RebuildStrategy::Journaled => {
                    let mut recorder =
                        JournalRecorder::new(table, &descriptor.backup_table_name(), run_id);
                    rebuild::rebuild_table(conn, descriptor, None, &mut recorder)?
                }
            };
            Ok(TableReport::from_outcome(TableAction::Rebuilt, diff, outcome))
        }
    }
}

fn run_atomically<T>(
    conn: &mut Connection,
    table: &str,
    f: impl FnOnce(&Connection) -> Result<T, SchemaError>,
) -> Result<T, SchemaError> {
    let tx = conn
        .transaction()
        .map_err(|e| SchemaError::ddl(table, RebuildStep::Begin, e))?;
    // Dropping `tx` on the error path rolls everything back.
    let value = f(&*tx)?;
    tx.commit()
        .map_err(|e| SchemaError::ddl(table, RebuildStep::Commit, e))?;
    Ok(value)
}

/// Finish a journaled rebuild that stopped part way. Returns `None` when the
/// original table was never moved and the normal pipeline should run.
fn recover(
    conn: &Connection,
    descriptor: &EntityDescriptor,
    entry: JournalEntry,
    run_id: &str,
) -> Result<Option<TableReport>, SchemaError> {
    let table = descriptor.table_name();
    let original = introspect::inspect(conn, table)?;
    let backup = introspect::inspect(conn, &entry.backup_table)?;

    let mut last_step = entry.last_step;
    if last_step < RebuildStep::Rename {
        // The rename commits before the journal catches up.
        if !original.table_exists && backup.table_exists {
            last_step = RebuildStep::Rename;
        } else {
            info!(table = %table, last_step = %entry.last_step, "Discarding journal entry, table was never moved");
            journal::clear(conn, table)?;
            return Ok(None);
        }
    }

    warn!(
        table = %table,
        last_step = %last_step,
        interrupted_run = %entry.run_id,
        "Resuming interrupted rebuild"
    );

    if !backup.table_exists {
        if last_step >= RebuildStep::Copy {
            journal::clear(conn, table)?;
            return Ok(Some(TableReport {
                table: table.to_string(),
                action: TableAction::Recovered,
                copied_columns: Vec::new(),
                rows_copied: 0,
                added_columns: Vec::new(),
                removed_columns: Vec::new(),
                index_failures: Vec::new(),
            }));
        }
        return Err(SchemaError::journal(
            table,
            format!(
                "rebuild stopped after {} but '{}' no longer exists; manual recovery required",
                last_step, entry.backup_table
            ),
        ));
    }

    let diff = SchemaDiff::between(descriptor, &backup);
    let resume_after = if last_step >= RebuildStep::Copy {
        RebuildStep::Copy
    } else {
        RebuildStep::Rename
    };
    let mut recorder = JournalRecorder::new(table, &entry.backup_table, run_id);
    let outcome = rebuild::rebuild_table(conn, descriptor, Some(resume_after), &mut recorder)?;
    Ok(Some(TableReport::from_outcome(TableAction::Recovered, diff, outcome)))
}
