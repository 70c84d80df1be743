use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use crate::config::{VulnFusionConfig, DB_PATH_ENV};
use crate::db::open_read_only;
use crate::errors::VulnFusionError;
use crate::models::registered_entities;
use crate::schema::{self, journal, JournalEntry, SchemaDiff};
use super::commands::InspectArgs;

#[derive(Debug, Serialize)]
pub struct TableInspection {
    pub table: String,
    pub exists: bool,
    pub live_columns: Vec<String>,
    /// Declared columns the next rebuild would add.
    pub would_add: Vec<String>,
    /// Live columns the next rebuild would drop.
    pub would_drop: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub database: String,
    pub tables: Vec<TableInspection>,
    pub pending_journal: Vec<JournalEntry>,
}

pub async fn handle_inspect(args: InspectArgs, mut config: VulnFusionConfig) -> Result<(), VulnFusionError> {
    config.apply_overrides(std::env::var(DB_PATH_ENV).ok(), args.db.as_deref());
    let path = config.database.path.clone();

    if !Path::new(&path).exists() {
        return Err(VulnFusionError::NotFound(format!("Database not found: {}", path)));
    }

    let inspection = tokio::task::spawn_blocking(move || {
        let conn = open_read_only(&path)?;
        inspect_database(&conn, &path)
    })
    .await
    .map_err(|e| VulnFusionError::Internal(format!("Inspection task failed: {}", e)))??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        print!("{}", render_inspection(&inspection));
    }
    Ok(())
}

pub fn inspect_database(conn: &Connection, database: &str) -> Result<Inspection, VulnFusionError> {
    let mut tables = Vec::new();
    for descriptor in registered_entities() {
        let snapshot = schema::inspect(conn, descriptor.table_name())?;
        let diff = if snapshot.table_exists {
            SchemaDiff::between(&descriptor, &snapshot)
        } else {
            SchemaDiff::default()
        };
        tables.push(TableInspection {
            table: descriptor.table_name().to_string(),
            exists: snapshot.table_exists,
            live_columns: snapshot.column_names,
            would_add: diff.added,
            would_drop: diff.removed,
        });
    }

    Ok(Inspection {
        database: database.to_string(),
        tables,
        pending_journal: journal::list_pending(conn)?,
    })
}

fn render_inspection(inspection: &Inspection) -> String {
    let mut out = format!("Database: {}\n", inspection.database);
    for table in &inspection.tables {
        if !table.exists {
            out.push_str(&format!("  {:<8} missing (will be created)\n", table.table));
            continue;
        }
        out.push_str(&format!("  {:<8} {}\n", table.table, table.live_columns.join(", ")));
        if !table.would_add.is_empty() {
            out.push_str(&format!("           + {}\n", table.would_add.join(", ")));
        }
        if !table.would_drop.is_empty() {
            out.push_str(&format!("           - {}\n", table.would_drop.join(", ")));
        }
    }
    for entry in &inspection.pending_journal {
        out.push_str(&format!(
            "  pending rebuild of {} stopped after {} (run {})\n",
            entry.table_name, entry.last_step, entry.run_id
        ));
    }
    out
}
