use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::errors::{SchemaError, VulnFusionError};
use crate::models::registered_entities;
use crate::schema::{self, ReconcileOptions, ReconcileReport};

/// Shared handle to the tracker database. Only obtainable after every
/// registered entity table has been reconciled.
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
    report: Arc<ReconcileReport>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, options: &ReconcileOptions) -> Result<Self, VulnFusionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            SchemaError::Connectivity(format!("Failed to open database {}: {}", path.display(), e))
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| VulnFusionError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self::from_connection(conn, options)?;
        info!(path = %path.display(), "Database ready");
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, VulnFusionError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SchemaError::Connectivity(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn, &ReconcileOptions::default())
    }

    /// Reconcile the registered entities on an already open connection.
    pub fn from_connection(conn: Connection, options: &ReconcileOptions) -> Result<Self, VulnFusionError> {
        let ready = schema::reconcile_schema(conn, &registered_entities(), options)?;
        let (conn, report) = ready.into_parts();
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            report: Arc::new(report),
        })
    }

    /// What the startup reconciliation did.
    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    pub fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, VulnFusionError> {
        self.conn
            .lock()
            .map_err(|_| VulnFusionError::Internal("Database connection mutex poisoned".into()))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            report: self.report.clone(),
        }
    }
}

/// Open an existing database without reconciling it, for inspection.
pub fn open_read_only(path: impl AsRef<Path>) -> Result<Connection, VulnFusionError> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
        SchemaError::Connectivity(format!("Failed to open database {}: {}", path.display(), e))
    })?;
    schema::ping(&conn)?;
    Ok(conn)
}
