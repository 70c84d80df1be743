use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::errors::SchemaError;

/// Physical shape of a table as the catalog reports it right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchemaSnapshot {
    pub table_exists: bool,
    /// Column names in catalog (`cid`) order.
    pub column_names: Vec<String>,
}

impl LiveSchemaSnapshot {
    pub fn absent() -> Self {
        Self::default()
    }

    /// SQLite resolves column names case-insensitively, so matching does too.
    pub fn contains(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// Read the live column list of `table`. A missing table is a normal outcome
/// (`table_exists == false`); only failing catalog queries are errors.
pub fn inspect(conn: &Connection, table: &str) -> Result<LiveSchemaSnapshot, SchemaError> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            rusqlite::params![table],
            |row| row.get(0),
        )
        .map_err(|e| SchemaError::introspection(table, e))?;

    if !exists {
        return Ok(LiveSchemaSnapshot::absent());
    }

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(|e| SchemaError::introspection(table, e))?;
    let rows = stmt
        .query_map(rusqlite::params![table], |row| row.get::<_, String>(0))
        .map_err(|e| SchemaError::introspection(table, e))?;

    let mut column_names = Vec::new();
    for row in rows {
        column_names.push(row.map_err(|e| SchemaError::introspection(table, e))?);
    }

    Ok(LiveSchemaSnapshot {
        table_exists: true,
        column_names,
    })
}

/// Table an index is attached to, or `None` if no index has that name.
pub fn index_owner(conn: &Connection, index: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT tbl_name FROM sqlite_master WHERE type = 'index' AND name = ?1",
        rusqlite::params![index],
        |row| row.get::<_, String>(0),
    )
    .optional()
}
