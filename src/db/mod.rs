pub mod connection;
pub mod results;
pub mod tasks;
pub mod users;

pub use connection::{open_read_only, Database};
pub use users::UserUpdate;

use chrono::{DateTime, Utc};

/// Read an RFC 3339 text column.
pub(crate) fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
