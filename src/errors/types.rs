use thiserror::Error;

use crate::schema::RebuildStep;

/// Failures of the startup schema reconciliation. Everything except
/// `Connectivity` is tagged with the table that was being reconciled.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database unreachable: {0}")]
    Connectivity(String),

    #[error("Invalid entity descriptor for table '{table}': {message}")]
    InvalidDescriptor { table: String, message: String },

    #[error("Failed to read columns of table '{table}': {message}")]
    Introspection { table: String, message: String },

    #[error("DDL failed for table '{table}' during {step}: {message}")]
    Ddl {
        table: String,
        step: RebuildStep,
        message: String,
    },

    #[error("Data copy into table '{table}' failed: {message}")]
    DataCopy { table: String, message: String },

    #[error("Schema journal error for table '{table}': {message}")]
    Journal { table: String, message: String },
}

impl SchemaError {
    pub fn introspection(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SchemaError::Introspection {
            table: table.into(),
            message: err.to_string(),
        }
    }

    pub fn ddl(table: impl Into<String>, step: RebuildStep, err: impl std::fmt::Display) -> Self {
        SchemaError::Ddl {
            table: table.into(),
            step,
            message: err.to_string(),
        }
    }

    pub fn data_copy(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SchemaError::DataCopy {
            table: table.into(),
            message: err.to_string(),
        }
    }

    pub fn journal(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SchemaError::Journal {
            table: table.into(),
            message: err.to_string(),
        }
    }

    /// Table the failure belongs to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            SchemaError::Connectivity(_) => None,
            SchemaError::InvalidDescriptor { table, .. }
            | SchemaError::Introspection { table, .. }
            | SchemaError::Ddl { table, .. }
            | SchemaError::DataCopy { table, .. }
            | SchemaError::Journal { table, .. } => Some(table),
        }
    }
}

#[derive(Debug, Error)]
pub enum VulnFusionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema reconciliation failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_carries_table() {
        let err = SchemaError::ddl("task", RebuildStep::Create, "near \"(\": syntax error");
        assert_eq!(err.table(), Some("task"));
        let msg = err.to_string();
        assert!(msg.contains("'task'"));
        assert!(msg.contains("create"));
    }

    #[test]
    fn test_connectivity_has_no_table() {
        let err = SchemaError::Connectivity("unable to open database file".into());
        assert!(err.table().is_none());
    }

    #[test]
    fn test_schema_error_wraps_into_app_error() {
        let err: VulnFusionError = SchemaError::data_copy("user", "NOT NULL constraint failed").into();
        assert!(matches!(err, VulnFusionError::Schema(SchemaError::DataCopy { .. })));
        assert!(err.to_string().contains("user"));
    }
}
