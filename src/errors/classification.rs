use super::types::{SchemaError, VulnFusionError};

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub exit_code: i32,
}

impl VulnFusionError {
    /// Classify this error into a stable type name and the process exit code
    /// used when it aborts startup.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            VulnFusionError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                exit_code: 2,
            },
            VulnFusionError::Schema(schema) => schema.classify(),
            VulnFusionError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                exit_code: 1,
            },
            VulnFusionError::NotFound(_) => ErrorClassification {
                error_type: "NotFoundError",
                exit_code: 1,
            },
            VulnFusionError::Io(_) => ErrorClassification {
                error_type: "IoError",
                exit_code: 1,
            },
            VulnFusionError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                exit_code: 1,
            },
            VulnFusionError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                exit_code: 2,
            },
            VulnFusionError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                exit_code: 1,
            },
        }
    }
}

impl SchemaError {
    pub fn classify(&self) -> ErrorClassification {
        match self {
            SchemaError::Connectivity(_) => ErrorClassification {
                error_type: "ConnectivityError",
                exit_code: 3,
            },
            SchemaError::InvalidDescriptor { .. } => ErrorClassification {
                error_type: "InvalidDescriptorError",
                exit_code: 4,
            },
            SchemaError::Introspection { .. } => ErrorClassification {
                error_type: "IntrospectionError",
                exit_code: 4,
            },
            SchemaError::Ddl { .. } => ErrorClassification {
                error_type: "DDLError",
                exit_code: 4,
            },
            SchemaError::DataCopy { .. } => ErrorClassification {
                error_type: "DataCopyError",
                exit_code: 4,
            },
            SchemaError::Journal { .. } => ErrorClassification {
                error_type: "JournalError",
                exit_code: 4,
            },
        }
    }
}
