//! Declarative description of a storable entity: its table name, ordered
//! columns and secondary indexes. A descriptor is the single source of truth
//! for the desired schema; `CREATE` statements are derived from it.

use serde::Serialize;
use std::collections::HashSet;

use crate::errors::SchemaError;
use super::identifier::{quote_ident, quote_list, quote_literal, validate_identifier};
use super::journal::JOURNAL_TABLE;

/// Suffix appended to a table name while it is being rebuilt.
pub const BACKUP_SUFFIX: &str = "_backup";

/// SQLite storage class declared for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }
}

/// Default applied to rows that do not supply the column, including rows
/// carried across a rebuild from a table that lacked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DefaultValue {
    Text(String),
    Integer(i64),
    Real(f64),
    /// Raw SQL expression, emitted in parentheses.
    Expression(String),
}

impl DefaultValue {
    pub fn to_sql(&self) -> String {
        match self {
            Self::Text(v) => quote_literal(v),
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => v.to_string(),
            Self::Expression(expr) => format!("({})", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<DefaultValue>,
    /// Created with the table but never carried across a rebuild.
    pub exclude_from_migration: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            autoincrement: false,
            not_null: false,
            unique: false,
            default: None,
            exclude_from_migration: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_text(mut self, value: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Text(value.into()));
        self
    }

    pub fn default_integer(mut self, value: i64) -> Self {
        self.default = Some(DefaultValue::Integer(value));
        self
    }

    pub fn default_real(mut self, value: f64) -> Self {
        self.default = Some(DefaultValue::Real(value));
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Expression(expr.into()));
        self
    }

    pub fn exclude_from_migration(mut self) -> Self {
        self.exclude_from_migration = true;
        self
    }

    /// Column definition as it appears inside `CREATE TABLE`. `inline_pk` is
    /// false when the table declares a composite key as a table constraint.
    fn definition_sql(&self, inline_pk: bool) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.column_type.as_sql());
        if self.primary_key && inline_pk {
            def.push_str(" PRIMARY KEY");
            if self.autoincrement {
                def.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            def.push_str(" DEFAULT ");
            def.push_str(&default.to_sql());
        }
        def
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn create_sql(&self, table: &str) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name),
            quote_ident(table),
            quote_list(&self.columns)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    table: String,
    columns: Vec<ColumnSpec>,
    indexes: Vec<IndexSpec>,
}

impl EntityDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn backup_table_name(&self) -> String {
        format!("{}{}", self.table, BACKUP_SUFFIX)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Declared column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |message: String| SchemaError::InvalidDescriptor {
            table: self.table.clone(),
            message,
        };

        validate_identifier(&self.table).map_err(|e| invalid(format!("table name: {}", e)))?;
        if self.table.ends_with(BACKUP_SUFFIX) {
            return Err(invalid(format!(
                "table name must not end with '{}' (reserved for rebuild backups)",
                BACKUP_SUFFIX
            )));
        }
        if self.table.to_ascii_lowercase().starts_with("sqlite_")
            || self.table.eq_ignore_ascii_case(JOURNAL_TABLE)
        {
            return Err(invalid(format!("table name '{}' is reserved", self.table)));
        }
        if self.columns.is_empty() {
            return Err(invalid("no columns declared".into()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier(&column.name)
                .map_err(|e| invalid(format!("column name: {}", e)))?;
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(invalid(format!("duplicate column '{}'", column.name)));
            }
        }

        let pk_count = self.columns.iter().filter(|c| c.primary_key).count();
        for column in self.columns.iter().filter(|c| c.autoincrement) {
            if column.column_type != ColumnType::Integer || pk_count != 1 {
                return Err(invalid(format!(
                    "column '{}': AUTOINCREMENT requires a single INTEGER primary key",
                    column.name
                )));
            }
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            validate_identifier(&index.name)
                .map_err(|e| invalid(format!("index name: {}", e)))?;
            if !index_names.insert(index.name.to_ascii_lowercase()) {
                return Err(invalid(format!("duplicate index '{}'", index.name)));
            }
            if index.columns.is_empty() {
                return Err(invalid(format!("index '{}' has no columns", index.name)));
            }
            for col in &index.columns {
                if !seen.contains(&col.to_ascii_lowercase()) {
                    return Err(invalid(format!(
                        "index '{}' references undeclared column '{}'",
                        index.name, col
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn create_table_sql(&self) -> String {
        let pk: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        let inline_pk = pk.len() <= 1;

        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.definition_sql(inline_pk))
            .collect();
        if !inline_pk {
            defs.push(format!("PRIMARY KEY ({})", quote_list(&pk)));
        }

        format!("CREATE TABLE {} ({})", quote_ident(&self.table), defs.join(", "))
    }

    /// `CREATE TABLE` followed by one `CREATE INDEX` per declared index.
    pub fn create_statements(&self) -> Vec<String> {
        let mut statements = vec![self.create_table_sql()];
        statements.extend(self.indexes.iter().map(|i| i.create_sql(&self.table)));
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_descriptor() -> EntityDescriptor {
        EntityDescriptor::new("user")
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::text("username").not_null().unique())
            .column(ColumnSpec::text("password").not_null())
            .column(ColumnSpec::text("role").default_text("user"))
    }

    #[test]
    fn test_create_table_sql() {
        let sql = user_descriptor().create_table_sql();
        assert_eq!(
            sql,
            "CREATE TABLE \"user\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"username\" TEXT NOT NULL UNIQUE, \"password\" TEXT NOT NULL, \
             \"role\" TEXT DEFAULT 'user')"
        );
    }

    #[test]
    fn test_composite_primary_key_is_table_constraint() {
        let desc = EntityDescriptor::new("membership")
            .column(ColumnSpec::integer("user_id").primary_key())
            .column(ColumnSpec::integer("group_id").primary_key());
        let sql = desc.create_table_sql();
        assert!(sql.ends_with("PRIMARY KEY (\"user_id\", \"group_id\"))"));
        assert!(!sql.contains("INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_create_statements_include_indexes() {
        let desc = EntityDescriptor::new("task")
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::integer("user_id").not_null())
            .index(IndexSpec::new("idx_task_user_id", ["user_id"]));
        let stmts = desc.create_statements();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[1],
            "CREATE INDEX \"idx_task_user_id\" ON \"task\" (\"user_id\")"
        );
    }

    #[test]
    fn test_default_value_rendering() {
        assert_eq!(DefaultValue::Integer(0).to_sql(), "0");
        assert_eq!(DefaultValue::Real(0.5).to_sql(), "0.5");
        assert_eq!(DefaultValue::Text("it's".into()).to_sql(), "'it''s'");
        assert_eq!(
            DefaultValue::Expression("CURRENT_TIMESTAMP".into()).to_sql(),
            "(CURRENT_TIMESTAMP)"
        );
    }

    #[test]
    fn test_backup_table_name() {
        assert_eq!(user_descriptor().backup_table_name(), "user_backup");
    }

    #[test]
    fn test_validate_accepts_user() {
        assert!(user_descriptor().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let desc = user_descriptor().column(ColumnSpec::text("Username"));
        let err = desc.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_validate_rejects_backup_suffix() {
        let desc = EntityDescriptor::new("user_backup").column(ColumnSpec::integer("id"));
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_names() {
        let journal = EntityDescriptor::new("_schema_journal").column(ColumnSpec::integer("id"));
        assert!(journal.validate().is_err());
        let internal = EntityDescriptor::new("sqlite_stat1").column(ColumnSpec::integer("id"));
        assert!(internal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_index_column() {
        let desc = user_descriptor().index(IndexSpec::new("idx_user_email", ["email"]));
        let err = desc.validate().unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_validate_rejects_autoincrement_on_text() {
        let desc = EntityDescriptor::new("tag").column(ColumnSpec::text("name").autoincrement());
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_descriptor() {
        assert!(EntityDescriptor::new("empty").validate().is_err());
    }
}
