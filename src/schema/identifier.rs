//! Identifier validation and quoting for generated DDL.
//!
//! Table, column and index names cannot be bound as statement parameters, so
//! every generated statement splices them in as double-quoted SQLite
//! identifiers. Names only ever come from entity descriptors or from the
//! catalog, but quoting keeps reserved words (`user`, `result`, `timestamp`)
//! and unusual characters working.

/// SQLite has no hard limit; keep names portable.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Check that a name can be used as an identifier. Returns a description of
/// the problem on failure.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("identifier cannot be empty".to_string());
    }
    if name.contains('\0') {
        return Err(format!("identifier contains a null byte: {:?}", name));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(format!(
            "identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        ));
    }
    Ok(())
}

/// Quote an identifier, doubling any embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote and comma-join a list of column names.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string literal (for column defaults).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
