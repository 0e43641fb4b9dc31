//! Identifier validation, quoting and case normalization.
//!
//! SQL identifiers (table, column, index and schema names) cannot be bound as
//! statement parameters, so every generated DDL/DML statement splices them in
//! as text. Names are validated once when the model is built and quoted by
//! the dialect only when identifier quoting is enabled.
//!
//! Catalog introspection returns names in the backend's storage convention
//! (upper case for H2/Oracle/Derby/Firebird/HSQLDB, lower case for PostgreSQL,
//! as-declared for the rest). [`IdentifierCase`] converts a declared name to
//! that convention before the catalog lookup and [`normalize`] gives the
//! case-insensitive key used when comparing declared and live names.

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, Result};

/// Maximum identifier length accepted by the model builder.
/// - Oracle (12.2+): 128 bytes
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate a declared identifier.
///
/// Rejects empty names, names containing a null byte and names longer than
/// [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OrmError::Model("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(OrmError::Model(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(OrmError::Model(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote with ANSI double quotes, doubling embedded quotes.
pub fn quote_ansi(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a MySQL identifier using backticks.
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a SQL Server identifier using brackets.
pub fn quote_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Escape a string for use inside a single-quoted SQL literal.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Case-insensitive comparison key for declared and catalog names.
pub fn normalize(name: &str) -> String {
    name.to_uppercase()
}

/// How a backend stores unquoted identifiers in its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    /// Folded to upper case (ANSI behaviour).
    #[default]
    Upper,
    /// Folded to lower case.
    Lower,
    /// Stored as written.
    Mixed,
}

impl IdentifierCase {
    /// Convert a declared name to the catalog's storage convention.
    pub fn apply(self, name: &str) -> String {
        match self {
            IdentifierCase::Upper => name.to_uppercase(),
            IdentifierCase::Lower => name.to_lowercase(),
            IdentifierCase::Mixed => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("order_item").is_ok());
        assert!(validate_identifier("日本語").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_identifier(&long_name).is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_quote_styles_escape_delimiters() {
        assert_eq!(quote_ansi("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_mysql("a`b"), "`a``b`");
        assert_eq!(quote_mssql("a]b"), "[a]]b]");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("it's"), "it''s");
    }

    #[test]
    fn test_identifier_case_apply() {
        assert_eq!(IdentifierCase::Upper.apply("Orders"), "ORDERS");
        assert_eq!(IdentifierCase::Lower.apply("Orders"), "orders");
        assert_eq!(IdentifierCase::Mixed.apply("Orders"), "Orders");
    }
}
