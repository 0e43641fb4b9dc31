//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! PostgreSQL folds unquoted identifiers to lower case, so catalog lookups
//! use lower-case names.

use crate::core::identifier::IdentifierCase;
use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::identifier::escape_literal;
use crate::core::DbType;
use crate::error::Result;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    options: DialectOptions,
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgresql"
    }

    fn default_url(&self) -> &str {
        "jdbc:postgresql://127.0.0.1:5432/db1"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Lower
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Double => Some("DOUBLE PRECISION"),
            DbType::Blob => Some("BYTEA"),
            DbType::Clob => Some("TEXT"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_native_next_sequence(&self, name: &str, out: &mut String) -> Result<()> {
        let mut quoted = String::new();
        self.print_name(name, &mut quoted);
        out.push_str(&format!("SELECT nextval('{}')", escape_literal(&quoted)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};

    #[test]
    fn test_type_names() {
        let dialect = PostgresDialect::default();
        assert_eq!(dialect.type_keyword(DbType::Blob), Some("BYTEA"));
        assert_eq!(dialect.type_keyword(DbType::Double), Some("DOUBLE PRECISION"));
        assert_eq!(dialect.type_keyword(DbType::VarcharIgnoreCase), Some("VARCHAR"));
    }

    #[test]
    fn test_composite_primary_key() {
        let model = DatabaseModelBuilder::new("db")
            .table(
                TableBuilder::new("line")
                    .column(ColumnBuilder::new("order_id", ValueKind::Long).primary_key())
                    .column(ColumnBuilder::new("line_no", ValueKind::Int).primary_key())
                    .column(ColumnBuilder::new("payload", ValueKind::Bytes)),
            )
            .build()
            .unwrap();
        let mut sql = String::new();
        PostgresDialect::default()
            .print_create_table(model.table("line").unwrap(), &mut sql)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE line\n\t( order_id BIGINT NOT NULL\n\t, line_no INT NOT NULL\n\t, payload BYTEA\n\t, PRIMARY KEY (order_id, line_no)\n\t)"
        );
    }

    #[test]
    fn test_native_sequence() {
        let mut sql = String::new();
        PostgresDialect::default()
            .print_native_next_sequence("order_seq", &mut sql)
            .unwrap();
        assert_eq!(sql, "SELECT nextval('order_seq')");
    }

    #[test]
    fn test_identifier_case() {
        let dialect = PostgresDialect::default();
        assert_eq!(dialect.identifier_case().apply("ORD_Order"), "ord_order");
    }
}
