//! Firebird SQL dialect (Strategy pattern).
//!
//! Firebird has no schemas; table names are always printed unqualified.

use crate::core::traits::{ansi_type_keyword, page_end, Dialect, DialectOptions};
use crate::core::DbType;
use crate::error::Result;

/// Firebird dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct FirebirdDialect {
    options: DialectOptions,
}

impl FirebirdDialect {
    /// Create a new Firebird dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for FirebirdDialect {
    fn name(&self) -> &str {
        "firebird"
    }

    fn default_url(&self) -> &str {
        "jdbc:firebirdsql:localhost/3050:db1.fdb"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_schema_supported(&self) -> bool {
        false
    }

    fn is_multi_row_insert_supported(&self) -> bool {
        false
    }

    fn insert_by_select_from(&self) -> &str {
        "FROM RDB$DATABASE"
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Double => Some("DOUBLE PRECISION"),
            DbType::Blob => Some("BLOB SUB_TYPE BINARY"),
            DbType::Clob => Some("BLOB SUB_TYPE TEXT"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_create_schema(&self, _schema: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    /// `ROWS m TO n` with 1-based inclusive bounds.
    fn paginate(&self, offset: u64, limit: Option<u64>, base: &str, out: &mut String) -> Result<()> {
        out.push_str(base);
        if limit.is_none() && offset == 0 {
            return Ok(());
        }
        let last = limit.map_or(i64::MAX as u64, |limit| page_end(offset, limit));
        out.push_str(&format!(" ROWS {} TO {}", page_end(offset, 1), last));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};

    #[test]
    fn test_schema_is_ignored() {
        let model = DatabaseModelBuilder::new("db")
            .default_schema("crm")
            .table(
                TableBuilder::new("note")
                    .column(ColumnBuilder::new("id", ValueKind::Int).primary_key())
                    .column(ColumnBuilder::new("body", ValueKind::Text).db_type(DbType::Clob)),
            )
            .build()
            .unwrap();
        let mut sql = String::new();
        FirebirdDialect::default()
            .print_create_table(model.table("note").unwrap(), &mut sql)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE note\n\t( id INT NOT NULL PRIMARY KEY\n\t, body BLOB SUB_TYPE TEXT\n\t)"
        );
    }

    #[test]
    fn test_rows_pagination() {
        let mut sql = String::new();
        FirebirdDialect::default()
            .paginate(10, Some(5), "SELECT 1 FROM RDB$DATABASE", &mut sql)
            .unwrap();
        assert_eq!(sql, "SELECT 1 FROM RDB$DATABASE ROWS 11 TO 15");
    }
}
