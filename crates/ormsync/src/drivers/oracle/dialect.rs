//! Oracle SQL dialect (Strategy pattern).
//!
//! Oracle schemas are users and cannot be created by the synchronizer.
//! Pagination wraps the query in a ROWNUM filter.

use crate::core::traits::{ansi_type_keyword, page_end, Dialect, DialectOptions};
use crate::core::{ColumnModel, DbType, TableModel};
use crate::error::Result;

/// Oracle dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct OracleDialect {
    options: DialectOptions,
}

impl OracleDialect {
    /// Create a new Oracle dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &str {
        "oracle"
    }

    fn default_url(&self) -> &str {
        "jdbc:oracle:thin:@myhost:1521:orcl"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_multi_row_insert_supported(&self) -> bool {
        false
    }

    fn insert_by_select_from(&self) -> &str {
        "FROM DUAL"
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Varchar | DbType::VarcharIgnoreCase => Some("VARCHAR2"),
            DbType::Int => Some("INTEGER"),
            DbType::BigInt => Some("NUMBER(19)"),
            DbType::Boolean => Some("NUMBER(1)"),
            DbType::Decimal => Some("NUMBER"),
            DbType::Double => Some("DOUBLE PRECISION"),
            DbType::Time => Some("TIMESTAMP"),
            other => ansi_type_keyword(other),
        }
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn print_create_schema(&self, _schema: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn print_alter_table_add_column(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let mut sql = String::from("ALTER TABLE ");
        self.print_full_table_name(table, &mut sql);
        sql.push_str(" ADD (");
        self.print_column_declaration(table, column, &mut sql)?;
        sql.push(')');
        out.push_str(&sql);
        Ok(())
    }

    fn print_native_next_sequence(&self, name: &str, out: &mut String) -> Result<()> {
        out.push_str("SELECT ");
        self.print_name(name, out);
        out.push_str(".NEXTVAL FROM DUAL");
        Ok(())
    }

    fn paginate(&self, offset: u64, limit: Option<u64>, base: &str, out: &mut String) -> Result<()> {
        if limit.is_none() && offset == 0 {
            out.push_str(base);
            return Ok(());
        }
        out.push_str("SELECT * FROM (SELECT paged__.*, ROWNUM AS paged_rownum FROM (\n");
        out.push_str(base);
        out.push_str(&format!("\n) paged__) WHERE paged_rownum > {offset}"));
        if let Some(limit) = limit {
            out.push_str(&format!(" AND paged_rownum <= {}", page_end(offset, limit)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SequenceTable;
    use crate::testing::{shop_model, table};

    #[test]
    fn test_add_column_in_parentheses() {
        let model = shop_model(Default::default());
        let order = table(&model, "ord_order");
        let mut sql = String::new();
        OracleDialect::default()
            .print_alter_table_add_column(order, order.column("note").unwrap(), &mut sql)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE ord_order ADD (note VARCHAR2(200))");
    }

    #[test]
    fn test_create_schema_is_noop() {
        let mut sql = String::new();
        OracleDialect::default().print_create_schema("crm", &mut sql).unwrap();
        assert!(sql.is_empty());
    }

    #[test]
    fn test_rownum_pagination() {
        let mut sql = String::new();
        OracleDialect::default()
            .paginate(10, Some(5), "SELECT 1 FROM DUAL", &mut sql)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT paged__.*, ROWNUM AS paged_rownum FROM (\nSELECT 1 FROM DUAL\n) paged__) WHERE paged_rownum > 10 AND paged_rownum <= 15"
        );
    }

    #[test]
    fn test_native_sequence() {
        let mut sql = String::new();
        OracleDialect::default()
            .print_native_next_sequence("order_seq", &mut sql)
            .unwrap();
        assert_eq!(sql, "SELECT order_seq.NEXTVAL FROM DUAL");
    }

    #[test]
    fn test_sequence_table_types() {
        let mut sql = String::new();
        OracleDialect::default()
            .print_sequence_table(&SequenceTable::default(), 64, &mut sql)
            .unwrap();
        assert!(sql.contains("id VARCHAR2(96) NOT NULL PRIMARY KEY"));
        assert!(sql.contains("seq NUMBER(19) DEFAULT 64 NOT NULL"));
        assert!(sql.contains("cache INTEGER DEFAULT 64 NOT NULL"));
    }
}
