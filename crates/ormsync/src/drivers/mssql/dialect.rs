//! Microsoft SQL Server dialect (Strategy pattern).
//!
//! Provides MSSQL-specific SQL syntax for identifier quoting, type names
//! and ROW_NUMBER() based pagination. A declared schema addresses a
//! database, so table names print as `schema.dbo.table`.

use crate::core::identifier::{quote_mssql, IdentifierCase};
use crate::core::traits::{ansi_type_keyword, page_end, print_type_length, Dialect, DialectOptions};
use crate::core::{ColumnModel, DbType, TableModel};
use crate::error::Result;

/// Longest declared length printed as-is; longer text and binary columns use `(MAX)`.
const MAX_INLINE_LENGTH: u32 = 8000;

/// MSSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect {
    options: DialectOptions,
}

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

/// Drop table qualifiers from an ORDER BY list: `a.id DESC, a.name` -> `id DESC, name`.
fn strip_qualifiers(order_by: &str) -> String {
    order_by
        .split(", ")
        .map(|item| item.rsplit_once('.').map_or(item, |(_, column)| column))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn default_url(&self) -> &str {
        "jdbc:sqlserver://localhost:1433"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_catalog_supported(&self) -> bool {
        true
    }

    fn is_multi_row_insert_supported(&self) -> bool {
        false
    }

    fn is_comment_supported(&self) -> bool {
        false
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Mixed
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_mssql(name)
    }

    fn print_full_name(&self, schema: Option<&str>, name: &str, out: &mut String) {
        if let Some(schema) = schema.filter(|s| !s.is_empty()) {
            self.print_name(schema, out);
            out.push_str(".dbo.");
        }
        self.print_name(name, out);
    }

    // The TIMESTAMP type of SQL Server is a row version, not a point in time.
    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Varchar | DbType::VarcharIgnoreCase | DbType::Clob => Some("NVARCHAR"),
            DbType::Blob => Some("VARBINARY"),
            DbType::Timestamp => Some("DATETIME"),
            DbType::Boolean => Some("TINYINT"),
            DbType::Double => Some("FLOAT"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_column_type(&self, column: &ColumnModel, out: &mut String) -> Result<()> {
        let type_name = self.column_type_name(column)?;
        out.push_str(&type_name);
        let unbounded = match column.db_type {
            DbType::Blob | DbType::Clob => true,
            DbType::Varchar | DbType::VarcharIgnoreCase => {
                column.max_length.is_some_and(|l| l > MAX_INLINE_LENGTH)
            }
            _ => false,
        };
        if unbounded {
            out.push_str("(MAX)");
        } else {
            print_type_length(column, out);
        }
        Ok(())
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn print_create_schema(&self, schema: &str, out: &mut String) -> Result<()> {
        out.push_str("IF NOT EXISTS (SELECT * FROM sys.databases WHERE name = '");
        out.push_str(&schema.replace('\'', "''"));
        out.push_str("') BEGIN CREATE DATABASE ");
        out.push_str(&quote_mssql(schema));
        out.push_str(" END");
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
        sql.push_str(" ADD ");
        self.print_column_declaration(table, column, &mut sql)?;
        out.push_str(&sql);
        Ok(())
    }

    /// Number the rows of the base query and keep the requested window.
    ///
    /// A trailing `ORDER BY` of the base query moves into `OVER()`; without
    /// one the numbering order is arbitrary.
    fn paginate(&self, offset: u64, limit: Option<u64>, base: &str, out: &mut String) -> Result<()> {
        if limit.is_none() && offset == 0 {
            out.push_str(base);
            return Ok(());
        }
        let (body, order_by) = match base.rfind(" ORDER BY ") {
            Some(pos) => (&base[..pos], strip_qualifiers(&base[pos + " ORDER BY ".len()..])),
            None => (base, "(SELECT 1)".to_string()),
        };

        out.push_str("SELECT * FROM (\nSELECT MyBase.*, ROW_NUMBER() OVER (ORDER BY ");
        out.push_str(&order_by);
        out.push_str(") AS RowNum FROM (\n");
        out.push_str(body);
        out.push_str("\n) AS MyBase\n) AS MyInnerTable WHERE MyInnerTable.RowNum ");
        match limit {
            // RowNum starts at 1 and BETWEEN is inclusive.
            Some(limit) => {
                let (first, last) = (page_end(offset, 1), page_end(offset, limit));
                out.push_str(&format!("BETWEEN {first} AND {last}"));
            }
            None => out.push_str(&format!("> {offset}")),
        }
        out.push_str(" ORDER BY MyInnerTable.RowNum");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};
    use crate::testing::{quoted, shop_model, table};

    #[test]
    fn test_quote_identifier() {
        let dialect = MssqlDialect::default();
        assert_eq!(dialect.quote_identifier("Users"), "[Users]");
        assert_eq!(dialect.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_catalog_qualified_name() {
        let model = DatabaseModelBuilder::new("db")
            .default_schema("sales")
            .table(TableBuilder::new("item").column(ColumnBuilder::new("id", ValueKind::Int).primary_key()))
            .build()
            .unwrap();
        let mut sql = String::new();
        MssqlDialect::new(quoted()).print_delete(model.table("item").unwrap(), &mut sql);
        assert_eq!(sql, "DELETE FROM [sales].dbo.[item] WHERE [id]=?");
    }

    #[test]
    fn test_column_types() {
        let model = DatabaseModelBuilder::new("db")
            .table(
                TableBuilder::new("doc")
                    .column(ColumnBuilder::new("id", ValueKind::Int).primary_key())
                    .column(ColumnBuilder::new("flag", ValueKind::Bool).default_value(true))
                    .column(ColumnBuilder::new("body", ValueKind::Text).length(10_000))
                    .column(ColumnBuilder::new("data", ValueKind::Bytes)),
            )
            .build()
            .unwrap();
        let mut sql = String::new();
        MssqlDialect::default()
            .print_create_table(model.table("doc").unwrap(), &mut sql)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE doc\n\t( id INT NOT NULL PRIMARY KEY\n\t, flag TINYINT DEFAULT 1\n\t, body NVARCHAR(MAX)\n\t, data VARBINARY(MAX)\n\t)"
        );
    }

    #[test]
    fn test_create_schema_creates_database() {
        let mut sql = String::new();
        MssqlDialect::default().print_create_schema("crm", &mut sql).unwrap();
        assert_eq!(
            sql,
            "IF NOT EXISTS (SELECT * FROM sys.databases WHERE name = 'crm') BEGIN CREATE DATABASE [crm] END"
        );
    }

    #[test]
    fn test_add_column_without_keyword() {
        let model = shop_model(Default::default());
        let order = table(&model, "ord_order");
        let mut sql = String::new();
        MssqlDialect::default()
            .print_alter_table_add_column(order, order.column("note").unwrap(), &mut sql)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE ord_order ADD note NVARCHAR(200)");
    }

    #[test]
    fn test_pagination_moves_order_into_row_number() {
        let mut sql = String::new();
        MssqlDialect::default()
            .paginate(20, Some(10), "SELECT c.id\n\tFROM customer c ORDER BY c.id", &mut sql)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (\nSELECT MyBase.*, ROW_NUMBER() OVER (ORDER BY id) AS RowNum FROM (\nSELECT c.id\n\tFROM customer c\n) AS MyBase\n) AS MyInnerTable WHERE MyInnerTable.RowNum BETWEEN 21 AND 30 ORDER BY MyInnerTable.RowNum"
        );
    }

    #[test]
    fn test_pagination_offset_only() {
        let mut sql = String::new();
        MssqlDialect::default().paginate(5, None, "SELECT 1", &mut sql).unwrap();
        assert!(sql.contains("OVER (ORDER BY (SELECT 1))"));
        assert!(sql.contains("WHERE MyInnerTable.RowNum > 5"));
    }

    #[test]
    fn test_insert_by_select_without_from() {
        let model = shop_model(Default::default());
        let mut sql = String::new();
        MssqlDialect::default().print_multi_row_insert(table(&model, "customer"), 2, &mut sql);
        assert_eq!(
            sql,
            "INSERT INTO customer (id, name)\nSELECT ?, ? UNION ALL\nSELECT ?, ?"
        );
    }
}
