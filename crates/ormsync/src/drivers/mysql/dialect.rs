//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! A MySQL "schema" is a database, so schema creation issues
//! `CREATE DATABASE`. Comments are attached with `ALTER TABLE`.

use crate::core::identifier::{escape_literal, quote_mysql, IdentifierCase};
use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::{ColumnModel, DbType, TableModel};
use crate::error::Result;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect {
    options: DialectOptions,
}

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn default_url(&self) -> &str {
        "jdbc:mysql://127.0.0.1:3306/db1"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_catalog_supported(&self) -> bool {
        true
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Mixed
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_mysql(name)
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Timestamp => Some("DATETIME"),
            DbType::Clob => Some("LONGTEXT"),
            DbType::Blob => Some("LONGBLOB"),
            other => ansi_type_keyword(other),
        }
    }

    fn table_suffix(&self) -> String {
        if self.options.mysql_engine.is_empty() {
            String::new()
        } else {
            format!(" ENGINE = {}", self.options.mysql_engine)
        }
    }

    /// MySQL has no sequence objects.
    fn print_native_next_sequence(&self, _name: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn print_create_schema(&self, schema: &str, out: &mut String) -> Result<()> {
        out.push_str("CREATE DATABASE IF NOT EXISTS ");
        self.print_name(schema, out);
        Ok(())
    }

    fn print_comment_table(&self, table: &TableModel, out: &mut String) -> Result<()> {
        let Some(comment) = table.comment.as_deref() else {
            return Ok(());
        };
        out.push_str("ALTER TABLE ");
        self.print_full_table_name(table, out);
        out.push_str(" COMMENT = '");
        out.push_str(&escape_literal(comment));
        out.push('\'');
        Ok(())
    }

    /// `MODIFY COLUMN` restates the whole declaration, so hand-made changes
    /// to the column not present in the model are reverted.
    fn print_comment_column(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let Some(comment) = column.comment.as_deref() else {
            return Ok(());
        };
        let mut declaration = String::new();
        self.print_column_declaration(table, column, &mut declaration)?;

        out.push_str("ALTER TABLE ");
        self.print_full_table_name(table, out);
        out.push_str(" MODIFY COLUMN ");
        out.push_str(&declaration.replace(" PRIMARY KEY", ""));
        out.push_str(" COMMENT '");
        out.push_str(&escape_literal(comment));
        out.push('\'');
        Ok(())
    }
}
