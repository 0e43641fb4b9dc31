//! Apache Derby SQL dialect (Strategy pattern).
//!
//! Derby has no multi-row INSERT, no comments and no `IF NOT EXISTS`; its
//! foreign keys are created as named constraints and it pages with
//! `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY`.

use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::{ColumnModel, DbType, TableModel};
use crate::error::Result;

/// Derby dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct DerbyDialect {
    options: DialectOptions,
}

impl DerbyDialect {
    /// Create a new Derby dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for DerbyDialect {
    fn name(&self) -> &str {
        "derby"
    }

    fn default_url(&self) -> &str {
        "jdbc:derby:memory:db1;create=true"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_multi_row_insert_supported(&self) -> bool {
        false
    }

    fn is_comment_supported(&self) -> bool {
        false
    }

    fn insert_by_select_from(&self) -> &str {
        "FROM SYSIBM.SYSDUMMY1"
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Int => Some("INTEGER"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_create_schema(&self, schema: &str, out: &mut String) -> Result<()> {
        out.push_str("CREATE SCHEMA ");
        self.print_name(schema, out);
        Ok(())
    }

    fn foreign_key_name(&self, table: &TableModel, column: &ColumnModel) -> Option<String> {
        Some(format!("fk_{}_{}", table.name, column.name))
    }

    fn paginate(&self, offset: u64, limit: Option<u64>, base: &str, out: &mut String) -> Result<()> {
        out.push_str(base);
        if offset > 0 {
            out.push_str(&format!(" OFFSET {offset} ROWS"));
        }
        if let Some(limit) = limit {
            out.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
        Ok(())
    }
}
