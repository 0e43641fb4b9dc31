//! HSQLDB SQL dialect (Strategy pattern).

use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::DbType;
use crate::error::Result;

/// HSQLDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct HsqldbDialect {
    options: DialectOptions,
}

impl HsqldbDialect {
    /// Create a new HSQLDB dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for HsqldbDialect {
    fn name(&self) -> &str {
        "hsqldb"
    }

    fn default_url(&self) -> &str {
        "jdbc:hsqldb:mem:db1"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::VarcharIgnoreCase => Some("VARCHAR_IGNORECASE"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_create_schema(&self, schema: &str, out: &mut String) -> Result<()> {
        out.push_str("CREATE SCHEMA ");
        self.print_name(schema, out);
        out.push_str(" AUTHORIZATION DBA");
        Ok(())
    }
}
