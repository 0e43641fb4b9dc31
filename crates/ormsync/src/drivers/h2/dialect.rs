//! H2 SQL dialect (Strategy pattern).
//!
//! H2 accepts the ANSI defaults almost unchanged; it adds a case-insensitive
//! VARCHAR type.

use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::DbType;

/// H2 dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct H2Dialect {
    options: DialectOptions,
}

impl H2Dialect {
    /// Create a new H2 dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for H2Dialect {
    fn name(&self) -> &str {
        "h2"
    }

    fn default_url(&self) -> &str {
        "jdbc:h2:mem:db1"
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
}
