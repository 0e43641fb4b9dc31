//! Dialect registry.
//!
//! The [`DialectCatalog`] maps configured dialect names to factories. It is
//! constructed explicitly and handed to whoever needs to resolve a name, so
//! tests can register their own dialects without global state.
//!
//! ```rust
//! use ormsync::core::{DialectCatalog, DialectOptions};
//!
//! let catalog = DialectCatalog::with_builtins();
//! let dialect = catalog.create("postgres", DialectOptions::default()).unwrap();
//! assert_eq!(dialect.name(), "postgresql");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{Dialect, DialectOptions};
use crate::error::{OrmError, Result};

/// Builds a dialect from the configured options.
pub type DialectFactory = fn(DialectOptions) -> Arc<dyn Dialect>;

/// Registry of dialect factories keyed by lower-case name.
#[derive(Default)]
pub struct DialectCatalog {
    factories: HashMap<String, DialectFactory>,
    /// Canonical names, in registration order, for listings.
    names: Vec<String>,
}

impl DialectCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with every built-in dialect registered.
    pub fn with_builtins() -> Self {
        use crate::drivers::{
            DerbyDialect, FirebirdDialect, H2Dialect, HsqldbDialect, MssqlDialect, MysqlDialect,
            OracleDialect, PostgresDialect, SqliteDialect,
        };

        let mut catalog = Self::new();
        catalog.register("h2", &[], |o| Arc::new(H2Dialect::new(o)));
        catalog.register("derby", &[], |o| Arc::new(DerbyDialect::new(o)));
        catalog.register("hsqldb", &["hsql"], |o| Arc::new(HsqldbDialect::new(o)));
        catalog.register("postgresql", &["postgres", "pg"], |o| {
            Arc::new(PostgresDialect::new(o))
        });
        catalog.register("mysql", &["mariadb"], |o| Arc::new(MysqlDialect::new(o)));
        catalog.register("mssql", &["sqlserver"], |o| Arc::new(MssqlDialect::new(o)));
        catalog.register("oracle", &[], |o| Arc::new(OracleDialect::new(o)));
        catalog.register("firebird", &[], |o| Arc::new(FirebirdDialect::new(o)));
        catalog.register("sqlite", &["sqlite3"], |o| Arc::new(SqliteDialect::new(o)));
        catalog
    }

    /// Register a dialect factory under a canonical name and optional aliases.
    pub fn register(&mut self, name: &str, aliases: &[&str], factory: DialectFactory) {
        let name = name.to_lowercase();
        if !self.names.contains(&name) {
            self.names.push(name.clone());
        }
        for alias in aliases {
            self.factories.insert(alias.to_lowercase(), factory);
        }
        self.factories.insert(name, factory);
    }

    /// Check if a dialect name (or alias) is registered.
    pub fn has_dialect(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Canonical names of every registered dialect.
    pub fn dialect_names(&self) -> &[String] {
        &self.names
    }

    /// Instantiate a dialect by name.
    pub fn create(&self, name: &str, options: DialectOptions) -> Result<Arc<dyn Dialect>> {
        let factory = self.factories.get(&name.to_lowercase()).ok_or_else(|| {
            OrmError::Config(format!(
                "Unknown dialect '{}'. Supported dialects: {}",
                name,
                self.names.join(", ")
            ))
        })?;
        Ok(factory(options))
    }
}

impl std::fmt::Debug for DialectCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectCatalog")
            .field("dialects", &self.names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let catalog = DialectCatalog::with_builtins();
        assert_eq!(catalog.dialect_names().len(), 9);
        assert!(catalog.has_dialect("MSSQL"));
        assert!(catalog.has_dialect("pg"));
        assert!(!catalog.has_dialect("db2"));
    }

    #[test]
    fn test_alias_resolves_to_canonical_dialect() {
        let catalog = DialectCatalog::with_builtins();
        let dialect = catalog.create("sqlserver", DialectOptions::default()).unwrap();
        assert_eq!(dialect.name(), "mssql");
    }

    #[test]
    fn test_unknown_dialect_lists_supported() {
        let catalog = DialectCatalog::with_builtins();
        let err = catalog.create("db2", DialectOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("db2"));
        assert!(msg.contains("postgresql"));
        assert!(msg.contains("firebird"));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = DialectCatalog::new();
        assert!(catalog.dialect_names().is_empty());
        assert!(catalog.create("h2", DialectOptions::default()).is_err());
    }
}
