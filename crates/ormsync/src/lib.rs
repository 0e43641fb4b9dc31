//! # ormsync
//!
//! Schema synchronization and persistence plumbing for relational databases.
//!
//! The library keeps a declared table model and a live database in step:
//!
//! - **Dialects** print DDL and DML for nine backends, from H2 to Oracle
//! - **Schema synchronization** diffs the catalog and creates what is missing
//! - **Key sequencing** hands out primary keys from a cached counter table
//! - **Sessions** save, update and load rows, resolving relations lazily
//!
//! SQLite is the bundled live backend; the other dialects generate SQL only.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ormsync::{Config, Database, DialectCatalog, Row, SqliteConnector};
//!
//! fn main() -> ormsync::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let connector = Arc::new(SqliteConnector::from_url(config.database.url.as_deref().unwrap_or("app.db")));
//!     let db = Database::from_config(&config, &DialectCatalog::with_builtins(), connector)?;
//!
//!     let session = db.session();
//!     let customer = Arc::new(Row::new(Arc::clone(db.model().require_table("customer")?)));
//!     customer.set("name", "Ann")?;
//!     session.save(&customer)?;
//!     session.commit()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod sequence;
pub mod session;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, LoadingPolicy, ParamsConfig};
pub use core::{
    Connection, Connector, DatabaseModel, DatabaseModelBuilder, DdlPolicy, Dialect,
    DialectCatalog, TableModel, Value,
};
pub use drivers::{SqliteConnection, SqliteConnector};
pub use error::{OrmError, Result};
pub use sequence::{KeyAssignment, Sequencer};
pub use session::{Database, LazyResolver, Row, Session, SessionContext};
pub use sync::{SchemaSynchronizer, SyncReport};
