//! SQLite driver.
//!
//! The only backend with a live connection implementation; it is used by
//! the command-line tool and by the end-to-end tests.
//!
//! - [`SqliteDialect`]: SQL syntax strategy for SQLite
//! - [`SqliteConnection`]: blocking connection over `rusqlite`
//! - [`SqliteConnector`]: opens file or shared in-memory databases

mod connection;
mod dialect;

pub use connection::{SqliteConnection, SqliteConnector};
pub use dialect::SqliteDialect;
