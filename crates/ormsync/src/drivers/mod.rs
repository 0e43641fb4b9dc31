//! Database driver implementations.
//!
//! Each driver module implements the [`Dialect`](crate::core::Dialect)
//! strategy for one backend and overrides only the SQL fragments that
//! differ from the ANSI defaults:
//!
//! - [`h2`], [`hsqldb`], [`derby`]: embedded Java databases
//! - [`postgres`], [`mysql`], [`mssql`], [`oracle`], [`firebird`]: servers
//! - [`sqlite`]: embedded, with a live [`SqliteConnection`]
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with a `dialect.rs`
//! 2. Implement `Dialect`, overriding the type keywords and statements that differ
//! 3. Register the dialect in `DialectCatalog::with_builtins()`

pub mod derby;
pub mod firebird;
pub mod h2;
pub mod hsqldb;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlite;

pub use derby::DerbyDialect;
pub use firebird::FirebirdDialect;
pub use h2::H2Dialect;
pub use hsqldb::HsqldbDialect;
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::{SqliteConnection, SqliteConnector, SqliteDialect};
