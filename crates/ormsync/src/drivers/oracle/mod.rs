//! Oracle driver.
//!
//! - [`OracleDialect`]: SQL syntax strategy for Oracle

mod dialect;

pub use dialect::OracleDialect;
