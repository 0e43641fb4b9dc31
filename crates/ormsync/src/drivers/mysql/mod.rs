//! MySQL/MariaDB driver.
//!
//! - [`MysqlDialect`]: SQL syntax strategy for MySQL

mod dialect;

pub use dialect::MysqlDialect;
