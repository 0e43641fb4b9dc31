//! HSQLDB driver.
//!
//! - [`HsqldbDialect`]: SQL syntax strategy for HSQLDB

mod dialect;

pub use dialect::HsqldbDialect;
