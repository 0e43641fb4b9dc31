//! Apache Derby driver.
//!
//! - [`DerbyDialect`]: SQL syntax strategy for Derby

mod dialect;

pub use dialect::DerbyDialect;
