//! H2 database driver.
//!
//! - [`H2Dialect`]: SQL syntax strategy for H2

mod dialect;

pub use dialect::H2Dialect;
