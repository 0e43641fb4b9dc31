//! Firebird driver.
//!
//! - [`FirebirdDialect`]: SQL syntax strategy for Firebird

mod dialect;

pub use dialect::FirebirdDialect;
