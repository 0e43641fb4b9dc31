//! Core abstractions shared by the synchronizer, the sequencer and sessions.
//!
//! - [`schema`]: declared tables, columns, keys, indexes and relations
//! - [`builder`]: fluent construction and validation of the declared model
//! - [`value`]: column values and their declared kinds
//! - [`identifier`]: identifier validation, quoting and case handling
//! - [`traits`]: the `Dialect` strategy and the blocking connection traits
//! - [`catalog`]: dialect registry
//!
//! Backends live under `drivers/`; everything here is backend-agnostic.

pub mod builder;
pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use builder::{ColumnBuilder, DatabaseModelBuilder, TableBuilder};
pub use catalog::DialectCatalog;
pub use identifier::IdentifierCase;
pub use schema::{
    ColumnModel, DatabaseModel, DbType, DdlPolicy, ForeignKeyTarget, IndexModel,
    PrimaryKeyModel, RelationModel, SequenceTable, TableModel,
};
pub use traits::{Catalog, Connection, Connector, Dialect, DialectOptions};
pub use value::{Value, ValueKind};
