//! Declared model: tables, columns, keys, indexes and relations.
//!
//! The model is produced once by the builders in [`super::builder`] and is
//! immutable afterwards; tables are shared as `Arc<TableModel>` between the
//! synchronizer, the sequencer and every row loaded through a session.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::identifier::normalize;
use super::value::{Value, ValueKind};
use crate::error::{OrmError, Result};

/// Database column type, resolved to a backend keyword by each dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Varchar,
    #[serde(alias = "varchar_ignorecase")]
    VarcharIgnoreCase,
    Char,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Double,
    Boolean,
    Date,
    Time,
    Timestamp,
    Blob,
    Clob,
    /// Marker for "no database column"; no dialect can express it.
    Null,
}

impl DbType {
    /// Every concrete type a dialect must be able to express.
    pub const BASELINE: [DbType; 14] = [
        DbType::Varchar,
        DbType::VarcharIgnoreCase,
        DbType::Char,
        DbType::SmallInt,
        DbType::Int,
        DbType::BigInt,
        DbType::Decimal,
        DbType::Double,
        DbType::Boolean,
        DbType::Date,
        DbType::Time,
        DbType::Timestamp,
        DbType::Blob,
        DbType::Clob,
    ];

    /// ANSI keyword used by dialects that do not remap the type.
    pub fn sql_name(self) -> &'static str {
        match self {
            DbType::Varchar => "VARCHAR",
            DbType::VarcharIgnoreCase => "VARCHAR_IGNORECASE",
            DbType::Char => "CHAR",
            DbType::SmallInt => "SMALLINT",
            DbType::Int => "INT",
            DbType::BigInt => "BIGINT",
            DbType::Decimal => "DECIMAL",
            DbType::Double => "DOUBLE",
            DbType::Boolean => "BOOLEAN",
            DbType::Date => "DATE",
            DbType::Time => "TIME",
            DbType::Timestamp => "TIMESTAMP",
            DbType::Blob => "BLOB",
            DbType::Clob => "CLOB",
            DbType::Null => "NULL",
        }
    }

    /// Whether a `(length[,precision])` suffix is written after the type.
    pub fn is_length_allowed(self) -> bool {
        matches!(
            self,
            DbType::Varchar | DbType::VarcharIgnoreCase | DbType::Char | DbType::Decimal
        )
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl ValueKind {
    /// Column type used when the declaration does not name one.
    pub fn default_db_type(self) -> DbType {
        match self {
            ValueKind::Long => DbType::BigInt,
            ValueKind::Int => DbType::Int,
            ValueKind::Short | ValueKind::Byte => DbType::SmallInt,
            ValueKind::BigInt | ValueKind::Decimal => DbType::Decimal,
            ValueKind::Double => DbType::Double,
            ValueKind::Bool => DbType::Boolean,
            ValueKind::Text => DbType::Varchar,
            ValueKind::Char => DbType::Char,
            ValueKind::Date => DbType::Date,
            ValueKind::Time => DbType::Time,
            ValueKind::Timestamp => DbType::Timestamp,
            ValueKind::Bytes => DbType::Blob,
        }
    }
}

/// Policy governing how schema differences are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DdlPolicy {
    /// Use the database-level policy.
    #[default]
    Inherited,
    /// Create missing objects only in a database that has never been initialized.
    CreateOnly,
    /// Create missing tables, columns, indexes and foreign keys.
    CreateOrUpdate,
    /// Fail on the first required change.
    ValidateOnly,
    /// Log every required change without executing it.
    Warning,
    /// Skip synchronization.
    DoNothing,
}

impl DdlPolicy {
    /// Resolve `Inherited` against the enclosing policy.
    pub fn resolve(self, parent: DdlPolicy) -> DdlPolicy {
        match self {
            DdlPolicy::Inherited => match parent {
                DdlPolicy::Inherited => DdlPolicy::CreateOrUpdate,
                other => other,
            },
            other => other,
        }
    }
}

/// Foreign key from a column to the primary key of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    /// Referenced table name.
    pub table: String,
    /// Referenced schema, when the target declares one.
    pub schema: Option<String>,
    /// Referenced primary-key column names (resolved by the model builder).
    pub columns: Vec<String>,
}

/// A declared column.
#[derive(Debug, Clone)]
pub struct ColumnModel {
    pub name: String,
    pub kind: ValueKind,
    pub db_type: DbType,
    /// NOT NULL constraint.
    pub mandatory: bool,
    pub primary_key: bool,
    pub max_length: Option<u32>,
    pub precision: Option<u32>,
    pub default_value: Option<Value>,
    pub foreign_key: Option<ForeignKeyTarget>,
    /// Non-unique index group, optionally suffixed `#NN` for column order.
    pub index: Option<String>,
    /// Unique index group, optionally suffixed `#NN` for column order.
    pub unique_index: Option<String>,
    pub comment: Option<String>,
}

impl ColumnModel {
    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }
}

/// Ordered primary-key columns, as positions in the owning table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryKeyModel {
    pub columns: Vec<usize>,
}

impl PrimaryKeyModel {
    /// Position of the single column a sequencer may assign.
    ///
    /// Fails unless the key has exactly one column of a sequence-compatible kind.
    pub fn auto_assign_column(&self, table: &TableModel) -> Result<usize> {
        let [position] = self.columns.as_slice() else {
            return Err(OrmError::pk_shape(
                &table.name,
                format!("expected one key column, found {}", self.columns.len()),
            ));
        };
        let column = &table.columns[*position];
        if !column.kind.is_sequence_compatible() {
            return Err(OrmError::pk_shape(
                &table.name,
                format!("key column {} has kind {:?}", column.name, column.kind),
            ));
        }
        Ok(*position)
    }
}

/// An index built from columns sharing an index name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A to-many relation: rows of `target_table` whose `target_column`
/// references this table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationModel {
    pub name: String,
    pub target_table: String,
    pub target_column: String,
}

/// A declared table or view.
#[derive(Debug, Clone)]
pub struct TableModel {
    pub name: String,
    pub schema: Option<String>,
    pub alias: String,
    pub read_only: bool,
    pub view: bool,
    /// Native SELECT text backing a view.
    pub select_sql: Option<String>,
    pub columns: Vec<ColumnModel>,
    pub indexes: Vec<IndexModel>,
    pub primary_key: PrimaryKeyModel,
    pub ddl_policy: DdlPolicy,
    pub comment: Option<String>,
    pub relations: Vec<RelationModel>,
}

impl TableModel {
    /// Whether the table takes part in DDL (views never do).
    pub fn is_table(&self) -> bool {
        !self.view
    }

    /// Look up a column, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.column_position(name).map(|i| &self.columns[i])
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        let key = normalize(name);
        self.columns.iter().position(|c| normalize(&c.name) == key)
    }

    pub fn pk_columns(&self) -> impl Iterator<Item = &ColumnModel> {
        self.primary_key.columns.iter().map(|i| &self.columns[*i])
    }

    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        let key = normalize(name);
        self.relations.iter().find(|r| normalize(&r.name) == key)
    }

    /// Schema-qualified name without quoting, e.g. `sales.orders`.
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// The declared model of one logical database.
#[derive(Debug, Clone)]
pub struct DatabaseModel {
    pub id: String,
    /// Schema applied to tables that do not declare their own.
    pub default_schema: Option<String>,
    pub ddl_policy: DdlPolicy,
    pub tables: Vec<Arc<TableModel>>,
}

impl DatabaseModel {
    /// Look up a table, ignoring case.
    pub fn table(&self, name: &str) -> Option<&Arc<TableModel>> {
        let key = normalize(name);
        self.tables.iter().find(|t| normalize(&t.name) == key)
    }

    /// Like [`table`](Self::table) but failing with a model error.
    pub fn require_table(&self, name: &str) -> Result<&Arc<TableModel>> {
        self.table(name)
            .ok_or_else(|| OrmError::Model(format!("Unknown table '{}'", name)))
    }

    /// Effective DDL policy of a table.
    pub fn policy_for(&self, table: &TableModel) -> DdlPolicy {
        table.ddl_policy.resolve(self.ddl_policy)
    }

    /// Tables that take part in DDL.
    pub fn ddl_tables(&self) -> impl Iterator<Item = &Arc<TableModel>> {
        self.tables.iter().filter(|t| t.is_table())
    }
}

/// Location of the persistent sequence counter table.
///
/// The table has the fixed columns `id`, `seq`, `cache` and `max_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTable {
    pub schema: Option<String>,
    pub name: String,
}

impl SequenceTable {
    pub const DEFAULT_NAME: &'static str = "ormsync_pk_support";
}

impl Default for SequenceTable {
    fn default() -> Self {
        Self {
            schema: None,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}
