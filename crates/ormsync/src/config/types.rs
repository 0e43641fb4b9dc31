//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::core::{DbType, DdlPolicy, SequenceTable, ValueKind};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logical database and its connection.
    pub database: DatabaseConfig,

    /// Engine parameters.
    #[serde(default)]
    pub params: ParamsConfig,

    /// Declared tables.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// Logical database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database identifier (default: "main").
    #[serde(default = "default_database_id")]
    pub id: String,

    /// Dialect name, e.g. "h2", "postgresql", "sqlite".
    pub dialect: String,

    /// Connection string; for SQLite a file path or `file:` URI.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Default schema of tables that declare none.
    #[serde(default)]
    pub schema: Option<String>,

    /// Lookup path of an externally managed data source, outermost first.
    #[serde(default)]
    pub jndi: Vec<String>,
}

/// How table and column comments are written during synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentPolicy {
    Never,
    /// Comment every table on each synchronization.
    Always,
    /// Comment every table whenever any DDL statement was executed.
    #[default]
    OnAnyChange,
    /// Comment only the tables created by this synchronization.
    ForNewObject,
}

/// Severity of a declared name colliding with an SQL keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCheck {
    Off,
    Warn,
    #[default]
    Error,
}

/// What a relation read does after the owning session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadingPolicy {
    /// Fail with `LazyLoadingDisabled`.
    #[default]
    Disabled,
    /// Load through a throwaway session and return a detached result.
    AllowedAnywhere,
    /// As `AllowedAnywhere`, logging a warning.
    AllowedAnywhereWithWarning,
    /// As `AllowedAnywhere`, logging the captured call-site backtrace.
    AllowedAnywhereWithStacktrace,
}

/// Engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    /// Database-level DDL policy (default: create-or-update).
    #[serde(default = "default_ddl_policy")]
    pub ddl_policy: DdlPolicy,

    #[serde(default)]
    pub comment_policy: CommentPolicy,

    #[serde(default)]
    pub check_keywords: KeywordCheck,

    /// Keys reserved per sequence refill (default: 100).
    #[serde(default = "default_sequence_cache")]
    pub sequence_cache: i64,

    /// Name of the sequence counter table (default: "ormsync_pk_support").
    #[serde(default = "default_sequence_table")]
    pub sequence_table: String,

    /// Identify default-schema tables as `~.<table>` in the counter table.
    #[serde(default)]
    pub sequence_schema_symbol: bool,

    #[serde(default)]
    pub lazy_loading: LoadingPolicy,

    /// Quote every identifier in generated SQL.
    #[serde(default)]
    pub quote_identifiers: bool,

    /// MySQL storage engine (default: "InnoDB").
    #[serde(default = "default_mysql_engine")]
    pub mysql_engine: String,

    /// Rows per multi-row INSERT statement (default: 100).
    #[serde(default = "default_insert_multirow_limit")]
    pub insert_multirow_limit: usize,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            ddl_policy: default_ddl_policy(),
            comment_policy: CommentPolicy::default(),
            check_keywords: KeywordCheck::default(),
            sequence_cache: default_sequence_cache(),
            sequence_table: default_sequence_table(),
            sequence_schema_symbol: false,
            lazy_loading: LoadingPolicy::default(),
            quote_identifiers: false,
            mysql_engine: default_mysql_engine(),
            insert_multirow_limit: default_insert_multirow_limit(),
        }
    }
}

impl ParamsConfig {
    /// Location of the sequence counter table for a database with the given default schema.
    pub fn sequence_table(&self, default_schema: Option<&str>) -> SequenceTable {
        SequenceTable {
            schema: default_schema.map(str::to_string),
            name: self.sequence_table.clone(),
        }
    }
}

/// Declared table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub read_only: bool,

    /// Backed by a view (never created by DDL).
    #[serde(default)]
    pub view: bool,

    /// Native SELECT text of a view.
    #[serde(default)]
    pub select_sql: Option<String>,

    #[serde(default)]
    pub ddl_policy: DdlPolicy,

    #[serde(default)]
    pub comment: Option<String>,

    pub columns: Vec<ColumnConfig>,

    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

/// Declared column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,

    pub kind: ValueKind,

    /// Overrides the type derived from `kind`.
    #[serde(default)]
    pub db_type: Option<DbType>,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub length: Option<u32>,

    #[serde(default)]
    pub precision: Option<u32>,

    /// Column DEFAULT, converted to `kind`.
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,

    /// Referenced table; the column points at its primary key.
    #[serde(default)]
    pub references: Option<String>,

    #[serde(default)]
    pub index: Option<String>,

    #[serde(default)]
    pub unique_index: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,
}

/// Declared to-many relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    /// Table holding the referencing rows.
    pub table: String,
    /// Foreign-key column of `table` pointing back at the owner.
    pub column: String,
}

fn default_database_id() -> String {
    "main".to_string()
}

fn default_ddl_policy() -> DdlPolicy {
    DdlPolicy::CreateOrUpdate
}

fn default_sequence_cache() -> i64 {
    100
}

fn default_sequence_table() -> String {
    SequenceTable::DEFAULT_NAME.to_string()
}

fn default_mysql_engine() -> String {
    "InnoDB".to_string()
}

fn default_insert_multirow_limit() -> usize {
    100
}
