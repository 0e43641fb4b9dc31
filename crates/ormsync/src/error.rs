//! Error types for the persistence engine.

use thiserror::Error;

/// Boxed driver-level cause carried by [`OrmError::Statement`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for synchronization, sequencing and session operations.
#[derive(Error, Debug)]
pub enum OrmError {
    /// Configuration error (invalid YAML, missing fields, unknown dialect, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Declared model is inconsistent (duplicate names, dangling foreign keys)
    #[error("Model error: {0}")]
    Model(String),

    /// The dialect cannot express a declared column type
    #[error("Unsupported type {db_type} for column {column} in dialect {dialect}")]
    UnsupportedType {
        dialect: String,
        column: String,
        db_type: String,
    },

    /// Validate-only policy found a required schema change
    #[error("Database schema validation failed, required a database change: {0}")]
    SchemaValidation(String),

    /// A SQL statement failed; the enclosing transaction was rolled back
    #[error("Statement failed: {sql}")]
    Statement {
        sql: String,
        #[source]
        source: BoxError,
    },

    /// Primary key shape cannot be assigned automatically
    #[error("Table {table} cannot use automatic key assignment: {reason}")]
    PrimaryKeyShape { table: String, reason: String },

    /// Lazy read on a closed session while lazy loading is disabled
    #[error("Lazy loading of {table}.{column} is disabled: the session is closed")]
    LazyLoadingDisabled { table: String, column: String },

    /// Declared identifier collides with a reserved word of the backend
    #[error("The database {kind} name '{name}' is a reserved keyword")]
    ReservedWord { kind: String, name: String },

    /// Sequence reached its configured maximum
    #[error("Sequence {id} exhausted: the next value {next} exceeds the limit {max}")]
    SequenceExhausted { id: String, next: i64, max: i64 },

    /// A value cannot be converted to the declared column kind
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Operation on a closed session
    #[error("Session is closed")]
    SessionClosed,

    /// Embedded SQLite driver error
    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OrmError {
    /// Wrap a failure of `sql`, keeping the statement text for diagnostics.
    pub fn statement(sql: impl Into<String>, source: impl Into<BoxError>) -> Self {
        OrmError::Statement {
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// Create a PrimaryKeyShape error
    pub fn pk_shape(table: impl Into<String>, reason: impl Into<String>) -> Self {
        OrmError::PrimaryKeyShape {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedType error
    pub fn unsupported(
        dialect: impl Into<String>,
        column: impl Into<String>,
        db_type: impl std::fmt::Display,
    ) -> Self {
        OrmError::UnsupportedType {
            dialect: dialect.into(),
            column: column.into(),
            db_type: db_type.to_string(),
        }
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            OrmError::Config(_) | OrmError::Model(_) | OrmError::Yaml(_) => 1,
            OrmError::SchemaValidation(_) => 2,
            OrmError::Statement { .. } | OrmError::Driver(_) => 3,
            OrmError::ReservedWord { .. } => 4,
            OrmError::Io(_) => 7,
            _ => 10,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, OrmError>;
