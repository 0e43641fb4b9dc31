//! Blocking SQLite connection over `rusqlite`.
//!
//! Auto-commit is emulated off: the first statement after a commit or
//! rollback opens a deferred transaction, and [`Connection::commit`] ends it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, OpenFlags};
use tracing::debug;

use crate::core::identifier::IdentifierCase;
use crate::core::traits::{Catalog, Connection, Connector};
use crate::core::Value;
use crate::error::{OrmError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => SqlValue::Null,
            Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
            Value::Byte(v) => SqlValue::Integer(i64::from(*v)),
            Value::Short(v) => SqlValue::Integer(i64::from(*v)),
            Value::Int(v) => SqlValue::Integer(i64::from(*v)),
            Value::Long(v) => SqlValue::Integer(*v),
            Value::BigInt(v) => match i64::try_from(v) {
                Ok(v) => SqlValue::Integer(v),
                Err(_) => SqlValue::Text(v.to_string()),
            },
            Value::Double(v) => SqlValue::Real(*v),
            Value::Text(v) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Value::Bytes(v) => return Ok(ToSqlOutput::Borrowed(ValueRef::Blob(v))),
            Value::Decimal(_) | Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => {
                SqlValue::Text(self.to_string())
            }
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Long(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

fn query_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> rusqlite::Result<Vec<Vec<Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_value_ref(row.get_ref(i)?));
        }
        result.push(values);
    }
    Ok(result)
}

/// A single SQLite connection with an implicit transaction.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    in_transaction: bool,
}

impl SqliteConnection {
    /// Wrap an opened `rusqlite` connection.
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(rusqlite::Connection::open_in_memory()?))
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn
                .execute_batch("BEGIN")
                .map_err(|e| OrmError::statement("BEGIN", e))?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn finish(&mut self, sql: &str) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn
                .execute_batch(sql)
                .map_err(|e| OrmError::statement(sql, e))?;
        }
        Ok(())
    }

    fn names(&self, sql: &str, table: &str) -> Result<Vec<String>> {
        let rows = query_rows(&self.conn, sql, &[Value::from(table)])
            .map_err(|e| OrmError::statement(sql, e))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Catalog for SqliteConnection {
    // Attached databases are not modelled; the schema is ignored.
    fn column_names(&mut self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        self.names("SELECT name FROM pragma_table_info(?)", table)
    }

    fn index_names(&mut self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        self.names("SELECT name FROM pragma_index_list(?)", table)
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Mixed
    }

    /// SQLite does not report keywords through SQL.
    fn sql_keywords(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.begin()?;
        debug!("SQL: {}", sql);
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| OrmError::statement(sql, e))
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        self.begin()?;
        debug!("SQL: {}", sql);
        query_rows(&self.conn, sql, params).map_err(|e| OrmError::statement(sql, e))
    }

    fn commit(&mut self) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

/// Opens connections to one SQLite database file or shared in-memory database.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    /// Connect to a database file, created on first use.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse a configured URL: a plain path, optionally prefixed with
    /// `jdbc:sqlite:` or `sqlite:`, or a `file:` URI.
    pub fn from_url(url: &str) -> Self {
        let path = url
            .strip_prefix("jdbc:sqlite:")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Self::new(path)
    }

    /// A named in-memory database shared by every connection of this connector.
    ///
    /// The database lives while at least one connection to it is open.
    pub fn shared_memory(name: &str) -> Self {
        Self::new(format!("file:{name}?mode=memory&cache=shared"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = rusqlite::Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // Readers must not block the sequencer's connection while it commits.
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("Opened SQLite connection to {} ({} journal)", self.path.display(), mode);
        Ok(Box::new(SqliteConnection::new(conn)))
    }

    fn single_writer(&self) -> bool {
        true
    }
}
