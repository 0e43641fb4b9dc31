//! Sessions: units of work over one connection, with lazy relation reads.
//!
//! [`Database::open`] synchronizes the schema once and then hands out
//! [`Session`] handles. A session opens its connection on first use and
//! keeps one implicit transaction until [`Session::commit`] or
//! [`Session::rollback`]. A failed write rolls that transaction back; a
//! failed read leaves it open. Rows loaded through a session stay bound to it so
//! that foreign-key columns can be resolved later by [`LazyResolver`].

mod context;
mod resolver;
mod row;

pub use context::SessionContext;
pub use resolver::LazyResolver;
pub use row::{ForeignKey, Row, Slot};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Config, LoadingPolicy, ParamsConfig};
use crate::core::{Connection, Connector, DatabaseModel, Dialect, DialectCatalog, TableModel, Value};
use crate::error::{OrmError, Result};
use crate::sequence::{KeyAssignment, Sequencer};
use crate::sync::{SchemaSynchronizer, SyncReport};

struct DatabaseShared {
    model: Arc<DatabaseModel>,
    dialect: Arc<dyn Dialect>,
    connector: Arc<dyn Connector>,
    params: ParamsConfig,
    sequencer: Sequencer,
    report: SyncReport,
    single_writer: bool,
    session_ids: AtomicU64,
}

/// A synchronized logical database.
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
}

impl Database {
    /// Synchronize the schema and prepare key allocation.
    pub fn open(
        model: DatabaseModel,
        dialect: Arc<dyn Dialect>,
        connector: Arc<dyn Connector>,
        params: ParamsConfig,
    ) -> Result<Self> {
        let model = Arc::new(model);
        info!("Opening database '{}' with dialect {}", model.id, dialect.name());

        let mut conn = connector.connect()?;
        let report = SchemaSynchronizer::new(Arc::clone(&model), Arc::clone(&dialect), params.clone())
            .create(conn.as_mut())?;
        drop(conn);

        let sequencer = Sequencer::new(
            Arc::clone(&model),
            Arc::clone(&dialect),
            Arc::clone(&connector),
            &params,
        );
        let single_writer = connector.single_writer();
        Ok(Self {
            shared: Arc::new(DatabaseShared {
                model,
                dialect,
                connector,
                params,
                sequencer,
                report,
                single_writer,
                session_ids: AtomicU64::new(0),
            }),
        })
    }

    /// Open the database described by a configuration file.
    pub fn from_config(config: &Config, catalog: &DialectCatalog, connector: Arc<dyn Connector>) -> Result<Self> {
        let dialect = config.create_dialect(catalog)?;
        Self::open(config.to_model()?, dialect, connector, config.params.clone())
    }

    pub fn model(&self) -> &Arc<DatabaseModel> {
        &self.shared.model
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.shared.dialect
    }

    pub fn params(&self) -> &ParamsConfig {
        &self.shared.params
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.shared.sequencer
    }

    /// Outcome of the synchronization run at open.
    pub fn sync_report(&self) -> &SyncReport {
        &self.shared.report
    }

    /// A new session using the configured lazy-loading policy.
    pub fn session(&self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                id: self.shared.session_ids.fetch_add(1, Ordering::Relaxed),
                database: self.clone(),
                connection: Mutex::new(None),
                closed: AtomicBool::new(false),
                lazy_loading: Mutex::new(self.shared.params.lazy_loading),
            }),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.shared.model.id)
            .field("dialect", &self.shared.dialect.name())
            .field("connector", &self.shared.connector)
            .finish()
    }
}

struct SessionInner {
    id: u64,
    database: Database,
    connection: Mutex<Option<Box<dyn Connection>>>,
    closed: AtomicBool,
    lazy_loading: Mutex<LoadingPolicy>,
}

/// A unit of work; clones share the same connection and transaction.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Policy applied to lazy reads after this session is closed.
    pub fn lazy_loading(&self) -> LoadingPolicy {
        *self.inner.lazy_loading.lock()
    }

    pub fn set_lazy_loading(&self, policy: LoadingPolicy) {
        *self.inner.lazy_loading.lock() = policy;
    }

    /// Whether both handles refer to the same session.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` on the session connection, opening it on first use.
    fn with_connection<T>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<T>) -> Result<T> {
        if self.is_closed() {
            return Err(OrmError::SessionClosed);
        }
        let mut guard = self.inner.connection.lock();
        let conn = match guard.take() {
            Some(conn) => conn,
            None => self.database().shared.connector.connect()?,
        };
        let conn = guard.insert(conn);
        f(conn.as_mut())
    }

    /// Like [`with_connection`](Self::with_connection), rolling the
    /// transaction back when `f` fails.
    fn write<T>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<T>) -> Result<T> {
        self.with_connection(|conn| {
            let result = f(conn);
            if result.is_err() {
                if let Err(rollback) = conn.rollback() {
                    warn!("Rollback after a failed statement failed: {}", rollback);
                }
                self.database().sequencer().release(self.inner.id, false);
            }
            result
        })
    }

    /// Allocate a missing key. Single-writer backends reserve the range in
    /// this session's transaction, where the following insert also runs.
    fn assign_key(&self, row: &Row, conn: &mut dyn Connection) -> Result<KeyAssignment> {
        let sequencer = self.database().sequencer();
        if self.database().shared.single_writer {
            sequencer.assign_primary_key_within(row, conn, self.inner.id)
        } else {
            sequencer.assign_primary_key(row)
        }
    }

    fn table(&self, name: &str) -> Result<Arc<TableModel>> {
        self.database().model().require_table(name).map(Arc::clone)
    }

    fn check_writable(table: &TableModel) -> Result<()> {
        if table.read_only || table.view {
            return Err(OrmError::Model(format!("Table {} is read-only", table.name)));
        }
        Ok(())
    }

    fn to_rows(&self, table: &Arc<TableModel>, rows: Vec<Vec<Value>>) -> Result<Vec<Arc<Row>>> {
        rows.into_iter()
            .map(|values| Row::from_values(Arc::clone(table), values, Some(self.clone())).map(Arc::new))
            .collect()
    }

    /// Insert a row, allocating its primary key when it is NULL.
    pub fn save(&self, row: &Arc<Row>) -> Result<()> {
        let table = row.table();
        Self::check_writable(table)?;
        let mut sql = String::new();
        self.database().dialect().print_insert(table, &mut sql);
        self.write(|conn| {
            self.assign_key(row, conn)?;
            conn.execute(&sql, &row.values())
        })?;
        row.clear_changes();
        row.bind(self);
        Ok(())
    }

    /// Write the columns changed since the row was loaded or saved.
    pub fn update(&self, row: &Arc<Row>) -> Result<usize> {
        let table = row.table();
        Self::check_writable(table)?;
        let changed = row.changed_columns();
        if changed.is_empty() {
            return Ok(0);
        }
        let columns: Vec<_> = changed.iter().map(|p| &table.columns[*p]).collect();
        let mut sql = String::new();
        self.database().dialect().print_update(table, &columns, &mut sql)?;

        let mut params: Vec<Value> = changed.iter().map(|p| row.value_at(*p)).collect();
        params.extend(row.key_values());
        let count = self.write(|conn| conn.execute(&sql, &params))?;
        row.clear_changes();
        row.bind(self);
        Ok(count)
    }

    pub fn delete(&self, row: &Row) -> Result<usize> {
        let table = row.table();
        Self::check_writable(table)?;
        let mut sql = String::new();
        self.database().dialect().print_delete(table, &mut sql);
        let params = row.key_values();
        self.write(|conn| conn.execute(&sql, &params))
    }

    /// Load a row by its single-column primary key.
    pub fn load(&self, table: &str, key: impl Into<Value>) -> Result<Option<Arc<Row>>> {
        let table = self.table(table)?;
        let [position] = table.primary_key.columns.as_slice() else {
            return Err(OrmError::pk_shape(&table.name, "loading by key needs one key column"));
        };
        let column = &table.columns[*position];
        let key = key.into().coerce(column.kind)?;

        let mut sql = String::new();
        self.database().dialect().print_select(&table, &[column.name.as_str()], false, &mut sql);
        let rows = self.with_connection(|conn| conn.query(&sql, &[key]))?;
        Ok(self.to_rows(&table, rows)?.into_iter().next())
    }

    /// Rows whose `column` equals `value`, ordered by primary key.
    pub fn load_by_column(&self, table: &str, column: &str, value: impl Into<Value>) -> Result<Vec<Arc<Row>>> {
        let table = self.table(table)?;
        let declared = table.column(column).ok_or_else(|| {
            OrmError::Model(format!("Unknown column {}.{}", table.name, column))
        })?;
        let value = value.into().coerce(declared.kind)?;

        let mut sql = String::new();
        self.database().dialect().print_select(&table, &[declared.name.as_str()], true, &mut sql);
        let rows = self.with_connection(|conn| conn.query(&sql, &[value]))?;
        self.to_rows(&table, rows)
    }

    /// One page of a table ordered by primary key.
    pub fn select_page(&self, table: &str, offset: u64, limit: Option<u64>) -> Result<Vec<Arc<Row>>> {
        let table = self.table(table)?;
        let dialect = self.database().dialect();
        let mut base = String::new();
        dialect.print_select(&table, &[], true, &mut base);
        let mut sql = String::new();
        dialect.paginate(offset, limit, &base, &mut sql)?;
        let rows = self.with_connection(|conn| conn.query(&sql, &[]))?;
        self.to_rows(&table, rows)
    }

    /// Insert rows of one table with multi-row statements.
    ///
    /// Rows are sent in chunks of `insert_multirow_limit`; dialects without
    /// multi-row VALUES use an insert-by-select batch.
    pub fn insert_batch(&self, rows: &[Arc<Row>]) -> Result<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let table = Arc::clone(first.table());
        Self::check_writable(&table)?;
        if let Some(other) = rows.iter().find(|r| r.table().name != table.name) {
            return Err(OrmError::Model(format!(
                "Batch of {} contains a row of {}",
                table.name,
                other.table().name
            )));
        }
        let limit = self.database().params().insert_multirow_limit.max(1);
        let dialect = self.database().dialect();
        let count = self.write(|conn| {
            for row in rows {
                self.assign_key(row, conn)?;
            }
            let mut count = 0;
            for chunk in rows.chunks(limit) {
                let mut sql = String::new();
                dialect.print_multi_row_insert(&table, chunk.len(), &mut sql);
                let params: Vec<Value> = chunk.iter().flat_map(|r| r.values()).collect();
                count += conn.execute(&sql, &params)?;
            }
            Ok(count)
        })?;
        for row in rows {
            row.clear_changes();
            row.bind(self);
        }
        debug!("Inserted {} rows into {}", count, table.name);
        Ok(count)
    }

    /// Rows of a to-many relation of `row`, read through this session.
    pub fn read_relation(&self, row: &Row, relation: &str) -> Result<Vec<Arc<Row>>> {
        let table = row.table();
        let declared = table.relation(relation).ok_or_else(|| {
            OrmError::Model(format!("Unknown relation {}.{}", table.name, relation))
        })?;
        let key = row.key_values().into_iter().next().unwrap_or_default();
        if key.is_null() {
            return Ok(Vec::new());
        }
        self.load_by_column(&declared.target_table, &declared.target_column, key)
    }

    pub fn commit(&self) -> Result<()> {
        if self.is_closed() {
            return Err(OrmError::SessionClosed);
        }
        let mut guard = self.inner.connection.lock();
        let result = guard.as_mut().map_or(Ok(()), |conn| conn.commit());
        self.database().sequencer().release(self.inner.id, result.is_ok());
        result
    }

    /// Discard uncommitted work, including key ranges reserved by it.
    pub fn rollback(&self) -> Result<()> {
        if self.is_closed() {
            return Err(OrmError::SessionClosed);
        }
        let mut guard = self.inner.connection.lock();
        let result = guard.as_mut().map_or(Ok(()), |conn| conn.rollback());
        self.database().sequencer().release(self.inner.id, false);
        result
    }

    /// Roll back uncommitted work and release the connection.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut guard = self.inner.connection.lock();
        let result = guard.take().map_or(Ok(()), |mut conn| conn.rollback());
        self.database().sequencer().release(self.inner.id, false);
        drop(guard);
        debug!("Session of '{}' closed", self.database().model().id);
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database().model().id)
            .field("closed", &self.is_closed())
            .field("lazy_loading", &self.lazy_loading())
            .finish()
    }
}
