//! Primary-key allocation from a persistent counter table.
//!
//! Each table owns a row in the counter table. A refill advances the row by
//! its `cache` step in one UPDATE and reserves the range
//! `seq - cache + 1 ..= seq` for this process; values are then handed out
//! from memory until the range is used up.
//!
//! On a single-writer backend a session reserves ranges inside its own open
//! transaction. Such a range is drawn from by that session only, until the
//! session commits; a rollback drops it together with the counter update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ParamsConfig;
use crate::core::{Connection, Connector, DatabaseModel, Dialect, SequenceTable, TableModel, Value};
use crate::error::{OrmError, Result};
use crate::session::Row;

/// Outcome of [`Sequencer::assign_primary_key`].
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAssignment {
    /// A new key was allocated and stored on the row.
    Assigned(Value),
    /// The row already had a key; nothing was allocated.
    AlreadySet,
}

#[derive(Debug, Clone, Copy)]
struct KeyRange {
    next: i64,
    limit: i64,
    /// Session whose uncommitted transaction reserved the range.
    owner: Option<u64>,
}

/// Connection a refill runs on.
enum Reserve<'a> {
    /// The sequencer's own connection, committed right away.
    Dedicated,
    /// A session's open transaction, left uncommitted.
    Within { conn: &'a mut dyn Connection, owner: u64 },
}

impl Reserve<'_> {
    fn owner(&self) -> Option<u64> {
        match self {
            Reserve::Dedicated => None,
            Reserve::Within { owner, .. } => Some(*owner),
        }
    }
}

struct SequencerState {
    connection: Option<Box<dyn Connection>>,
    ranges: HashMap<String, KeyRange>,
}

/// Per-table key allocator with an in-memory cache.
pub struct Sequencer {
    model: Arc<DatabaseModel>,
    dialect: Arc<dyn Dialect>,
    connector: Arc<dyn Connector>,
    table: SequenceTable,
    cache: i64,
    schema_symbol: bool,
    state: Mutex<SequencerState>,
    refills: AtomicU64,
}

impl Sequencer {
    pub fn new(
        model: Arc<DatabaseModel>,
        dialect: Arc<dyn Dialect>,
        connector: Arc<dyn Connector>,
        params: &ParamsConfig,
    ) -> Self {
        let cache = if params.sequence_cache < 1 {
            warn!(
                "Sequence cache {} is below 1, using 1 instead",
                params.sequence_cache
            );
            1
        } else {
            params.sequence_cache
        };
        let table = params.sequence_table(model.default_schema.as_deref());
        Self {
            model,
            dialect,
            connector,
            table,
            cache,
            schema_symbol: params.sequence_schema_symbol,
            state: Mutex::new(SequencerState {
                connection: None,
                ranges: HashMap::new(),
            }),
            refills: AtomicU64::new(0),
        }
    }

    /// Keys reserved per refill.
    pub fn cache(&self) -> i64 {
        self.cache
    }

    /// Number of refills from the counter table so far.
    pub fn refill_count(&self) -> u64 {
        self.refills.load(Ordering::Relaxed)
    }

    /// Counter row id of a table: its full name, or `~.<table>` for tables
    /// of the default schema when the schema symbol is enabled.
    pub fn sequence_id(&self, table: &TableModel) -> String {
        match (&table.schema, &self.model.default_schema) {
            (Some(schema), Some(default)) if self.schema_symbol && schema == default => {
                format!("~.{}", table.name)
            }
            (None, _) if self.schema_symbol => format!("~.{}", table.name),
            _ => table.full_name(),
        }
    }

    /// Next key of a table.
    pub fn next_value(&self, table: &str) -> Result<i64> {
        let table = Arc::clone(self.model.require_table(table)?);
        self.next_value_for(&table, Reserve::Dedicated)
    }

    fn next_value_for(&self, table: &TableModel, reserve: Reserve<'_>) -> Result<i64> {
        let id = self.sequence_id(table);
        let owner = reserve.owner();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(range) = state.ranges.get_mut(&id) {
            if range.next <= range.limit && (range.owner.is_none() || range.owner == owner) {
                let value = range.next;
                range.next += 1;
                return Ok(value);
            }
        }

        let (next, limit) = match reserve {
            Reserve::Within { conn, .. } => self.refill(conn, &id)?,
            Reserve::Dedicated => {
                let conn = match state.connection.take() {
                    Some(conn) => conn,
                    None => self.connector.connect()?,
                };
                let conn = state.connection.insert(conn);
                match self.refill(conn.as_mut(), &id).and_then(|range| conn.commit().map(|_| range)) {
                    Ok(range) => range,
                    Err(e) => {
                        if let Err(rollback) = conn.rollback() {
                            warn!("Rollback of sequence {} failed: {}", id, rollback);
                        }
                        return Err(e);
                    }
                }
            }
        };
        self.refills.fetch_add(1, Ordering::Relaxed);

        state.ranges.insert(
            id,
            KeyRange {
                next: next + 1,
                limit,
                owner,
            },
        );
        Ok(next)
    }

    /// Advance the counter row and return the reserved `(next, limit)`,
    /// leaving the transaction open.
    fn refill(&self, conn: &mut dyn Connection, id: &str) -> Result<(i64, i64)> {
        let key = [Value::from(id)];
        let mut sql = String::new();
        self.dialect.print_sequence_next_value(&self.table, &mut sql);
        if conn.execute(&sql, &key)? == 0 {
            sql.clear();
            self.dialect.print_sequence_init(&self.table, self.cache, &mut sql);
            conn.execute(&sql, &key)?;
        }

        let (seq_limit, step, max_value) = self
            .read_counter(conn, id)?
            .ok_or_else(|| OrmError::Model(format!("Sequence row '{}' was not created", id)))?;
        let next = seq_limit - step + 1;
        let mut limit = seq_limit;

        if max_value != 0 && seq_limit > max_value {
            if next > max_value {
                return Err(OrmError::SequenceExhausted {
                    id: id.to_string(),
                    next,
                    max: max_value,
                });
            }
            limit = max_value;
            sql.clear();
            self.dialect.print_sequence_set_max(&self.table, &mut sql);
            conn.execute(&sql, &key)?;
        }

        info!(
            "Sequence {}: reserved {}..={} (step {}, max {})",
            id, next, limit, step, max_value
        );
        Ok((next, limit))
    }

    /// `(seq, cache, max_value)` of a counter row.
    fn read_counter(&self, conn: &mut dyn Connection, id: &str) -> Result<Option<(i64, i64, i64)>> {
        let mut sql = String::new();
        self.dialect.print_sequence_current_value(&self.table, &mut sql);
        let rows = conn.query(&sql, &[Value::from(id)])?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let number = |index: usize| -> Result<i64> {
            row.get(index).and_then(Value::as_i64).ok_or_else(|| {
                OrmError::Conversion(format!("Sequence row '{}' holds a non-numeric value", id))
            })
        };
        Ok(Some((number(0)?, number(1)?, number(2)?)))
    }

    /// Highest value reserved in the counter table for a table, `None`
    /// before the first allocation.
    pub fn current_value(&self, table: &str) -> Result<Option<i64>> {
        let table = Arc::clone(self.model.require_table(table)?);
        let id = self.sequence_id(&table);
        self.with_connection(|conn| Ok(self.read_counter(conn, &id)?.map(|(seq, _, _)| seq)))
    }

    /// Limit the keys of a table to `max_value`; zero removes the limit.
    ///
    /// A cached range is clipped to the new limit. When the counter row does
    /// not exist yet it is created, and its first range is cached here.
    pub fn set_max_value(&self, table: &str, max_value: i64) -> Result<()> {
        let table = Arc::clone(self.model.require_table(table)?);
        let id = self.sequence_id(&table);
        let created = self.with_connection(|conn| {
            let mut sql = String::from("UPDATE ");
            self.dialect.print_sequence_table_name(&self.table, &mut sql);
            sql.push_str(" SET max_value=? WHERE id=?");
            let params = [Value::Long(max_value), Value::from(id.as_str())];
            if conn.execute(&sql, &params)? > 0 {
                return Ok(false);
            }
            let mut init = String::new();
            self.dialect.print_sequence_init(&self.table, self.cache, &mut init);
            conn.execute(&init, &[Value::from(id.as_str())])?;
            conn.execute(&sql, &params)?;
            Ok(true)
        })?;

        let clip = |limit: i64| if max_value > 0 { limit.min(max_value) } else { limit };
        let mut state = self.state.lock();
        if created {
            state.ranges.insert(
                id.clone(),
                KeyRange {
                    next: 1,
                    limit: clip(self.cache),
                    owner: None,
                },
            );
        } else if let Some(range) = state.ranges.get_mut(&id) {
            range.limit = clip(range.limit);
        }
        debug!("Sequence {}: max value set to {}", id, max_value);
        Ok(())
    }

    /// Settle the ranges a session reserved in its transaction: shared with
    /// every caller once committed, dropped after a rollback.
    pub(crate) fn release(&self, owner: u64, committed: bool) {
        let mut state = self.state.lock();
        if committed {
            state
                .ranges
                .values_mut()
                .filter(|range| range.owner == Some(owner))
                .for_each(|range| range.owner = None);
            return;
        }
        let before = state.ranges.len();
        state.ranges.retain(|_, range| range.owner != Some(owner));
        let dropped = before - state.ranges.len();
        if dropped > 0 {
            debug!("Dropped {} key ranges of a rolled back transaction", dropped);
        }
    }

    /// Forget every cached range; the next allocation refills from the database.
    pub fn reset(&self) {
        self.state.lock().ranges.clear();
        info!("Sequencer of '{}' reset", self.model.id);
    }

    /// Run `f` on the dedicated connection and commit, rolling back on failure.
    fn with_connection<T>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let conn = match state.connection.take() {
            Some(conn) => conn,
            None => self.connector.connect()?,
        };
        let conn = state.connection.insert(conn);
        let result = f(conn.as_mut()).and_then(|value| conn.commit().map(|_| value));
        if result.is_err() {
            if let Err(rollback) = conn.rollback() {
                warn!("Rollback on the sequence connection failed: {}", rollback);
            }
        }
        result
    }

    /// Allocate a key for a row whose primary key is NULL.
    ///
    /// A string key column receives the decimal form of the value.
    pub fn assign_primary_key(&self, row: &Row) -> Result<KeyAssignment> {
        self.assign(row, Reserve::Dedicated)
    }

    /// Like [`assign_primary_key`](Self::assign_primary_key), refilling on
    /// `conn` without committing. The range belongs to `owner` until
    /// [`release`](Self::release).
    pub(crate) fn assign_primary_key_within(
        &self,
        row: &Row,
        conn: &mut dyn Connection,
        owner: u64,
    ) -> Result<KeyAssignment> {
        self.assign(row, Reserve::Within { conn, owner })
    }

    fn assign(&self, row: &Row, reserve: Reserve<'_>) -> Result<KeyAssignment> {
        let table = row.table();
        let keys = row.key_values();
        if !keys.is_empty() && keys.iter().all(|v| !v.is_null()) {
            return Ok(KeyAssignment::AlreadySet);
        }
        let position = table.primary_key.auto_assign_column(table)?;
        let column = &table.columns[position];

        let value = Value::Long(self.next_value_for(table, reserve)?).coerce(column.kind).map_err(|e| {
            OrmError::pk_shape(&table.name, format!("key {} does not fit: {}", column.name, e))
        })?;
        row.set_at(position, value.clone());
        Ok(KeyAssignment::Assigned(value))
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("table", &self.table)
            .field("cache", &self.cache)
            .field("refills", &self.refill_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};
    use crate::drivers::{SqliteConnector, SqliteDialect};
    use tempfile::TempDir;

    fn model() -> Arc<DatabaseModel> {
        Arc::new(
            DatabaseModelBuilder::new("seq")
                .table(
                    TableBuilder::new("item")
                        .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
                        .column(ColumnBuilder::new("label", ValueKind::Text)),
                )
                .table(TableBuilder::new("tag").column(ColumnBuilder::new("code", ValueKind::Text).primary_key()))
                .table(
                    TableBuilder::new("pair")
                        .column(ColumnBuilder::new("a", ValueKind::Int).primary_key())
                        .column(ColumnBuilder::new("b", ValueKind::Int).primary_key()),
                )
                .table(TableBuilder::new("stamp").column(ColumnBuilder::new("at", ValueKind::Timestamp).primary_key()))
                .build()
                .unwrap(),
        )
    }

    fn sequencer(dir: &TempDir, cache: i64) -> Sequencer {
        let connector = Arc::new(SqliteConnector::new(dir.path().join("seq.db")));
        let dialect: Arc<dyn Dialect> = Arc::new(SqliteDialect::default());
        let params = ParamsConfig {
            sequence_cache: cache,
            ..ParamsConfig::default()
        };

        let mut conn = connector.connect().unwrap();
        let mut sql = String::new();
        dialect
            .print_sequence_table(&params.sequence_table(None), cache.max(1), &mut sql)
            .unwrap();
        conn.execute(&sql, &[]).unwrap();
        conn.commit().unwrap();

        Sequencer::new(model(), dialect, connector, &params)
    }

    #[test]
    fn test_values_are_gap_free_across_refills() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 3);
        let values: Vec<i64> = (0..7).map(|_| seq.next_value("item").unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(seq.refill_count(), 3);
        assert_eq!(seq.current_value("item").unwrap(), Some(9));
    }

    #[test]
    fn test_tables_have_independent_counters() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 10);
        assert_eq!(seq.next_value("item").unwrap(), 1);
        assert_eq!(seq.next_value("tag").unwrap(), 1);
        assert_eq!(seq.next_value("item").unwrap(), 2);
        assert_eq!(seq.current_value("pair").unwrap(), None);
    }

    #[test]
    fn test_reset_skips_the_cached_range() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 5);
        assert_eq!(seq.next_value("item").unwrap(), 1);
        seq.reset();
        assert_eq!(seq.next_value("item").unwrap(), 6);
    }

    #[test]
    fn test_max_value_clips_and_exhausts() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 5);
        seq.set_max_value("item", 7).unwrap();
        let values: Vec<i64> = (0..7).map(|_| seq.next_value("item").unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7]);
        match seq.next_value("item").unwrap_err() {
            OrmError::SequenceExhausted { id, next, max } => {
                assert_eq!(id, "item");
                assert_eq!(next, 8);
                assert_eq!(max, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_max_value_clips_cached_range() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 5);
        assert_eq!(seq.next_value("item").unwrap(), 1);
        seq.set_max_value("item", 3).unwrap();
        assert_eq!(seq.next_value("item").unwrap(), 2);
        assert_eq!(seq.next_value("item").unwrap(), 3);
        assert!(matches!(
            seq.next_value("item"),
            Err(OrmError::SequenceExhausted { .. })
        ));
    }

    #[test]
    fn test_cache_below_one_is_clamped() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 0);
        assert_eq!(seq.cache(), 1);
        assert_eq!(seq.next_value("item").unwrap(), 1);
        assert_eq!(seq.next_value("item").unwrap(), 2);
        assert_eq!(seq.refill_count(), 2);
    }

    #[test]
    fn test_assign_primary_key() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 10);
        let model = model();

        let item = Row::new(Arc::clone(model.require_table("item").unwrap()));
        assert_eq!(seq.assign_primary_key(&item).unwrap(), KeyAssignment::Assigned(Value::Long(1)));
        assert_eq!(seq.assign_primary_key(&item).unwrap(), KeyAssignment::AlreadySet);
        assert_eq!(seq.refill_count(), 1);

        let tag = Row::new(Arc::clone(model.require_table("tag").unwrap()));
        seq.assign_primary_key(&tag).unwrap();
        assert_eq!(tag.get("code").unwrap(), Value::Text("1".to_string()));
    }

    #[test]
    fn test_preset_key_allocates_nothing() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 10);
        let item = Row::new(Arc::clone(model().require_table("item").unwrap()));
        item.set("id", 99i64).unwrap();
        assert_eq!(seq.assign_primary_key(&item).unwrap(), KeyAssignment::AlreadySet);
        assert_eq!(seq.refill_count(), 0);
    }

    #[test]
    fn test_unsupported_key_shapes() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 10);
        let model = model();
        for name in ["pair", "stamp"] {
            let row = Row::new(Arc::clone(model.require_table(name).unwrap()));
            let err = seq.assign_primary_key(&row).unwrap_err();
            assert!(matches!(err, OrmError::PrimaryKeyShape { .. }), "{}", name);
        }
        assert_eq!(seq.refill_count(), 0);
    }

    #[test]
    fn test_transaction_ranges_stay_private_until_commit() {
        let dir = TempDir::new().unwrap();
        let seq = sequencer(&dir, 5);
        let model = model();
        let item = || Row::new(Arc::clone(model.require_table("item").unwrap()));
        let mut conn = SqliteConnector::new(dir.path().join("seq.db")).connect().unwrap();

        let assigned = |row: &Row, conn: &mut dyn Connection, owner: u64| {
            match seq.assign_primary_key_within(row, conn, owner).unwrap() {
                KeyAssignment::Assigned(value) => value,
                KeyAssignment::AlreadySet => panic!("key was already set"),
            }
        };
        assert_eq!(assigned(&item(), conn.as_mut(), 7), Value::Long(1));
        assert_eq!(assigned(&item(), conn.as_mut(), 7), Value::Long(2));
        // Another transaction cannot draw from the range of owner 7.
        assert_eq!(assigned(&item(), conn.as_mut(), 8), Value::Long(6));

        conn.rollback().unwrap();
        seq.release(7, false);
        seq.release(8, false);
        assert_eq!(assigned(&item(), conn.as_mut(), 9), Value::Long(1));
        conn.commit().unwrap();
        seq.release(9, true);

        assert_eq!(seq.next_value("item").unwrap(), 2);
        assert_eq!(seq.refill_count(), 3);
        assert_eq!(seq.current_value("item").unwrap(), Some(5));
    }

    #[test]
    fn test_schema_symbol() {
        let dir = TempDir::new().unwrap();
        let params = ParamsConfig {
            sequence_schema_symbol: true,
            ..ParamsConfig::default()
        };
        let seq = Sequencer::new(
            model(),
            Arc::new(SqliteDialect::default()),
            Arc::new(SqliteConnector::new(dir.path().join("unused.db"))),
            &params,
        );
        let item = model().require_table("item").unwrap().clone();
        assert_eq!(seq.sequence_id(&item), "~.item");
    }

    #[test]
    fn test_concurrent_callers_get_disjoint_values() {
        let dir = TempDir::new().unwrap();
        let seq = Arc::new(sequencer(&dir, 4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || {
                    (0..10).map(|_| seq.next_value("item").unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (1..=40).collect::<Vec<_>>());
    }
}
