//! Rows: one slot per column plus change tracking.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Session;
use crate::core::{TableModel, Value};
use crate::error::{OrmError, Result};

/// Raw key of a related row that has not been loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,
    /// Referenced primary-key values.
    pub values: Vec<Value>,
}

impl ForeignKey {
    /// Single-column key value.
    pub fn value(&self) -> &Value {
        self.values.first().unwrap_or(&Value::Null)
    }
}

/// Content of one column of a row.
#[derive(Debug, Clone)]
pub enum Slot {
    Value(Value),
    /// Foreign key not yet resolved.
    Placeholder(ForeignKey),
    /// Resolved related row.
    Entity(Arc<Row>),
}

struct RowState {
    slots: Vec<Slot>,
    changed: BTreeSet<usize>,
    session: Option<Session>,
}

/// A row of a declared table.
///
/// Slots and the change set are guarded by one lock, so a row may be read
/// and modified from several threads.
pub struct Row {
    table: Arc<TableModel>,
    state: Mutex<RowState>,
}

impl Row {
    /// An unsaved row with every column NULL.
    pub fn new(table: Arc<TableModel>) -> Self {
        let slots = vec![Slot::Value(Value::Null); table.columns.len()];
        Self {
            table,
            state: Mutex::new(RowState {
                slots,
                changed: BTreeSet::new(),
                session: None,
            }),
        }
    }

    /// Build a loaded row from column values in declaration order.
    ///
    /// Foreign-key columns become placeholders; extra values are ignored.
    pub(crate) fn from_values(table: Arc<TableModel>, values: Vec<Value>, session: Option<Session>) -> Result<Self> {
        let mut slots = Vec::with_capacity(table.columns.len());
        for (column, value) in table.columns.iter().zip(values) {
            let value = value.coerce(column.kind)?;
            slots.push(placeholder_or_value(column.foreign_key.as_ref().map(|t| t.table.as_str()), value));
        }
        if slots.len() != table.columns.len() {
            return Err(OrmError::Model(format!(
                "Table {} expects {} columns, the result has {}",
                table.name,
                table.columns.len(),
                slots.len()
            )));
        }
        Ok(Self {
            table,
            state: Mutex::new(RowState {
                slots,
                changed: BTreeSet::new(),
                session,
            }),
        })
    }

    pub fn table(&self) -> &Arc<TableModel> {
        &self.table
    }

    fn position(&self, column: &str) -> Result<usize> {
        self.table.column_position(column).ok_or_else(|| {
            OrmError::Model(format!("Unknown column {}.{}", self.table.name, column))
        })
    }

    /// Column value; a foreign-key column yields the raw key.
    pub fn get(&self, column: &str) -> Result<Value> {
        let position = self.position(column)?;
        Ok(self.value_at(position))
    }

    pub(crate) fn value_at(&self, position: usize) -> Value {
        match self.slot(position) {
            Slot::Value(value) => value,
            Slot::Placeholder(key) => key.value().clone(),
            Slot::Entity(row) => row.key_values().into_iter().next().unwrap_or_default(),
        }
    }

    /// Set a column, converting the value to the declared kind.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> Result<()> {
        let position = self.position(column)?;
        let declared = &self.table.columns[position];
        let value = value.into().coerce(declared.kind).map_err(|e| {
            OrmError::Conversion(format!("{}.{}: {}", self.table.name, declared.name, e))
        })?;
        self.set_at(position, value);
        Ok(())
    }

    pub(crate) fn set_at(&self, position: usize, value: Value) {
        let target = self.table.columns[position].foreign_key.as_ref().map(|t| t.table.as_str());
        let mut state = self.state.lock();
        state.slots[position] = placeholder_or_value(target, value);
        state.changed.insert(position);
    }

    /// Point a foreign-key column at a related row.
    pub fn set_entity(&self, column: &str, entity: Arc<Row>) -> Result<()> {
        let position = self.position(column)?;
        let declared = &self.table.columns[position];
        match &declared.foreign_key {
            Some(target) if target.table == entity.table.name => {}
            _ => {
                return Err(OrmError::Model(format!(
                    "Column {}.{} does not reference table {}",
                    self.table.name, declared.name, entity.table.name
                )))
            }
        }
        let mut state = self.state.lock();
        state.slots[position] = Slot::Entity(entity);
        state.changed.insert(position);
        Ok(())
    }

    /// Raw foreign key of a column without loading the related row.
    pub fn foreign_key(&self, column: &str) -> Result<Option<ForeignKey>> {
        let position = self.position(column)?;
        let Some(target) = &self.table.columns[position].foreign_key else {
            return Err(OrmError::Model(format!(
                "Column {}.{} is not a foreign key",
                self.table.name, column
            )));
        };
        Ok(match self.slot(position) {
            Slot::Placeholder(key) => Some(key),
            Slot::Entity(row) => Some(ForeignKey {
                table: target.table.clone(),
                values: row.key_values(),
            }),
            Slot::Value(_) => None,
        })
    }

    pub(crate) fn slot(&self, position: usize) -> Slot {
        self.state.lock().slots[position].clone()
    }

    /// Replace a placeholder with the resolved row without marking a change.
    pub(crate) fn cache_entity(&self, position: usize, entity: Arc<Row>) {
        self.state.lock().slots[position] = Slot::Entity(entity);
    }

    /// Primary-key values in key order.
    pub fn key_values(&self) -> Vec<Value> {
        let positions = self.table.primary_key.columns.clone();
        positions.into_iter().map(|p| self.value_at(p)).collect()
    }

    /// Every column value in declaration order, foreign keys as raw keys.
    pub fn values(&self) -> Vec<Value> {
        (0..self.table.columns.len()).map(|p| self.value_at(p)).collect()
    }

    /// Positions of columns modified since the last save or update.
    pub fn changed_columns(&self) -> Vec<usize> {
        self.state.lock().changed.iter().copied().collect()
    }

    pub(crate) fn clear_changes(&self) {
        self.state.lock().changed.clear();
    }

    /// Session the row was loaded or saved through.
    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub(crate) fn bind(&self, session: &Session) {
        self.state.lock().session = Some(session.clone());
    }

    /// Drop the session binding; lazy reads on a detached row yield nothing.
    pub fn detach(&self) {
        self.state.lock().session = None;
    }

    /// Related row of a foreign-key column, loaded on first access.
    pub fn related(&self, column: &str) -> Result<Option<Arc<Row>>> {
        super::LazyResolver::read(self, column)
    }
}

fn placeholder_or_value(target: Option<&str>, value: Value) -> Slot {
    match target {
        Some(table) if !value.is_null() => Slot::Placeholder(ForeignKey {
            table: table.to_string(),
            values: vec![value],
        }),
        _ => Slot::Value(value),
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        f.debug_struct("Row")
            .field("table", &self.table.name)
            .field("values", &values)
            .finish()
    }
}
