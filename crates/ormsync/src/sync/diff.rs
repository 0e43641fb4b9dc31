//! Difference between the declared model and a live catalog.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::core::identifier::normalize;
use crate::core::{Catalog, ColumnModel, DatabaseModel, IndexModel, TableModel};
use crate::error::Result;

/// A declared column missing from an existing table.
#[derive(Debug, Clone)]
pub struct NewColumn {
    pub table: Arc<TableModel>,
    pub position: usize,
}

impl NewColumn {
    pub fn column(&self) -> &ColumnModel {
        &self.table.columns[self.position]
    }
}

/// A declared index missing from the catalog.
#[derive(Debug, Clone)]
pub struct NewIndex {
    pub table: Arc<TableModel>,
    pub position: usize,
}

impl NewIndex {
    pub fn index(&self) -> &IndexModel {
        &self.table.indexes[self.position]
    }
}

/// Objects to create, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub new_tables: Vec<Arc<TableModel>>,
    pub new_columns: Vec<NewColumn>,
    pub new_indexes: Vec<NewIndex>,
    /// Number of declared tables taking part in DDL.
    pub table_count: usize,
}

/// Summary counts of a [`SchemaDiff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub new_tables: usize,
    pub new_columns: usize,
    pub new_indexes: usize,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty() && self.new_columns.is_empty() && self.new_indexes.is_empty()
    }

    /// Whether every declared table is missing (initial database build).
    pub fn all_tables_new(&self) -> bool {
        self.table_count > 0 && self.new_tables.len() == self.table_count
    }

    pub fn is_new_table(&self, table: &TableModel) -> bool {
        self.new_tables.iter().any(|t| t.full_name() == table.full_name())
    }

    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            new_tables: self.new_tables.len(),
            new_columns: self.new_columns.len(),
            new_indexes: self.new_indexes.len(),
        }
    }
}

/// Compare every DDL table of `model` with the catalog.
///
/// A table is new when the catalog reports no columns for it. Columns are
/// only compared for existing tables; every index of a new table is new.
/// Names are looked up in the catalog's storage case and compared
/// case-insensitively.
pub fn compute_diff<C: Catalog + ?Sized>(catalog: &mut C, model: &DatabaseModel) -> Result<SchemaDiff> {
    let case = catalog.identifier_case();
    let mut diff = SchemaDiff::default();

    for table in model.ddl_tables() {
        diff.table_count += 1;
        let schema = table.schema.as_deref().map(|s| case.apply(s));
        let name = case.apply(&table.name);

        let live_columns: HashSet<String> = catalog
            .column_names(schema.as_deref(), &name)?
            .iter()
            .map(|c| normalize(c))
            .collect();
        let exists = !live_columns.is_empty();

        if exists {
            for (position, column) in table.columns.iter().enumerate() {
                if !live_columns.contains(&normalize(&column.name)) {
                    info!("New DB column: {}.{}", table.full_name(), column.name);
                    diff.new_columns.push(NewColumn {
                        table: Arc::clone(table),
                        position,
                    });
                }
            }
        } else {
            info!("New DB table: {}", table.full_name());
            diff.new_tables.push(Arc::clone(table));
        }

        let live_indexes: HashSet<String> = if exists {
            catalog
                .index_names(schema.as_deref(), &name)?
                .iter()
                .map(|i| normalize(i))
                .collect()
        } else {
            HashSet::new()
        };
        for (position, index) in table.indexes.iter().enumerate() {
            if !live_indexes.contains(&normalize(&index.name)) {
                info!("New DB index: {} on {}", index.name, table.full_name());
                diff.new_indexes.push(NewIndex {
                    table: Arc::clone(table),
                    position,
                });
            }
        }
    }

    Ok(diff)
}
