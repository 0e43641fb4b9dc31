//! In-memory catalog used for offline diffs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::identifier::{normalize, IdentifierCase};
use crate::core::{Catalog, DatabaseModel};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TableSnapshot {
    columns: Vec<String>,
    indexes: Vec<String>,
}

/// A frozen view of table, column and index names.
///
/// Lookups ignore case; names are reported as they were recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    case: IdentifierCase,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tables: HashMap<String, TableSnapshot>,
}

impl CatalogSnapshot {
    pub fn with_case(case: IdentifierCase) -> Self {
        Self {
            case,
            ..Self::default()
        }
    }

    /// Snapshot a database after every table of `model` has been created.
    pub fn from_model(model: &DatabaseModel) -> Self {
        let mut snapshot = Self::default();
        for table in model.ddl_tables() {
            let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            let indexes: Vec<&str> = table.indexes.iter().map(|i| i.name.as_str()).collect();
            snapshot.add_table(table.schema.as_deref(), &table.name, &columns, &indexes);
        }
        snapshot
    }

    pub fn add_table(&mut self, schema: Option<&str>, name: &str, columns: &[&str], indexes: &[&str]) {
        self.tables.insert(
            key(schema, name),
            TableSnapshot {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                indexes: indexes.iter().map(|i| i.to_string()).collect(),
            },
        );
    }

    pub fn add_keywords(&mut self, keywords: impl IntoIterator<Item = String>) {
        self.keywords.extend(keywords);
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

fn key(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", normalize(schema), normalize(name)),
        None => normalize(name),
    }
}

impl Catalog for CatalogSnapshot {
    fn column_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(&key(schema, table))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn index_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(&key(schema, table))
            .map(|t| t.indexes.clone())
            .unwrap_or_default())
    }

    fn identifier_case(&self) -> IdentifierCase {
        self.case
    }

    fn sql_keywords(&mut self) -> Result<Vec<String>> {
        Ok(self.keywords.clone())
    }
}
