//! Code-written table descriptors.
//!
//! Tables are declared with [`TableBuilder`] and [`ColumnBuilder`] and
//! assembled by [`DatabaseModelBuilder::build`], which validates names,
//! applies length defaults, groups index declarations into [`IndexModel`]s
//! and resolves every foreign-key column to the referenced primary key.
//!
//! ```rust
//! use ormsync::core::{ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};
//!
//! let model = DatabaseModelBuilder::new("shop")
//!     .table(
//!         TableBuilder::new("orders")
//!             .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
//!             .column(ColumnBuilder::new("note", ValueKind::Text).length(50).mandatory()),
//!     )
//!     .build()
//!     .unwrap();
//! assert_eq!(model.tables.len(), 1);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::identifier::{normalize, validate_identifier};
use super::schema::{
    ColumnModel, DatabaseModel, DbType, DdlPolicy, ForeignKeyTarget, IndexModel, PrimaryKeyModel,
    RelationModel, TableModel,
};
use super::value::{Value, ValueKind};
use crate::error::{OrmError, Result};

/// Column position used when an index name carries no `#NN` suffix.
const DEFAULT_INDEX_ORDER: u32 = 10;
const DEFAULT_VARCHAR_LENGTH: u32 = 128;

/// Declares one column.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    column: ColumnModel,
    references: Option<String>,
    auto_index: bool,
    auto_unique: bool,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            column: ColumnModel {
                name: name.into(),
                kind,
                db_type: kind.default_db_type(),
                mandatory: false,
                primary_key: false,
                max_length: None,
                precision: None,
                default_value: None,
                foreign_key: None,
                index: None,
                unique_index: None,
                comment: None,
            },
            references: None,
            auto_index: false,
            auto_unique: false,
        }
    }

    /// Override the column type derived from the value kind.
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.column.db_type = db_type;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.column.mandatory = true;
        self
    }

    /// Mark as (part of) the primary key; implies NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.column.primary_key = true;
        self.column.mandatory = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.column.max_length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.column.precision = Some(precision);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.column.default_value = Some(value.into());
        self
    }

    /// Reference the primary key of another declared table.
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    /// Join a named non-unique index; `name#20` orders the column within it.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.column.index = Some(name.into());
        self
    }

    /// Join a named unique index; `name#20` orders the column within it.
    pub fn unique_index(mut self, name: impl Into<String>) -> Self {
        self.column.unique_index = Some(name.into());
        self
    }

    /// Single-column non-unique index with a generated name.
    pub fn indexed(mut self) -> Self {
        self.auto_index = true;
        self
    }

    /// Single-column unique index with a generated name.
    pub fn unique(mut self) -> Self {
        self.auto_unique = true;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.column.comment = Some(comment.into());
        self
    }
}

/// Declares one table or view.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    schema: Option<String>,
    alias: Option<String>,
    read_only: bool,
    view: bool,
    select_sql: Option<String>,
    ddl_policy: DdlPolicy,
    comment: Option<String>,
    columns: Vec<ColumnBuilder>,
    relations: Vec<RelationModel>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            alias: None,
            read_only: false,
            view: false,
            select_sql: None,
            ddl_policy: DdlPolicy::Inherited,
            comment: None,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Declare a view, optionally backed by native SELECT text.
    pub fn view(mut self, select_sql: Option<String>) -> Self {
        self.view = true;
        self.read_only = true;
        self.select_sql = select_sql;
        self
    }

    pub fn ddl_policy(mut self, policy: DdlPolicy) -> Self {
        self.ddl_policy = policy;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn column(mut self, column: ColumnBuilder) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare a to-many relation to rows of `target_table` whose
    /// `target_column` references this table.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationModel {
            name: name.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        });
        self
    }

    fn build(self, default_schema: Option<&str>) -> Result<(TableModel, Vec<Option<String>>)> {
        validate_identifier(&self.name)?;
        let schema = self.schema.or_else(|| default_schema.map(str::to_string));
        if let Some(schema) = &schema {
            validate_identifier(schema)?;
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut references = Vec::with_capacity(self.columns.len());
        for builder in self.columns {
            let mut column = builder.column;
            validate_identifier(&column.name)?;
            if !seen.insert(normalize(&column.name)) {
                return Err(OrmError::Model(format!(
                    "Duplicate column '{}' in table '{}'",
                    column.name, self.name
                )));
            }
            apply_length_defaults(&mut column);
            if builder.auto_index && column.index.is_none() {
                column.index = Some(format!("idx_{}_{}", self.name, column.name));
            }
            if builder.auto_unique && column.unique_index.is_none() {
                column.unique_index = Some(format!("uidx_{}_{}", self.name, column.name));
            }
            references.push(builder.references);
            columns.push(column);
        }

        let primary_key = PrimaryKeyModel {
            columns: columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.primary_key)
                .map(|(i, _)| i)
                .collect(),
        };
        let indexes = build_indexes(&self.name, &columns)?;

        let table = TableModel {
            alias: self.alias.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            schema,
            read_only: self.read_only,
            view: self.view,
            select_sql: self.select_sql,
            columns,
            indexes,
            primary_key,
            ddl_policy: self.ddl_policy,
            comment: self.comment,
            relations: self.relations,
        };
        Ok((table, references))
    }
}

fn apply_length_defaults(column: &mut ColumnModel) {
    match column.db_type {
        DbType::Varchar | DbType::VarcharIgnoreCase => {
            column.max_length.get_or_insert(DEFAULT_VARCHAR_LENGTH);
        }
        DbType::Char => {
            column.max_length.get_or_insert(1);
        }
        DbType::Decimal if column.kind == ValueKind::BigInt => {
            column.max_length.get_or_insert(38);
            column.precision.get_or_insert(0);
        }
        DbType::Decimal => {
            column.max_length.get_or_insert(8);
            column.precision.get_or_insert(2);
        }
        _ => {}
    }
}

fn split_index_order(name: &str) -> (&str, u32) {
    match name.rsplit_once('#') {
        Some((base, order)) => match order.parse() {
            Ok(order) => (base, order),
            Err(_) => (name, DEFAULT_INDEX_ORDER),
        },
        None => (name, DEFAULT_INDEX_ORDER),
    }
}

struct IndexGroup {
    name: String,
    unique: bool,
    members: Vec<(u32, usize, String)>,
}

/// Group column index declarations into index models.
///
/// Names compare case-insensitively. A group becomes unique when any of its
/// members is declared unique. A non-unique index whose column set equals a
/// unique index's column set is dropped.
pub(crate) fn build_indexes(table: &str, columns: &[ColumnModel]) -> Result<Vec<IndexModel>> {
    let mut groups: Vec<IndexGroup> = Vec::new();

    for (position, column) in columns.iter().enumerate() {
        let declared = [(column.index.as_deref(), false), (column.unique_index.as_deref(), true)];
        for (name, unique) in declared {
            let Some(name) = name else { continue };
            let (base, order) = split_index_order(name);
            validate_identifier(base)?;
            let key = normalize(base);
            let group = match groups.iter().position(|g| normalize(&g.name) == key) {
                Some(i) => &mut groups[i],
                None => {
                    groups.push(IndexGroup {
                        name: base.to_string(),
                        unique: false,
                        members: Vec::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };
            group.unique |= unique;
            if !group.members.iter().any(|m| m.1 == position) {
                group.members.push((order, position, column.name.clone()));
            }
        }
    }

    let mut indexes: Vec<IndexModel> = groups
        .into_iter()
        .map(|mut group| {
            group.members.sort_by_key(|m| (m.0, m.1));
            IndexModel {
                name: group.name,
                table: table.to_string(),
                columns: group.members.into_iter().map(|m| m.2).collect(),
                unique: group.unique,
            }
        })
        .collect();

    let column_set = |index: &IndexModel| -> BTreeSet<String> {
        index.columns.iter().map(|c| normalize(c)).collect()
    };
    let unique_sets: Vec<BTreeSet<String>> = indexes
        .iter()
        .filter(|i| i.unique)
        .map(column_set)
        .collect();
    indexes.retain(|i| i.unique || !unique_sets.contains(&column_set(i)));

    Ok(indexes)
}

/// Assembles and validates a [`DatabaseModel`].
#[derive(Debug, Clone)]
pub struct DatabaseModelBuilder {
    id: String,
    default_schema: Option<String>,
    ddl_policy: DdlPolicy,
    tables: Vec<TableBuilder>,
}

impl DatabaseModelBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_schema: None,
            ddl_policy: DdlPolicy::CreateOrUpdate,
            tables: Vec::new(),
        }
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    pub fn ddl_policy(mut self, policy: DdlPolicy) -> Self {
        self.ddl_policy = policy;
        self
    }

    pub fn table(mut self, table: TableBuilder) -> Self {
        self.tables.push(table);
        self
    }

    pub fn build(self) -> Result<DatabaseModel> {
        let mut tables = Vec::with_capacity(self.tables.len());
        let mut pending = Vec::with_capacity(self.tables.len());
        let mut names = HashSet::new();

        for builder in self.tables {
            let (table, references) = builder.build(self.default_schema.as_deref())?;
            if !names.insert(normalize(&table.name)) {
                return Err(OrmError::Model(format!("Duplicate table '{}'", table.name)));
            }
            tables.push(table);
            pending.push(references);
        }

        // Resolve foreign keys once every primary key is known.
        let mut targets = Vec::new();
        for (table, references) in tables.iter().zip(&pending) {
            for (column, reference) in table.columns.iter().zip(references) {
                let Some(target_name) = reference else {
                    targets.push(None);
                    continue;
                };
                let target = tables
                    .iter()
                    .find(|t| normalize(&t.name) == normalize(target_name))
                    .ok_or_else(|| {
                        OrmError::Model(format!(
                            "Column {}.{} references unknown table '{}'",
                            table.name, column.name, target_name
                        ))
                    })?;
                if target.primary_key.columns.len() != 1 {
                    return Err(OrmError::Model(format!(
                        "Column {}.{} references table '{}' which has no single-column primary key",
                        table.name, column.name, target.name
                    )));
                }
                targets.push(Some(ForeignKeyTarget {
                    table: target.name.clone(),
                    schema: target.schema.clone(),
                    columns: target.pk_columns().map(|c| c.name.clone()).collect(),
                }));
            }
        }
        let mut targets = targets.into_iter();
        for table in &mut tables {
            for column in &mut table.columns {
                column.foreign_key = targets.next().flatten();
            }
        }

        for table in &tables {
            for relation in &table.relations {
                validate_identifier(&relation.name)?;
                let target = tables
                    .iter()
                    .find(|t| normalize(&t.name) == normalize(&relation.target_table))
                    .ok_or_else(|| {
                        OrmError::Model(format!(
                            "Relation {}.{} targets unknown table '{}'",
                            table.name, relation.name, relation.target_table
                        ))
                    })?;
                let references_back = target
                    .column(&relation.target_column)
                    .and_then(|c| c.foreign_key.as_ref())
                    .is_some_and(|fk| normalize(&fk.table) == normalize(&table.name));
                if !references_back {
                    return Err(OrmError::Model(format!(
                        "Relation {}.{} needs {}.{} to reference {}",
                        table.name,
                        relation.name,
                        target.name,
                        relation.target_column,
                        table.name
                    )));
                }
            }
        }

        Ok(DatabaseModel {
            id: self.id,
            default_schema: self.default_schema,
            ddl_policy: self.ddl_policy,
            tables: tables.into_iter().map(Arc::new).collect(),
        })
    }
}
