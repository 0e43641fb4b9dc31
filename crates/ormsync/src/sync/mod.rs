//! Schema synchronization: diff the live catalog against the declared model
//! and apply the difference in one transaction.
//!
//! A run walks through [`SyncState`]:
//!
//! ```text
//! Uninitialized -> CounterTableProbe -> CreateAll | DiffCheck -> ApplyDiff -> Done
//! ```
//!
//! Statements are executed in a fixed order: schemas, tables, added columns,
//! indexes, foreign keys, the sequence counter table, then comments.

mod diff;
mod keywords;
mod snapshot;

pub use diff::{compute_diff, DiffCounts, NewColumn, NewIndex, SchemaDiff};
pub use keywords::{check_keywords, keyword_set};
pub use snapshot::CatalogSnapshot;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{CommentPolicy, ParamsConfig};
use crate::core::{Connection, DatabaseModel, DdlPolicy, Dialect, SequenceTable, TableModel, Value};
use crate::error::{OrmError, Result};

/// Progress of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    /// Looking for the sequence counter table.
    CounterTableProbe,
    /// First run: the counter table is missing.
    CreateAll,
    /// The database was initialized before.
    DiffCheck,
    ApplyDiff,
    Done,
}

/// Kind of DDL unit a planned statement creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Schema,
    Table,
    Column,
    Index,
    ForeignKey,
    SequenceTable,
    Comment,
}

/// One statement of a synchronization plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStatement {
    pub step: SyncStep,
    /// Owning table, absent for schemas and the sequence table.
    pub table: Option<String>,
    pub sql: String,
    /// Effective policy deciding whether the statement runs.
    pub policy: DdlPolicy,
}

/// Result of a synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Final state.
    pub state: SyncState,

    /// The sequence counter table was missing.
    pub first_run: bool,

    /// Statements were planned but not executed.
    pub dry_run: bool,

    pub new_tables: usize,
    pub new_columns: usize,
    pub new_indexes: usize,

    /// Executed (or, in a dry run, planned) statements in order.
    pub statements: Vec<PlannedStatement>,

    /// Statements only logged because of a `warning` policy.
    pub skipped: Vec<PlannedStatement>,

    pub started_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Uninitialized,
            first_run: false,
            dry_run: false,
            new_tables: 0,
            new_columns: 0,
            new_indexes: 0,
            statements: Vec::new(),
            skipped: Vec::new(),
            started_at,
            duration_seconds: 0.0,
        }
    }

    /// Whether the database differs from the declared model.
    pub fn has_changes(&self) -> bool {
        !self.statements.is_empty() || !self.skipped.is_empty()
    }
}

/// Keeps one database schema in line with its declared model.
pub struct SchemaSynchronizer {
    model: Arc<DatabaseModel>,
    dialect: Arc<dyn Dialect>,
    params: ParamsConfig,
    sequence: SequenceTable,
    state: SyncState,
}

impl SchemaSynchronizer {
    pub fn new(model: Arc<DatabaseModel>, dialect: Arc<dyn Dialect>, params: ParamsConfig) -> Self {
        let sequence = params.sequence_table(model.default_schema.as_deref());
        Self {
            model,
            dialect,
            params,
            sequence,
            state: SyncState::Uninitialized,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    fn enter(&mut self, state: SyncState) {
        debug!("Synchronization of '{}': {:?} -> {:?}", self.model.id, self.state, state);
        self.state = state;
    }

    /// Synchronize the database behind `conn`, committing on success and
    /// rolling back on any failure.
    pub fn create(&mut self, conn: &mut dyn Connection) -> Result<SyncReport> {
        self.run(conn, false)
    }

    /// Compute the statements [`create`](Self::create) would execute without
    /// changing the database.
    pub fn dry_run(&mut self, conn: &mut dyn Connection) -> Result<SyncReport> {
        self.run(conn, true)
    }

    fn run(&mut self, conn: &mut dyn Connection, dry_run: bool) -> Result<SyncReport> {
        let start = Instant::now();
        let mut report = SyncReport::new(Utc::now());
        report.dry_run = dry_run;
        self.state = SyncState::Uninitialized;

        if self.model.ddl_policy.resolve(DdlPolicy::Inherited) == DdlPolicy::DoNothing {
            info!("Synchronization of '{}' skipped by policy", self.model.id);
            self.enter(SyncState::Done);
            report.state = self.state;
            return Ok(report);
        }

        let result = self.run_steps(conn, &mut report);
        let result = match result {
            Ok(()) if dry_run => conn.rollback(),
            Ok(()) => conn.commit(),
            Err(e) => {
                if let Err(rollback) = conn.rollback() {
                    warn!("Rollback after failed synchronization failed: {}", rollback);
                }
                Err(e)
            }
        };
        result?;

        self.enter(SyncState::Done);
        report.state = self.state;
        report.duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Synchronization of '{}' complete: {} statements, {} skipped",
            self.model.id,
            report.statements.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn run_steps(&mut self, conn: &mut dyn Connection, report: &mut SyncReport) -> Result<()> {
        self.enter(SyncState::CounterTableProbe);
        let first_run = self.probe_counter_table(conn)?;
        report.first_run = first_run;
        self.enter(if first_run {
            SyncState::CreateAll
        } else {
            SyncState::DiffCheck
        });

        let diff = compute_diff(conn, &self.model)?;
        let counts = diff.counts();
        report.new_tables = counts.new_tables;
        report.new_columns = counts.new_columns;
        report.new_indexes = counts.new_indexes;

        let keywords = keyword_set(conn.sql_keywords()?);
        check_keywords(&diff, &keywords, self.params.check_keywords)?;

        let statements = self.plan(&diff, first_run)?;
        if statements.is_empty() && self.params.comment_policy != CommentPolicy::Always {
            info!("Database '{}' is up to date", self.model.id);
            return Ok(());
        }

        self.enter(SyncState::ApplyDiff);
        self.apply_diff(conn, statements, report)?;

        let changed = !report.statements.is_empty();
        for statement in self.plan_comments(&diff, changed)? {
            if report.dry_run {
                report.statements.push(statement);
                continue;
            }
            match conn.execute(&statement.sql, &[]) {
                Ok(_) => report.statements.push(statement),
                Err(e) => warn!("Comment statement failed: {}", e),
            }
        }
        Ok(())
    }

    /// The full creation script of the model for an empty database,
    /// comments included when the comment policy writes them for new tables.
    pub fn script(&self) -> Result<Vec<PlannedStatement>> {
        let mut empty = CatalogSnapshot::with_case(self.dialect.identifier_case());
        let diff = compute_diff(&mut empty, &self.model)?;
        let mut statements = self.plan(&diff, true)?;
        statements.extend(self.plan_comments(&diff, true)?);
        Ok(statements)
    }

    /// Read the counter table; `true` when it does not exist (first run).
    ///
    /// A failed read is a first run only when the catalog confirms the table
    /// is missing; any other failure is reported.
    pub fn probe_counter_table(&self, conn: &mut dyn Connection) -> Result<bool> {
        let mut sql = String::new();
        self.dialect.print_sequence_current_value(&self.sequence, &mut sql);
        match conn.query(&sql, &[Value::from("-")]) {
            Ok(_) => Ok(false),
            Err(e) => {
                conn.rollback()?;
                let case = conn.identifier_case();
                let schema = self.sequence.schema.as_deref().map(|s| case.apply(s));
                let name = case.apply(&self.sequence.name);
                if conn.column_names(schema.as_deref(), &name)?.is_empty() {
                    info!("Sequence table {} not found, initializing database", self.sequence.name);
                    Ok(true)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Statements required to bring the catalog in line with the model,
    /// excluding comments.
    pub fn plan(&self, diff: &SchemaDiff, first_run: bool) -> Result<Vec<PlannedStatement>> {
        let dialect = self.dialect.as_ref();
        let database_policy = self.model.ddl_policy.resolve(DdlPolicy::Inherited);
        let mut plan = Vec::new();

        if database_policy == DdlPolicy::CreateOnly && !diff.is_empty() && !diff.all_tables_new() {
            info!(
                "Database '{}' is create-only and already initialized, changes are ignored",
                self.model.id
            );
            return Ok(plan);
        }

        if diff.all_tables_new() {
            let schemas: BTreeSet<&str> = diff
                .new_tables
                .iter()
                .filter_map(|t| t.schema.as_deref())
                .collect();
            for schema in schemas {
                let mut sql = String::new();
                dialect.print_create_schema(schema, &mut sql)?;
                push(&mut plan, SyncStep::Schema, None, sql, database_policy);
            }
        }

        for table in &diff.new_tables {
            let mut sql = String::new();
            dialect.print_create_table(table, &mut sql)?;
            push(&mut plan, SyncStep::Table, Some(table), sql, self.model.policy_for(table));
        }

        for added in &diff.new_columns {
            let Some(policy) = self.alter_policy(&added.table) else {
                continue;
            };
            let mut sql = String::new();
            dialect.print_alter_table_add_column(&added.table, added.column(), &mut sql)?;
            push(&mut plan, SyncStep::Column, Some(&added.table), sql, policy);
        }

        for added in &diff.new_indexes {
            let policy = if diff.is_new_table(&added.table) {
                self.model.policy_for(&added.table)
            } else {
                let Some(policy) = self.alter_policy(&added.table) else {
                    continue;
                };
                policy
            };
            let mut sql = String::new();
            dialect.print_create_index(&added.table, added.index(), &mut sql)?;
            push(&mut plan, SyncStep::Index, Some(&added.table), sql, policy);
        }

        for table in &diff.new_tables {
            let policy = self.model.policy_for(table);
            for column in table.columns.iter().filter(|c| c.is_foreign_key()) {
                let mut sql = String::new();
                dialect.print_foreign_key(table, column, &mut sql)?;
                push(&mut plan, SyncStep::ForeignKey, Some(table), sql, policy);
            }
        }
        for added in diff.new_columns.iter().filter(|c| c.column().is_foreign_key()) {
            let Some(policy) = self.alter_policy(&added.table) else {
                continue;
            };
            let mut sql = String::new();
            dialect.print_foreign_key(&added.table, added.column(), &mut sql)?;
            push(&mut plan, SyncStep::ForeignKey, Some(&added.table), sql, policy);
        }

        if first_run && self.model.ddl_tables().next().is_some() {
            let mut sql = String::new();
            dialect.print_sequence_table(&self.sequence, self.params.sequence_cache.max(1), &mut sql)?;
            push(&mut plan, SyncStep::SequenceTable, None, sql, database_policy);
        }

        Ok(plan)
    }

    /// Policy for altering an existing table, `None` when it must stay untouched.
    fn alter_policy(&self, table: &TableModel) -> Option<DdlPolicy> {
        match self.model.policy_for(table) {
            DdlPolicy::CreateOnly => {
                debug!("Table {} is create-only, not altered", table.full_name());
                None
            }
            policy => Some(policy),
        }
    }

    /// Comment statements selected by the configured comment policy.
    fn plan_comments(&self, diff: &SchemaDiff, changed: bool) -> Result<Vec<PlannedStatement>> {
        let tables: Vec<&Arc<TableModel>> = match self.params.comment_policy {
            CommentPolicy::Never => return Ok(Vec::new()),
            CommentPolicy::ForNewObject => diff.new_tables.iter().collect(),
            CommentPolicy::Always => self.model.ddl_tables().collect(),
            CommentPolicy::OnAnyChange if changed => self.model.ddl_tables().collect(),
            CommentPolicy::OnAnyChange => return Ok(Vec::new()),
        };

        let mut plan = Vec::new();
        for table in tables {
            let policy = self.model.policy_for(table);
            if !matches!(policy, DdlPolicy::CreateOnly | DdlPolicy::CreateOrUpdate) {
                continue;
            }
            let mut sql = String::new();
            self.dialect.print_comment_table(table, &mut sql)?;
            push(&mut plan, SyncStep::Comment, Some(table), sql, policy);
            for column in &table.columns {
                let mut sql = String::new();
                self.dialect.print_comment_column(table, column, &mut sql)?;
                push(&mut plan, SyncStep::Comment, Some(table), sql, policy);
            }
        }
        Ok(plan)
    }

    /// Run planned statements under their policies.
    ///
    /// `validate-only` fails on the first statement, `warning` only logs and
    /// `do-nothing` skips. Nothing is executed in a dry run.
    pub fn apply_diff(
        &self,
        conn: &mut dyn Connection,
        statements: Vec<PlannedStatement>,
        report: &mut SyncReport,
    ) -> Result<()> {
        for statement in statements {
            match statement.policy {
                DdlPolicy::ValidateOnly => {
                    return Err(OrmError::SchemaValidation(statement.sql));
                }
                DdlPolicy::Warning => {
                    warn!("Required database change: {}", statement.sql);
                    report.skipped.push(statement);
                }
                DdlPolicy::DoNothing => {}
                _ if report.dry_run => report.statements.push(statement),
                _ => {
                    conn.execute(&statement.sql, &[])?;
                    report.statements.push(statement);
                }
            }
        }
        Ok(())
    }
}

fn push(
    plan: &mut Vec<PlannedStatement>,
    step: SyncStep,
    table: Option<&Arc<TableModel>>,
    sql: String,
    policy: DdlPolicy,
) {
    if sql.is_empty() {
        return;
    }
    plan.push(PlannedStatement {
        step,
        table: table.map(|t| t.full_name()),
        sql,
        policy,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordCheck;
    use crate::core::identifier::IdentifierCase;
    use crate::core::{Catalog, ColumnBuilder, DatabaseModelBuilder, TableBuilder, ValueKind};
    use crate::drivers::{H2Dialect, SqliteConnection, SqliteDialect};
    use crate::testing::{orders_model, shop_model};

    /// Records statements against a fixed catalog; the counter table probe
    /// fails unless the catalog lists it.
    struct RecordingConnection {
        catalog: CatalogSnapshot,
        executed: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl RecordingConnection {
        fn new(catalog: CatalogSnapshot) -> Self {
            Self {
                catalog,
                executed: Vec::new(),
                fail_on: None,
            }
        }
    }

    impl Catalog for RecordingConnection {
        fn column_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
            self.catalog.column_names(schema, table)
        }

        fn index_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
            self.catalog.index_names(schema, table)
        }

        fn identifier_case(&self) -> IdentifierCase {
            self.catalog.identifier_case()
        }

        fn sql_keywords(&mut self) -> Result<Vec<String>> {
            self.catalog.sql_keywords()
        }
    }

    impl Connection for RecordingConnection {
        fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<usize> {
            if self.fail_on.is_some_and(|prefix| sql.starts_with(prefix)) {
                return Err(OrmError::statement(sql, "rejected"));
            }
            self.executed.push(sql.to_string());
            Ok(0)
        }

        fn query(&mut self, sql: &str, _params: &[Value]) -> Result<Vec<Vec<Value>>> {
            if self.catalog.column_names(None, SequenceTable::DEFAULT_NAME)?.is_empty() {
                return Err(OrmError::statement(sql, "table not found"));
            }
            Ok(Vec::new())
        }

        fn commit(&mut self) -> Result<()> {
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn synchronizer(model: DatabaseModel, dialect: Arc<dyn Dialect>) -> SchemaSynchronizer {
        SchemaSynchronizer::new(Arc::new(model), dialect, ParamsConfig::default())
    }

    fn steps(report: &SyncReport) -> Vec<SyncStep> {
        report.statements.iter().map(|s| s.step).collect()
    }

    #[test]
    fn test_orders_first_run_on_sqlite() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let mut sync = synchronizer(orders_model(), Arc::new(SqliteDialect::default()));

        let report = sync.create(&mut conn).unwrap();
        assert!(report.first_run);
        assert_eq!((report.new_tables, report.new_columns, report.new_indexes), (1, 0, 0));
        assert_eq!(steps(&report), vec![SyncStep::Table, SyncStep::SequenceTable]);
        assert!(report.statements[0].sql.starts_with("CREATE TABLE orders"));
        assert!(report.statements[1].sql.starts_with("CREATE TABLE ormsync_pk_support"));
        assert_eq!(sync.state(), SyncState::Done);
        assert_eq!(conn.column_names(None, "orders").unwrap(), vec!["id", "note"]);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let mut sync = synchronizer(shop_model(DdlPolicy::CreateOrUpdate), Arc::new(SqliteDialect::default()));
        let first = sync.create(&mut conn).unwrap();
        assert_eq!(
            steps(&first),
            vec![SyncStep::Table, SyncStep::Table, SyncStep::Index, SyncStep::SequenceTable]
        );

        let second = sync.create(&mut conn).unwrap();
        assert!(!second.first_run);
        assert!(!second.has_changes());
        assert_eq!((second.new_tables, second.new_columns, second.new_indexes), (0, 0, 0));
    }

    #[test]
    fn test_added_column_is_altered() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let narrow = DatabaseModelBuilder::new("orders_db")
            .table(TableBuilder::new("orders").column(ColumnBuilder::new("id", ValueKind::Long).primary_key()))
            .build()
            .unwrap();
        synchronizer(narrow, Arc::new(SqliteDialect::default()))
            .create(&mut conn)
            .unwrap();

        let report = synchronizer(orders_model(), Arc::new(SqliteDialect::default()))
            .create(&mut conn)
            .unwrap();
        assert!(!report.first_run);
        assert_eq!(steps(&report), vec![SyncStep::Column]);
        assert_eq!(report.statements[0].sql, "ALTER TABLE orders ADD COLUMN note VARCHAR(50)");
        assert_eq!(conn.column_names(None, "orders").unwrap(), vec!["id", "note"]);
    }

    #[test]
    fn test_validate_only_fails_and_rolls_back() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let mut sync = synchronizer(shop_model(DdlPolicy::ValidateOnly), Arc::new(SqliteDialect::default()));
        let err = sync.create(&mut conn).unwrap_err();
        match &err {
            OrmError::SchemaValidation(sql) => assert!(sql.starts_with("CREATE TABLE customer")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 2);
        assert!(conn.column_names(None, "customer").unwrap().is_empty());
    }

    #[test]
    fn test_warning_policy_executes_nothing() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let mut sync = synchronizer(shop_model(DdlPolicy::Warning), Arc::new(SqliteDialect::default()));
        let report = sync.create(&mut conn).unwrap();
        assert!(report.statements.is_empty());
        assert_eq!(report.skipped.len(), 4);
        assert!(conn.column_names(None, "customer").unwrap().is_empty());
    }

    #[test]
    fn test_do_nothing_skips_probe() {
        let mut conn = RecordingConnection::new(CatalogSnapshot::default());
        let mut sync = synchronizer(shop_model(DdlPolicy::DoNothing), Arc::new(H2Dialect::default()));
        let report = sync.create(&mut conn).unwrap();
        assert_eq!(report.state, SyncState::Done);
        assert!(conn.executed.is_empty());
    }

    #[test]
    fn test_reserved_column_name_aborts() {
        let model = DatabaseModelBuilder::new("kw")
            .table(
                TableBuilder::new("item")
                    .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
                    .column(ColumnBuilder::new("select", ValueKind::Text)),
            )
            .build()
            .unwrap();
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let err = synchronizer(model, Arc::new(SqliteDialect::default()))
            .create(&mut conn)
            .unwrap_err();
        assert!(matches!(err, OrmError::ReservedWord { .. }));
        assert!(conn.column_names(None, "item").unwrap().is_empty());
    }

    #[test]
    fn test_backend_keywords_downgraded_to_warning() {
        let mut catalog = CatalogSnapshot::default();
        catalog.add_keywords(vec!["NOTE".to_string()]);
        let mut conn = RecordingConnection::new(catalog);
        let params = ParamsConfig {
            check_keywords: KeywordCheck::Warn,
            ..ParamsConfig::default()
        };
        let mut sync = SchemaSynchronizer::new(Arc::new(orders_model()), Arc::new(H2Dialect::default()), params);
        assert!(sync.create(&mut conn).is_ok());

        let mut catalog = CatalogSnapshot::default();
        catalog.add_keywords(vec!["NOTE".to_string()]);
        let mut conn = RecordingConnection::new(catalog);
        let err = synchronizer(orders_model(), Arc::new(H2Dialect::default()))
            .create(&mut conn)
            .unwrap_err();
        assert!(matches!(err, OrmError::ReservedWord { .. }));
    }

    #[test]
    fn test_h2_full_build_order() {
        let model = DatabaseModelBuilder::new("shop")
            .default_schema("sales")
            .table(crate::testing::customer_table())
            .table(
                TableBuilder::new("ord_order")
                    .comment("Customer orders")
                    .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
                    .column(ColumnBuilder::new("customer_id", ValueKind::Long).references("customer")),
            )
            .build()
            .unwrap();
        let mut conn = RecordingConnection::new(CatalogSnapshot::default());
        let report = synchronizer(model, Arc::new(H2Dialect::default()))
            .create(&mut conn)
            .unwrap();

        assert_eq!(
            steps(&report),
            vec![
                SyncStep::Schema,
                SyncStep::Table,
                SyncStep::Table,
                SyncStep::ForeignKey,
                SyncStep::SequenceTable,
                SyncStep::Comment,
            ]
        );
        assert_eq!(conn.executed[0], "CREATE SCHEMA IF NOT EXISTS sales");
        assert!(conn.executed[3].starts_with("ALTER TABLE sales.ord_order\n\tADD FOREIGN KEY(customer_id)"));
        assert!(conn.executed[4].starts_with("CREATE TABLE sales.ormsync_pk_support"));
        assert_eq!(conn.executed[5], "COMMENT ON TABLE sales.ord_order IS 'Customer orders'");
    }

    #[test]
    fn test_comment_failure_does_not_abort() {
        let mut conn = RecordingConnection::new(CatalogSnapshot::default());
        conn.fail_on = Some("COMMENT");
        let report = synchronizer(shop_model(DdlPolicy::CreateOrUpdate), Arc::new(H2Dialect::default()))
            .create(&mut conn)
            .unwrap();
        assert!(report.statements.iter().all(|s| s.step != SyncStep::Comment));
        assert!(conn.executed.iter().any(|s| s.starts_with("CREATE TABLE ord_order")));
    }

    #[test]
    fn test_comment_policy_for_new_object() {
        let mut catalog = CatalogSnapshot::default();
        catalog.add_table(None, "customer", &["id", "name"], &[]);
        catalog.add_table(None, SequenceTable::DEFAULT_NAME, &["id", "seq", "cache", "max_value"], &[]);
        catalog.add_table(None, "ord_order", &["id", "customer_id"], &["idx_ord_order_customer_id"]);
        let mut conn = RecordingConnection::new(catalog);
        let params = ParamsConfig {
            comment_policy: CommentPolicy::ForNewObject,
            ..ParamsConfig::default()
        };
        let report = SchemaSynchronizer::new(
            Arc::new(shop_model(DdlPolicy::CreateOrUpdate)),
            Arc::new(H2Dialect::default()),
            params,
        )
        .create(&mut conn)
        .unwrap();
        assert!(!report.first_run);
        assert_eq!(steps(&report), vec![SyncStep::Column]);
        assert_eq!(conn.executed, vec!["ALTER TABLE ord_order ADD COLUMN note VARCHAR(200)"]);
    }

    #[test]
    fn test_new_foreign_key_column_on_existing_table() {
        let mut catalog = CatalogSnapshot::default();
        catalog.add_table(None, "customer", &["id", "name"], &[]);
        catalog.add_table(None, SequenceTable::DEFAULT_NAME, &["id", "seq", "cache", "max_value"], &[]);
        catalog.add_table(None, "ord_order", &["id", "note"], &[]);
        let mut conn = RecordingConnection::new(catalog);
        let params = ParamsConfig {
            comment_policy: CommentPolicy::ForNewObject,
            ..ParamsConfig::default()
        };
        let report = SchemaSynchronizer::new(
            Arc::new(shop_model(DdlPolicy::CreateOrUpdate)),
            Arc::new(H2Dialect::default()),
            params,
        )
        .create(&mut conn)
        .unwrap();

        assert!(!report.first_run);
        assert_eq!((report.new_tables, report.new_columns, report.new_indexes), (0, 1, 1));
        assert_eq!(
            steps(&report),
            vec![SyncStep::Column, SyncStep::Index, SyncStep::ForeignKey]
        );
        assert_eq!(conn.executed[0], "ALTER TABLE ord_order ADD COLUMN customer_id BIGINT");
        assert!(conn.executed[1].starts_with("CREATE INDEX idx_ord_order_customer_id ON ord_order"));
        assert!(conn.executed[2].starts_with("ALTER TABLE ord_order\n\tADD FOREIGN KEY(customer_id)"));
        assert!(conn.executed[2].contains("REFERENCES customer"));
    }

    #[test]
    fn test_create_only_database_ignores_partial_changes() {
        let mut catalog = CatalogSnapshot::default();
        catalog.add_table(None, "customer", &["id", "name"], &[]);
        let mut conn = RecordingConnection::new(catalog);
        let report = synchronizer(shop_model(DdlPolicy::CreateOnly), Arc::new(H2Dialect::default()))
            .create(&mut conn)
            .unwrap();
        assert_eq!(report.new_tables, 1);
        assert!(report.statements.is_empty());
        assert!(conn.executed.is_empty());
    }

    #[test]
    fn test_dry_run_plans_without_executing() {
        let mut conn = RecordingConnection::new(CatalogSnapshot::default());
        let report = synchronizer(orders_model(), Arc::new(H2Dialect::default()))
            .dry_run(&mut conn)
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(steps(&report), vec![SyncStep::Table, SyncStep::SequenceTable]);
        assert!(conn.executed.is_empty());
    }

    #[test]
    fn test_script_for_empty_database() {
        let sync = synchronizer(orders_model(), Arc::new(H2Dialect::default()));
        let script = sync.script().unwrap();
        let steps: Vec<SyncStep> = script.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![SyncStep::Table, SyncStep::SequenceTable]);
        assert!(script[0].sql.starts_with("CREATE TABLE orders"));
        assert_eq!(sync.state(), SyncState::Uninitialized);

        let shop = synchronizer(shop_model(DdlPolicy::CreateOrUpdate), Arc::new(H2Dialect::default()));
        let script = shop.script().unwrap();
        assert!(script.iter().any(|s| s.sql == "COMMENT ON TABLE ord_order IS 'Customer orders'"));
    }

    #[test]
    fn test_failing_statement_reports_sql() {
        let mut conn = RecordingConnection::new(CatalogSnapshot::default());
        conn.fail_on = Some("CREATE TABLE ord_order");
        let err = synchronizer(shop_model(DdlPolicy::CreateOrUpdate), Arc::new(H2Dialect::default()))
            .create(&mut conn)
            .unwrap_err();
        match err {
            OrmError::Statement { sql, .. } => assert!(sql.starts_with("CREATE TABLE ord_order")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
