//! Core traits: the SQL dialect strategy and blocking database access.
//!
//! - [`Dialect`]: produces DDL/DML text for one backend
//! - [`Catalog`]: read-only introspection of existing tables and indexes
//! - [`Connection`]: statement execution inside an implicit transaction
//! - [`Connector`]: opens new connections
//!
//! # Dialect defaults
//!
//! Every `Dialect` method except the identity accessors has a default that
//! produces ANSI-style text. A backend overrides only the fragments that
//! differ. Each `print_*` method builds its statement in a scratch buffer
//! and appends to the caller's buffer only on success. A method for a
//! capability the backend lacks leaves the buffer untouched.

use std::fmt::Debug;

use super::identifier::{escape_literal, quote_ansi, IdentifierCase};
use super::schema::{ColumnModel, DbType, IndexModel, SequenceTable, TableModel};
use super::value::Value;
use crate::error::{OrmError, Result};

/// Per-database dialect settings taken from configuration.
#[derive(Debug, Clone)]
pub struct DialectOptions {
    /// Quote every table, column, index and schema name.
    pub quote_identifiers: bool,
    /// Storage engine appended to MySQL `CREATE TABLE` statements.
    pub mysql_engine: String,
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self {
            quote_identifiers: false,
            mysql_engine: "InnoDB".to_string(),
        }
    }
}

/// Column type keyword shared by dialects that follow ANSI naming.
pub fn ansi_type_keyword(db_type: DbType) -> Option<&'static str> {
    match db_type {
        DbType::Null => None,
        DbType::VarcharIgnoreCase => Some("VARCHAR"),
        other => Some(other.sql_name()),
    }
}

/// SQL syntax strategy for one database backend.
///
/// Dialects are selected once per logical database and shared behind an
/// `Arc<dyn Dialect>` by the synchronizer, the sequencer and sessions.
pub trait Dialect: Send + Sync + Debug {
    /// Registered dialect name (e.g. "h2", "mssql").
    fn name(&self) -> &str;

    /// Example connection string for the backend.
    fn default_url(&self) -> &str;

    /// Settings the dialect was created with.
    fn options(&self) -> &DialectOptions;

    /// Schema-qualified names address a catalog (database) rather than a schema.
    fn is_catalog_supported(&self) -> bool {
        false
    }

    /// Whether table names may carry a schema prefix.
    fn is_schema_supported(&self) -> bool {
        true
    }

    /// Whether `INSERT ... VALUES (..), (..)` is accepted.
    fn is_multi_row_insert_supported(&self) -> bool {
        true
    }

    /// Whether table/column comments can be written.
    fn is_comment_supported(&self) -> bool {
        true
    }

    /// Case the backend folds unquoted identifiers to.
    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Upper
    }

    /// Trailing phrase of each SELECT in an insert-by-select batch.
    fn insert_by_select_from(&self) -> &str {
        ""
    }

    /// Quote one identifier.
    fn quote_identifier(&self, name: &str) -> String {
        quote_ansi(name)
    }

    /// Print a name, quoted when identifier quoting is configured.
    fn print_name(&self, name: &str, out: &mut String) {
        if self.options().quote_identifiers {
            out.push_str(&self.quote_identifier(name));
        } else {
            out.push_str(name);
        }
    }

    /// Print `SCHEMA.NAME`, or just `NAME` without schema support.
    fn print_full_name(&self, schema: Option<&str>, name: &str, out: &mut String) {
        if let Some(schema) = schema.filter(|s| !s.is_empty() && self.is_schema_supported()) {
            self.print_name(schema, out);
            out.push('.');
        }
        self.print_name(name, out);
    }

    fn print_full_table_name(&self, table: &TableModel, out: &mut String) {
        self.print_full_name(table.schema.as_deref(), &table.name, out);
    }

    /// Print `SCHEMA.TABLE ALIAS`.
    fn print_table_alias(&self, table: &TableModel, out: &mut String) {
        self.print_full_table_name(table, out);
        out.push(' ');
        out.push_str(&table.alias);
    }

    /// Backend keyword for a column type, `None` when it cannot be expressed.
    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        ansi_type_keyword(db_type)
    }

    /// Backend type name of a column, failing with `UnsupportedType`.
    fn column_type_name(&self, column: &ColumnModel) -> Result<String> {
        self.type_keyword(column.db_type)
            .map(str::to_string)
            .ok_or_else(|| OrmError::unsupported(self.name(), &column.name, column.db_type))
    }

    /// Print the type with its `(length[,precision])` suffix.
    fn print_column_type(&self, column: &ColumnModel, out: &mut String) -> Result<()> {
        let type_name = self.column_type_name(column)?;
        out.push_str(&type_name);
        print_type_length(column, out);
        Ok(())
    }

    /// SQL literal of a boolean DEFAULT value.
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Print ` DEFAULT <value>`; an empty text default prints nothing.
    fn print_default_value(&self, column: &ColumnModel, out: &mut String) {
        match &column.default_value {
            None | Some(Value::Null) => {}
            Some(Value::Text(text)) if text.is_empty() => {}
            Some(Value::Bool(value)) => {
                out.push_str(" DEFAULT ");
                out.push_str(self.boolean_literal(*value));
            }
            Some(value) => {
                out.push_str(" DEFAULT ");
                out.push_str(&value.sql_literal());
            }
        }
    }

    /// Print `name TYPE(len) [DEFAULT v] [NOT NULL] [PRIMARY KEY]`.
    ///
    /// `PRIMARY KEY` is written inline only for single-column keys; composite
    /// keys get a table constraint from [`print_create_table`](Self::print_create_table).
    fn print_column_declaration(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let mut sql = String::new();
        self.print_name(&column.name, &mut sql);
        sql.push(' ');
        self.print_column_type(column, &mut sql)?;
        self.print_default_value(column, &mut sql);
        if column.mandatory {
            sql.push_str(" NOT NULL");
        }
        if column.primary_key && table.primary_key.columns.len() == 1 {
            sql.push_str(" PRIMARY KEY");
        }
        self.print_inline_references(column, &mut sql);
        out.push_str(&sql);
        Ok(())
    }

    /// Inline `REFERENCES` clause for backends that cannot add foreign keys
    /// with `ALTER TABLE`.
    fn print_inline_references(&self, _column: &ColumnModel, _out: &mut String) {}

    fn print_create_schema(&self, schema: &str, out: &mut String) -> Result<()> {
        out.push_str("CREATE SCHEMA IF NOT EXISTS ");
        self.print_name(schema, out);
        Ok(())
    }

    /// Print the CREATE TABLE statement of a declared table.
    fn print_create_table(&self, table: &TableModel, out: &mut String) -> Result<()> {
        let mut sql = String::from("CREATE TABLE ");
        self.print_full_table_name(table, &mut sql);
        let mut separator = "\n\t( ";
        for column in &table.columns {
            sql.push_str(separator);
            separator = "\n\t, ";
            self.print_column_declaration(table, column, &mut sql)?;
        }
        if table.primary_key.columns.len() > 1 {
            sql.push_str("\n\t, PRIMARY KEY (");
            for (i, column) in table.pk_columns().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                self.print_name(&column.name, &mut sql);
            }
            sql.push(')');
        }
        sql.push_str("\n\t)");
        sql.push_str(&self.table_suffix());
        out.push_str(&sql);
        Ok(())
    }

    fn print_alter_table_add_column(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let mut sql = String::from("ALTER TABLE ");
        self.print_full_table_name(table, &mut sql);
        sql.push_str(" ADD COLUMN ");
        self.print_column_declaration(table, column, &mut sql)?;
        out.push_str(&sql);
        Ok(())
    }

    fn print_create_index(
        &self,
        table: &TableModel,
        index: &IndexModel,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("CREATE ");
        if index.unique {
            out.push_str("UNIQUE ");
        }
        out.push_str("INDEX ");
        self.print_name(&index.name, out);
        out.push_str(" ON ");
        self.print_full_table_name(table, out);
        let mut separator = " (";
        for column in &index.columns {
            out.push_str(separator);
            separator = ", ";
            self.print_name(column, out);
        }
        out.push(')');
        Ok(())
    }

    /// Print `ALTER TABLE .. ADD FOREIGN KEY(..) REFERENCES ..(..)` for a column.
    fn print_foreign_key(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let Some(target) = &column.foreign_key else {
            return Ok(());
        };
        out.push_str("ALTER TABLE ");
        self.print_full_table_name(table, out);
        out.push_str("\n\tADD ");
        if let Some(name) = self.foreign_key_name(table, column) {
            out.push_str("CONSTRAINT ");
            self.print_name(&name, out);
            out.push(' ');
        }
        out.push_str("FOREIGN KEY(");
        self.print_name(&column.name, out);
        out.push_str(")\n\tREFERENCES ");
        self.print_full_name(target.schema.as_deref(), &target.table, out);
        let mut separator = "(";
        for name in &target.columns {
            out.push_str(separator);
            separator = ", ";
            self.print_name(name, out);
        }
        out.push(')');
        Ok(())
    }

    /// Constraint name given to a foreign key, `None` to let the backend pick.
    fn foreign_key_name(&self, _table: &TableModel, _column: &ColumnModel) -> Option<String> {
        None
    }

    fn print_sequence_table_name(&self, sequence: &SequenceTable, out: &mut String) {
        self.print_full_name(sequence.schema.as_deref(), &sequence.name, out);
    }

    /// Table-creation suffix (e.g. a storage engine clause).
    fn table_suffix(&self) -> String {
        String::new()
    }

    /// Print the CREATE TABLE statement of the sequence counter table.
    fn print_sequence_table(
        &self,
        sequence: &SequenceTable,
        cache: i64,
        out: &mut String,
    ) -> Result<()> {
        let bigint = self
            .type_keyword(DbType::BigInt)
            .ok_or_else(|| OrmError::unsupported(self.name(), "seq", DbType::BigInt))?;
        let int = self
            .type_keyword(DbType::Int)
            .ok_or_else(|| OrmError::unsupported(self.name(), "cache", DbType::Int))?;
        let varchar = self
            .type_keyword(DbType::Varchar)
            .ok_or_else(|| OrmError::unsupported(self.name(), "id", DbType::Varchar))?;

        let mut sql = String::from("CREATE TABLE ");
        self.print_sequence_table_name(sequence, &mut sql);
        sql.push_str(&format!(
            "\n\t( id {varchar}(96) NOT NULL PRIMARY KEY\
             \n\t, seq {bigint} DEFAULT {cache} NOT NULL\
             \n\t, cache {int} DEFAULT {cache} NOT NULL\
             \n\t, max_value {bigint} DEFAULT 0 NOT NULL\
             \n\t)"
        ));
        sql.push_str(&self.table_suffix());
        out.push_str(&sql);
        Ok(())
    }

    /// `INSERT` of a new counter row; one parameter: the sequence id.
    fn print_sequence_init(&self, sequence: &SequenceTable, cache: i64, out: &mut String) {
        out.push_str("INSERT INTO ");
        self.print_sequence_table_name(sequence, out);
        out.push_str(&format!(" (id,seq,cache) VALUES (?,{cache},{cache})"));
    }

    /// Atomic counter increment; one parameter: the sequence id.
    fn print_sequence_next_value(&self, sequence: &SequenceTable, out: &mut String) {
        out.push_str("UPDATE ");
        self.print_sequence_table_name(sequence, out);
        out.push_str(" SET seq=seq+cache WHERE id=?");
    }

    /// Move the counter to its maximum; one parameter: the sequence id.
    fn print_sequence_set_max(&self, sequence: &SequenceTable, out: &mut String) {
        out.push_str("UPDATE ");
        self.print_sequence_table_name(sequence, out);
        out.push_str(" SET seq=max_value WHERE id=?");
    }

    /// Read `seq, cache, max_value`; one parameter: the sequence id.
    fn print_sequence_current_value(&self, sequence: &SequenceTable, out: &mut String) {
        out.push_str("SELECT seq, cache, max_value FROM ");
        self.print_sequence_table_name(sequence, out);
        out.push_str(" WHERE id=?");
    }

    /// Query reading the next value of a native database sequence.
    ///
    /// Backends without sequence objects leave the buffer untouched.
    fn print_native_next_sequence(&self, name: &str, out: &mut String) -> Result<()> {
        out.push_str("SELECT NEXT VALUE FOR ");
        self.print_name(name, out);
        let from = self.insert_by_select_from();
        if !from.is_empty() {
            out.push(' ');
            out.push_str(from);
        }
        Ok(())
    }

    fn print_comment_table(&self, table: &TableModel, out: &mut String) -> Result<()> {
        let Some(comment) = table.comment.as_deref().filter(|_| self.is_comment_supported()) else {
            return Ok(());
        };
        out.push_str("COMMENT ON TABLE ");
        self.print_full_table_name(table, out);
        out.push_str(" IS '");
        out.push_str(&escape_literal(comment));
        out.push('\'');
        Ok(())
    }

    fn print_comment_column(
        &self,
        table: &TableModel,
        column: &ColumnModel,
        out: &mut String,
    ) -> Result<()> {
        let Some(comment) = column.comment.as_deref().filter(|_| self.is_comment_supported()) else {
            return Ok(());
        };
        out.push_str("COMMENT ON COLUMN ");
        self.print_full_table_name(table, out);
        out.push('.');
        self.print_name(&column.name, out);
        out.push_str(" IS '");
        out.push_str(&escape_literal(comment));
        out.push('\'');
        Ok(())
    }

    /// Wrap `base` so it returns at most `limit` rows after skipping `offset`.
    fn paginate(&self, offset: u64, limit: Option<u64>, base: &str, out: &mut String) -> Result<()> {
        out.push_str(base);
        if limit.is_none() && offset == 0 {
            return Ok(());
        }
        let limit = limit.unwrap_or(i64::MAX as u64);
        out.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        Ok(())
    }

    /// `INSERT INTO t (c1, c2) VALUES (?, ?)` covering every column.
    fn print_insert(&self, table: &TableModel, out: &mut String) {
        self.print_insert_head(table, out);
        out.push_str(") VALUES (");
        out.push_str(&placeholders(table.columns.len()));
        out.push(')');
    }

    /// `INSERT INTO t (c1, c2` without the closing parenthesis.
    fn print_insert_head(&self, table: &TableModel, out: &mut String) {
        out.push_str("INSERT INTO ");
        self.print_full_table_name(table, out);
        out.push_str(" (");
        for (i, column) in table.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.print_name(&column.name, out);
        }
    }

    /// Multi-row `INSERT ... VALUES \n(..),\n(..)` for `rows` rows.
    fn print_multi_row_insert(&self, table: &TableModel, rows: usize, out: &mut String) {
        if !self.is_multi_row_insert_supported() {
            return self.print_insert_by_select(table, rows, out);
        }
        self.print_insert_head(table, out);
        let values = placeholders(table.columns.len());
        for i in 0..rows {
            out.push_str(if i == 0 { ") VALUES \n(" } else { "),\n(" });
            out.push_str(&values);
        }
        out.push(')');
    }

    /// Batch insert through `SELECT ?.. UNION ALL SELECT ?..`.
    fn print_insert_by_select(&self, table: &TableModel, rows: usize, out: &mut String) {
        self.print_insert_head(table, out);
        let values = placeholders(table.columns.len());
        let from = self.insert_by_select_from();
        for i in 0..rows {
            out.push_str(if i == 0 { ")\nSELECT " } else { " UNION ALL\nSELECT " });
            out.push_str(&values);
            if !from.is_empty() {
                out.push(' ');
                out.push_str(from);
            }
        }
    }

    /// `SELECT a.c1, a.c2\n\tFROM t a [WHERE a.f=? AND ..] [ORDER BY a.pk]`.
    fn print_select(
        &self,
        table: &TableModel,
        filter: &[&str],
        order_by_pk: bool,
        out: &mut String,
    ) {
        out.push_str("SELECT ");
        for (i, column) in table.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&table.alias);
            out.push('.');
            self.print_name(&column.name, out);
        }
        out.push_str("\n\tFROM ");
        self.print_table_alias(table, out);
        for (i, name) in filter.iter().enumerate() {
            out.push_str(if i == 0 { " WHERE " } else { " AND " });
            out.push_str(&table.alias);
            out.push('.');
            self.print_name(name, out);
            out.push_str("=?");
        }
        if order_by_pk && !table.primary_key.columns.is_empty() {
            for (i, column) in table.pk_columns().enumerate() {
                out.push_str(if i == 0 { " ORDER BY " } else { ", " });
                out.push_str(&table.alias);
                out.push('.');
                self.print_name(&column.name, out);
            }
        }
    }

    /// `UPDATE t\n\tSET c=?, ..\n\tWHERE pk=? AND ..`; key columns cannot change.
    fn print_update(
        &self,
        table: &TableModel,
        changed: &[&ColumnModel],
        out: &mut String,
    ) -> Result<()> {
        let mut sql = String::from("UPDATE ");
        self.print_full_table_name(table, &mut sql);
        sql.push_str("\n\tSET ");
        for (i, column) in changed.iter().enumerate() {
            if column.primary_key {
                return Err(OrmError::Model(format!(
                    "Primary key {}.{} can not be changed",
                    table.name, column.name
                )));
            }
            if i > 0 {
                sql.push_str(", ");
            }
            self.print_name(&column.name, &mut sql);
            sql.push_str("=?");
        }
        self.print_pk_where(table, "\n\tWHERE ", &mut sql);
        out.push_str(&sql);
        Ok(())
    }

    /// `DELETE FROM t WHERE pk=? AND ..`.
    fn print_delete(&self, table: &TableModel, out: &mut String) {
        out.push_str("DELETE FROM ");
        self.print_full_table_name(table, out);
        self.print_pk_where(table, " WHERE ", out);
    }

    #[doc(hidden)]
    fn print_pk_where(&self, table: &TableModel, lead: &str, out: &mut String) {
        for (i, column) in table.pk_columns().enumerate() {
            out.push_str(if i == 0 { lead } else { " AND " });
            self.print_name(&column.name, out);
            out.push_str("=?");
        }
    }
}

/// Print the `(length[,precision])` suffix of types that take one.
pub fn print_type_length(column: &ColumnModel, out: &mut String) {
    if !column.db_type.is_length_allowed() {
        return;
    }
    if let Some(length) = column.max_length {
        out.push('(');
        out.push_str(&length.to_string());
        if let Some(precision) = column.precision.filter(|_| column.db_type == DbType::Decimal) {
            out.push(',');
            out.push_str(&precision.to_string());
        }
        out.push(')');
    }
}

/// 1-based number of the last row of a page, capped at `i64::MAX`.
pub fn page_end(offset: u64, limit: u64) -> u64 {
    offset.saturating_add(limit).min(i64::MAX as u64)
}

/// `?, ?, ?` for `count` parameters.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Read-only introspection of a live (or snapshotted) database catalog.
pub trait Catalog {
    /// Column names of a table as stored by the backend; empty when the
    /// table does not exist.
    fn column_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;

    /// Index names of an existing table.
    fn index_names(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;

    /// Case the catalog stores unquoted identifiers in.
    fn identifier_case(&self) -> IdentifierCase;

    /// Reserved words reported by the backend.
    fn sql_keywords(&mut self) -> Result<Vec<String>>;
}

/// A blocking database connection with auto-commit disabled.
///
/// Statements run inside an implicit transaction ended by [`commit`] or
/// [`rollback`]. Failures are reported as [`OrmError::Statement`] carrying
/// the statement text.
///
/// [`commit`]: Connection::commit
/// [`rollback`]: Connection::rollback
pub trait Connection: Catalog + Send {
    /// Execute a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run a query and return every row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Opens connections to one logical database.
pub trait Connector: Send + Sync + Debug {
    fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Whether the backend admits only one writing transaction at a time.
    ///
    /// Sessions of such a backend reserve key ranges on their own
    /// connection, inside their open transaction.
    fn single_writer(&self) -> bool {
        false
    }
}
