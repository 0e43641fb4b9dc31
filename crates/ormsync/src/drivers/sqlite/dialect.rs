//! SQLite SQL dialect (Strategy pattern).
//!
//! SQLite cannot add a foreign key to an existing table, so references are
//! declared inline with the column and the separate foreign-key statement
//! is empty.

use crate::core::identifier::IdentifierCase;
use crate::core::traits::{ansi_type_keyword, Dialect, DialectOptions};
use crate::core::{ColumnModel, DbType, TableModel};
use crate::error::Result;

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    options: DialectOptions,
}

impl SqliteDialect {
    /// Create a new SQLite dialect instance.
    pub fn new(options: DialectOptions) -> Self {
        Self { options }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn default_url(&self) -> &str {
        ":memory:"
    }

    fn options(&self) -> &DialectOptions {
        &self.options
    }

    fn is_schema_supported(&self) -> bool {
        false
    }

    fn is_comment_supported(&self) -> bool {
        false
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Mixed
    }

    fn type_keyword(&self, db_type: DbType) -> Option<&'static str> {
        match db_type {
            DbType::Clob => Some("TEXT"),
            other => ansi_type_keyword(other),
        }
    }

    fn print_create_schema(&self, _schema: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn print_native_next_sequence(&self, _name: &str, _out: &mut String) -> Result<()> {
        Ok(())
    }

    fn print_inline_references(&self, column: &ColumnModel, out: &mut String) {
        let Some(target) = &column.foreign_key else {
            return;
        };
        out.push_str(" REFERENCES ");
        self.print_name(&target.table, out);
        out.push('(');
        for (i, name) in target.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.print_name(name, out);
        }
        out.push(')');
    }

    fn print_foreign_key(
        &self,
        _table: &TableModel,
        _column: &ColumnModel,
        _out: &mut String,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{shop_model, table};

    #[test]
    fn test_inline_references() {
        let model = shop_model(Default::default());
        let order = table(&model, "ord_order");
        let dialect = SqliteDialect::default();

        let mut sql = String::new();
        dialect.print_create_table(order, &mut sql).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE ord_order\n\t( id BIGINT NOT NULL PRIMARY KEY\n\t, customer_id BIGINT REFERENCES customer(id)\n\t, note VARCHAR(200)\n\t)"
        );

        let mut fk = String::new();
        dialect
            .print_foreign_key(order, order.column("customer_id").unwrap(), &mut fk)
            .unwrap();
        assert!(fk.is_empty());
    }

    #[test]
    fn test_select_and_update() {
        let model = shop_model(Default::default());
        let order = table(&model, "ord_order");
        let dialect = SqliteDialect::default();

        let mut select = String::new();
        dialect.print_select(order, &["customer_id"], true, &mut select);
        assert_eq!(
            select,
            "SELECT o.id, o.customer_id, o.note\n\tFROM ord_order o WHERE o.customer_id=? ORDER BY o.id"
        );

        let mut update = String::new();
        dialect
            .print_update(order, &[order.column("note").unwrap()], &mut update)
            .unwrap();
        assert_eq!(update, "UPDATE ord_order\n\tSET note=?\n\tWHERE id=?");

        let mut rejected = String::new();
        assert!(dialect
            .print_update(order, &[order.column("id").unwrap()], &mut rejected)
            .is_err());
        assert!(rejected.is_empty());
    }
}
