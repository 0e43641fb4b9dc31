//! Lazy resolution of foreign-key columns and to-many relations.

use std::backtrace::Backtrace;
use std::sync::Arc;

use tracing::warn;

use super::{Row, Session, Slot};
use crate::config::LoadingPolicy;
use crate::core::TableModel;
use crate::error::{OrmError, Result};

/// How a lazy read reaches the database.
enum Access {
    /// The row is detached; nothing is loaded.
    Unbound,
    /// Through the row's open session.
    Open(Session),
    /// Through a throwaway session whose result is detached.
    Throwaway(Session),
}

/// Resolves related rows through the session a row is bound to.
///
/// A row loaded by an open session reads through it and caches the result.
/// Once that session is closed, the session's [`LoadingPolicy`] decides
/// whether to fail or to load through a short-lived session.
pub struct LazyResolver;

impl LazyResolver {
    /// Related row of a foreign-key column.
    pub fn read(row: &Row, column: &str) -> Result<Option<Arc<Row>>> {
        let table = row.table();
        let position = table.column_position(column).ok_or_else(|| {
            OrmError::Model(format!("Unknown column {}.{}", table.name, column))
        })?;
        if !table.columns[position].is_foreign_key() {
            return Err(OrmError::Model(format!(
                "Column {}.{} is not a foreign key",
                table.name, column
            )));
        }

        let key = match row.slot(position) {
            Slot::Entity(entity) => return Ok(Some(entity)),
            Slot::Value(_) => return Ok(None),
            Slot::Placeholder(key) => key,
        };

        match Self::access(row, table, column)? {
            Access::Unbound => Ok(None),
            Access::Open(session) => {
                let entity = session.load(&key.table, key.value().clone())?;
                if let Some(entity) = &entity {
                    row.cache_entity(position, Arc::clone(entity));
                }
                Ok(entity)
            }
            Access::Throwaway(session) => {
                let loaded = session.load(&key.table, key.value().clone());
                session.close()?;
                let entity = loaded?;
                if let Some(entity) = &entity {
                    entity.detach();
                    row.cache_entity(position, Arc::clone(entity));
                }
                Ok(entity)
            }
        }
    }

    /// Rows of a to-many relation; `None` for a detached row.
    pub fn read_many(row: &Row, relation: &str) -> Result<Option<Vec<Arc<Row>>>> {
        let table = row.table();
        if table.relation(relation).is_none() {
            return Err(OrmError::Model(format!(
                "Unknown relation {}.{}",
                table.name, relation
            )));
        }

        match Self::access(row, table, relation)? {
            Access::Unbound => Ok(None),
            Access::Open(session) => session.read_relation(row, relation).map(Some),
            Access::Throwaway(session) => {
                let loaded = session.read_relation(row, relation);
                session.close()?;
                let rows = loaded?;
                for related in &rows {
                    related.detach();
                }
                Ok(Some(rows))
            }
        }
    }

    fn access(row: &Row, table: &TableModel, member: &str) -> Result<Access> {
        let Some(session) = row.session() else {
            return Ok(Access::Unbound);
        };
        if !session.is_closed() {
            return Ok(Access::Open(session));
        }
        match session.lazy_loading() {
            LoadingPolicy::Disabled => Err(OrmError::LazyLoadingDisabled {
                table: table.name.clone(),
                column: member.to_string(),
            }),
            LoadingPolicy::AllowedAnywhere => Ok(Access::Throwaway(session.database().session())),
            LoadingPolicy::AllowedAnywhereWithWarning => {
                warn!("Lazy read of {}.{} after its session was closed", table.name, member);
                Ok(Access::Throwaway(session.database().session()))
            }
            LoadingPolicy::AllowedAnywhereWithStacktrace => {
                warn!(
                    "Lazy read of {}.{} after its session was closed\n{}",
                    table.name,
                    member,
                    Backtrace::force_capture()
                );
                Ok(Access::Throwaway(session.database().session()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamsConfig;
    use crate::core::Value;
    use crate::session::tests::{open_shop, seed};
    use tempfile::TempDir;

    #[test]
    fn test_open_session_loads_and_caches() {
        let dir = TempDir::new().unwrap();
        let db = open_shop(&dir, ParamsConfig::default());
        seed(&db);

        let session = db.session();
        let order = session.load("ord_order", 1i64).unwrap().unwrap();
        let first = order.related("customer_id").unwrap().unwrap();
        assert_eq!(first.get("name").unwrap(), Value::from("Ann"));
        assert!(first.session().unwrap().same_as(&session));

        let second = order.related("customer_id").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(order.changed_columns().is_empty());
    }

    #[test]
    fn test_null_foreign_key_reads_nothing() {
        let dir = TempDir::new().unwrap();
        let db = open_shop(&dir, ParamsConfig::default());
        let session = db.session();
        let order = Arc::new(Row::new(Arc::clone(db.model().require_table("ord_order").unwrap())));
        order.set("note", "loose").unwrap();
        session.save(&order).unwrap();
        assert!(order.related("customer_id").unwrap().is_none());
        assert!(order.related("note").is_err());
    }

    #[test]
    fn test_closed_session_disabled() {
        let dir = TempDir::new().unwrap();
        let db = open_shop(&dir, ParamsConfig::default());
        seed(&db);

        let session = db.session();
        let order = session.load("ord_order", 1i64).unwrap().unwrap();
        session.close().unwrap();
        let err = order.related("customer_id").unwrap_err();
        assert!(matches!(
            err,
            OrmError::LazyLoadingDisabled { ref table, ref column } if table == "ord_order" && column == "customer_id"
        ));
    }

    #[test]
    fn test_closed_session_allowed_anywhere() {
        let dir = TempDir::new().unwrap();
        let db = open_shop(&dir, ParamsConfig::default());
        seed(&db);

        for policy in [
            LoadingPolicy::AllowedAnywhere,
            LoadingPolicy::AllowedAnywhereWithWarning,
            LoadingPolicy::AllowedAnywhereWithStacktrace,
        ] {
            let session = db.session();
            session.set_lazy_loading(policy);
            let order = session.load("ord_order", 2i64).unwrap().unwrap();
            session.close().unwrap();

            let customer = order.related("customer_id").unwrap().unwrap();
            assert_eq!(customer.get("id").unwrap(), Value::Long(1));
            assert!(customer.session().is_none());
            assert!(Arc::ptr_eq(&customer, &order.related("customer_id").unwrap().unwrap()));
        }
    }

    #[test]
    fn test_read_many() {
        let dir = TempDir::new().unwrap();
        let db = open_shop(&dir, ParamsConfig::default());
        seed(&db);

        let session = db.session();
        let ann = session.load("customer", 1i64).unwrap().unwrap();
        assert_eq!(LazyResolver::read_many(&ann, "orders").unwrap().unwrap().len(), 2);

        session.set_lazy_loading(LoadingPolicy::AllowedAnywhere);
        session.close().unwrap();
        let orders = LazyResolver::read_many(&ann, "orders").unwrap().unwrap();
        assert!(orders.iter().all(|o| o.session().is_none()));

        ann.detach();
        assert!(LazyResolver::read_many(&ann, "orders").unwrap().is_none());
        assert!(LazyResolver::read_many(&ann, "missing").is_err());
    }
}
