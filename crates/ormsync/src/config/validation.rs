//! Configuration validation.

use super::Config;
use crate::error::{OrmError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.id.trim().is_empty() {
        return Err(OrmError::Config("database.id must not be empty".into()));
    }
    if config.database.dialect.trim().is_empty() {
        return Err(OrmError::Config("database.dialect is required".into()));
    }
    if config.database.url.is_some() && !config.database.jndi.is_empty() {
        return Err(OrmError::Config(
            "database.url and database.jndi are mutually exclusive".into(),
        ));
    }

    if config.params.sequence_table.trim().is_empty() {
        return Err(OrmError::Config(
            "params.sequence_table must not be empty".into(),
        ));
    }
    if config.params.insert_multirow_limit == 0 {
        return Err(OrmError::Config(
            "params.insert_multirow_limit must be at least 1".into(),
        ));
    }

    for table in &config.tables {
        if table.columns.is_empty() {
            return Err(OrmError::Config(format!(
                "tables.{} must declare at least one column",
                table.name
            )));
        }
    }

    Ok(())
}
