//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::sync::Arc;

use crate::core::{
    ColumnBuilder, DatabaseModel, DatabaseModelBuilder, Dialect, DialectCatalog, DialectOptions,
    TableBuilder, Value,
};
use crate::error::{OrmError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Dialect settings derived from the parameters.
    pub fn dialect_options(&self) -> DialectOptions {
        DialectOptions {
            quote_identifiers: self.params.quote_identifiers,
            mysql_engine: self.params.mysql_engine.clone(),
        }
    }

    /// Instantiate the configured dialect.
    pub fn create_dialect(&self, catalog: &DialectCatalog) -> Result<Arc<dyn Dialect>> {
        catalog.create(&self.database.dialect, self.dialect_options())
    }

    /// Build the declared model from the `tables` section.
    pub fn to_model(&self) -> Result<DatabaseModel> {
        let mut builder =
            DatabaseModelBuilder::new(&self.database.id).ddl_policy(self.params.ddl_policy);
        if let Some(schema) = &self.database.schema {
            builder = builder.default_schema(schema);
        }
        for table in &self.tables {
            builder = builder.table(table.to_builder()?);
        }
        builder.build()
    }
}

impl TableConfig {
    fn to_builder(&self) -> Result<TableBuilder> {
        let mut table = TableBuilder::new(&self.name).ddl_policy(self.ddl_policy);
        if let Some(schema) = &self.schema {
            table = table.schema(schema);
        }
        if let Some(alias) = &self.alias {
            table = table.alias(alias);
        }
        if self.read_only {
            table = table.read_only();
        }
        if self.view || self.select_sql.is_some() {
            table = table.view(self.select_sql.clone());
        }
        if let Some(comment) = &self.comment {
            table = table.comment(comment);
        }
        for column in &self.columns {
            table = table.column(column.to_builder(&self.name)?);
        }
        for relation in &self.relations {
            table = table.relation(&relation.name, &relation.table, &relation.column);
        }
        Ok(table)
    }
}

impl ColumnConfig {
    fn to_builder(&self, table: &str) -> Result<ColumnBuilder> {
        let mut column = ColumnBuilder::new(&self.name, self.kind);
        if let Some(db_type) = self.db_type {
            column = column.db_type(db_type);
        }
        if self.primary_key {
            column = column.primary_key();
        }
        if self.mandatory {
            column = column.mandatory();
        }
        if let Some(length) = self.length {
            column = column.length(length);
        }
        if let Some(precision) = self.precision {
            column = column.precision(precision);
        }
        if let Some(default) = &self.default {
            if let Some(value) = self.default_value(default, table)? {
                column = column.default_value(value);
            }
        }
        if let Some(target) = &self.references {
            column = column.references(target);
        }
        if let Some(index) = &self.index {
            column = column.index(index);
        }
        if let Some(index) = &self.unique_index {
            column = column.unique_index(index);
        }
        if let Some(comment) = &self.comment {
            column = column.comment(comment);
        }
        Ok(column)
    }

    fn default_value(&self, yaml: &serde_yaml::Value, table: &str) -> Result<Option<Value>> {
        let raw = match yaml {
            serde_yaml::Value::Null => return Ok(None),
            serde_yaml::Value::Bool(v) => Value::Bool(*v),
            serde_yaml::Value::String(v) => Value::Text(v.clone()),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(v) => Value::Long(v),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            other => {
                return Err(OrmError::Config(format!(
                    "{}.{}: unsupported default value {:?}",
                    table, self.name, other
                )))
            }
        };
        raw.coerce(self.kind).map(Some).map_err(|e| {
            OrmError::Config(format!("{}.{}: invalid default value: {}", table, self.name, e))
        })
    }
}
