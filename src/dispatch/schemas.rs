//! Measurement schema resource (Cloud Serverless only)
//!
//! Every call resolves the bucket name to its id first. Updates are additive on the
//! backend: the caller sends the full column set, existing columns included.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::engine::serverless::ServerlessEngine;
use crate::engine::{ColumnType, EngineContext, SchemaColumn, SchemaInfo};
use crate::error::{InfluxError, Result};

use super::{prepare, require_name};

/// Check a column list before it is sent
///
/// The list must be non-empty with unique, non-blank names. `field` columns need a data
/// type; `tag` and `timestamp` columns must not have one.
pub fn validate_columns(columns: &[SchemaColumn]) -> Result<()> {
    if columns.is_empty() {
        return Err(InfluxError::invalid_input("At least one column is required"));
    }

    let mut seen = HashSet::new();
    for column in columns {
        let name = column.name.trim();
        if name.is_empty() {
            return Err(InfluxError::invalid_input("Column names must not be empty"));
        }
        if !seen.insert(name) {
            return Err(InfluxError::invalid_input(format!("Duplicate column '{name}'")));
        }

        match (column.column_type, column.data_type) {
            (ColumnType::Field, None) => {
                return Err(InfluxError::invalid_input(format!(
                    "Field column '{name}' requires a dataType"
                )));
            }
            (ColumnType::Tag | ColumnType::Timestamp, Some(data_type)) => {
                return Err(InfluxError::invalid_input(format!(
                    "{} column '{name}' must not declare a dataType (got '{}')",
                    column.column_type.as_str(),
                    data_type.as_str()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Measurement schema operations for one configured deployment
#[derive(Debug, Clone, Copy)]
pub struct SchemaService<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> SchemaService<'a> {
    #[must_use]
    pub const fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn list(&self, bucket: &str) -> Result<Vec<SchemaInfo>> {
        let transport = prepare(self.config, Operation::ListSchemas)?;
        let bucket = require_name("Bucket name", bucket)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let schemas = ServerlessEngine.list_schemas(ctx, bucket).await?;
        info!(bucket, count = schemas.len(), "listed measurement schemas");
        Ok(schemas)
    }

    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn get(&self, bucket: &str, measurement: &str) -> Result<SchemaInfo> {
        let transport = prepare(self.config, Operation::GetSchema)?;
        let bucket = require_name("Bucket name", bucket)?;
        let measurement = require_name("Measurement name", measurement)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        ServerlessEngine.get_schema(ctx, bucket, measurement).await
    }

    #[instrument(
        skip(self, columns),
        fields(product = %self.config.product, columns = columns.len())
    )]
    pub async fn create(
        &self,
        bucket: &str,
        measurement: &str,
        columns: &[SchemaColumn],
    ) -> Result<SchemaInfo> {
        let transport = prepare(self.config, Operation::CreateSchema)?;
        let bucket = require_name("Bucket name", bucket)?;
        let measurement = require_name("Measurement name", measurement)?;
        validate_columns(columns)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let schema = ServerlessEngine
            .create_schema(ctx, bucket, measurement, columns)
            .await?;
        info!(bucket, measurement, "created measurement schema");
        Ok(schema)
    }

    /// Send the complete column set for a measurement. Columns missing from `columns` are
    /// not removed by the backend, and nothing is merged here.
    #[instrument(
        skip(self, columns),
        fields(product = %self.config.product, columns = columns.len())
    )]
    pub async fn update(
        &self,
        bucket: &str,
        measurement: &str,
        columns: &[SchemaColumn],
    ) -> Result<SchemaInfo> {
        let transport = prepare(self.config, Operation::UpdateSchema)?;
        let bucket = require_name("Bucket name", bucket)?;
        let measurement = require_name("Measurement name", measurement)?;
        validate_columns(columns)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let schema = ServerlessEngine
            .update_schema(ctx, bucket, measurement, columns)
            .await?;
        info!(bucket, measurement, "updated measurement schema");
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ColumnDataType;

    #[test]
    fn test_valid_columns() {
        let columns = vec![
            SchemaColumn::timestamp(),
            SchemaColumn::tag("host"),
            SchemaColumn::field("usage", ColumnDataType::Float),
        ];
        assert!(validate_columns(&columns).is_ok());
    }

    #[test]
    fn test_empty_columns_rejected() {
        let err = validate_columns(&[]).unwrap_err();
        assert!(err.message().contains("At least one column"));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let columns = vec![SchemaColumn::tag("host"), SchemaColumn::tag("host")];
        let err = validate_columns(&columns).unwrap_err();
        assert!(err.message().contains("Duplicate column 'host'"));
    }

    #[test]
    fn test_field_without_data_type_rejected() {
        let column = SchemaColumn {
            data_type: None,
            ..SchemaColumn::field("usage", ColumnDataType::Float)
        };
        let err = validate_columns(&[column]).unwrap_err();
        assert!(err.message().contains("requires a dataType"));
    }

    #[test]
    fn test_tag_with_data_type_rejected() {
        let column = SchemaColumn {
            data_type: Some(ColumnDataType::String),
            ..SchemaColumn::tag("host")
        };
        let message = validate_columns(&[column]).unwrap_err().message();
        assert!(message.contains("tag column 'host'"));
    }

    #[test]
    fn test_blank_column_name_rejected() {
        assert!(validate_columns(&[SchemaColumn::tag("  ")]).is_err());
    }

    #[tokio::test]
    async fn test_schema_operations_rejected_outside_serverless() {
        let config = ConnectionConfig::core("http://127.0.0.1:9", "t");
        let err = SchemaService::new(&config)
            .list("metrics")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
        assert!(err.message().contains("cloud-serverless"));
    }
}
