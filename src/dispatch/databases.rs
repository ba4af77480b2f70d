//! Database resource: list, create, update, delete

use tracing::{info, instrument};

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::engine::{database_engine, DatabaseConfig, DatabaseInfo, EngineContext};
use crate::error::Result;

use super::{prepare, require_name};

/// Database operations for one configured deployment
#[derive(Debug, Clone, Copy)]
pub struct DatabaseService<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> DatabaseService<'a> {
    #[must_use]
    pub const fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    /// List user databases (system buckets are excluded on Cloud Serverless)
    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn list(&self) -> Result<Vec<DatabaseInfo>> {
        let transport = prepare(self.config, Operation::ListDatabases)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let databases = database_engine(self.config.product)
            .list_databases(ctx)
            .await?;
        info!(count = databases.len(), "listed databases");
        Ok(databases)
    }

    /// Create a database. Omitted settings take the product's defaults.
    #[instrument(skip(self, options), fields(product = %self.config.product))]
    pub async fn create(&self, name: &str, options: &DatabaseConfig) -> Result<DatabaseInfo> {
        let transport = prepare(self.config, Operation::CreateDatabase)?;
        let name = require_name("Database name", name)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let database = database_engine(self.config.product)
            .create_database(ctx, name, options)
            .await?;
        info!(database = %database.name, "created database");
        Ok(database)
    }

    /// Update a database's settings (Cloud Dedicated, Clustered, Cloud Serverless)
    #[instrument(skip(self, options), fields(product = %self.config.product))]
    pub async fn update(&self, name: &str, options: &DatabaseConfig) -> Result<DatabaseInfo> {
        let transport = prepare(self.config, Operation::UpdateDatabase)?;
        let name = require_name("Database name", name)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let database = database_engine(self.config.product)
            .update_database(ctx, name, options)
            .await?;
        info!(database = %database.name, "updated database");
        Ok(database)
    }

    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let transport = prepare(self.config, Operation::DeleteDatabase)?;
        let name = require_name("Database name", name)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        database_engine(self.config.product)
            .delete_database(ctx, name)
            .await?;
        info!(database = name, "deleted database");
        Ok(())
    }
}
