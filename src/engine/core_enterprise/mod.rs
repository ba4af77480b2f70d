//! InfluxDB 3 Core / Enterprise Engine
//!
//! Core and Enterprise share one HTTP surface under `/api/v3/configure/database`.
//! Both planes use the instance URL and a `Bearer` token.
//!
//! # Implementation Notes
//! - Listing tolerates every envelope the server has used (see
//!   [`CORE_DATABASE_ENVELOPES`]) and items that are bare strings or objects keyed
//!   `iox::database` / `name`
//! - Delete addresses the database by query string, not path
//! - Update is not defined for these products and falls back to the trait default

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::engine::{DatabaseConfig, DatabaseEngine, DatabaseInfo, EngineContext};
use crate::error::Result;
use crate::normalize::{extract_array, str_field, CORE_DATABASE_ENVELOPES};

/// Database configuration endpoint
pub const DATABASE_PATH: &str = "/api/v3/configure/database";

/// `InfluxDB` 3 Core and Enterprise engine
pub struct CoreEngine;

#[async_trait]
impl DatabaseEngine for CoreEngine {
    async fn list_databases(&self, ctx: EngineContext<'_>) -> Result<Vec<DatabaseInfo>> {
        let body = ctx.transport.get_with_query(DATABASE_PATH, &[("format", "json")]).await?;
        Ok(parse_database_list(&body))
    }

    async fn create_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        _options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        ctx.transport.post(DATABASE_PATH, &create_payload(name)).await?;
        Ok(DatabaseInfo::named(name))
    }

    async fn delete_database(&self, ctx: EngineContext<'_>, name: &str) -> Result<()> {
        ctx.transport.delete_with_query(DATABASE_PATH, &[("db", name)]).await?;
        Ok(())
    }
}

/// Create payload: the server only accepts a name
#[must_use]
pub fn create_payload(name: &str) -> Value {
    json!({ "db": name })
}

/// Normalize a database listing from any known envelope
#[must_use]
pub fn parse_database_list(body: &Value) -> Vec<DatabaseInfo> {
    extract_array(body, CORE_DATABASE_ENVELOPES)
        .iter()
        .filter_map(|item| {
            let name = database_name(item);
            if name.is_none() {
                debug!(item = %item, "skipping unrecognised database entry");
            }
            name.map(DatabaseInfo::named)
        })
        .collect()
}

fn database_name(item: &Value) -> Option<String> {
    match item {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Object(_) => str_field(item, "iox::database").or_else(|| str_field(item, "name")),
        _ => None,
    }
}
