//! Cloud Dedicated / Clustered Engine
//!
//! Both products expose the account/cluster scoped management API:
//! `/api/v0/accounts/{accountId}/clusters/{clusterId}/databases[/{name}]`.
//! Cloud Dedicated serves it from the management console origin, Clustered from the
//! instance URL; the transport handed in already points at the right host.
//!
//! # Implementation Notes
//! - Create fills in `maxTables`, `maxColumnsPerTable` and `retentionPeriod` defaults
//!   only for fields the caller omitted
//! - Update is a partial patch of the provided numeric fields; nothing to send is an error
//! - Database names are embedded in the path and percent-encoded
//! - Token management (`/tokens`) is registered for Cloud Dedicated only

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::ConnectionConfig;
use crate::engine::{
    CreateTokenRequest, DatabaseConfig, DatabaseEngine, DatabaseInfo, EngineContext,
    TokenAction, TokenEngine, TokenInfo, TokenPermission, DEFAULT_MAX_COLUMNS_PER_TABLE,
    DEFAULT_MAX_TABLES, DEFAULT_RETENTION_PERIOD_NS,
};
use crate::error::{InfluxError, Result};
use crate::normalize::{
    extract_array, str_field, u64_field, DEDICATED_DATABASE_ENVELOPES, DEDICATED_TOKEN_ENVELOPES,
};
use crate::product::ConfigField;

/// Cloud Dedicated and Clustered engine
pub struct DedicatedEngine;

/// `/api/v0/accounts/{a}/clusters/{c}` prefix for this configuration
fn cluster_path(config: &ConnectionConfig) -> Result<String> {
    let account = required(config, ConfigField::AccountId)?;
    let cluster = required(config, ConfigField::ClusterId)?;
    Ok(format!(
        "/api/v0/accounts/{}/clusters/{}",
        urlencoding::encode(account),
        urlencoding::encode(cluster)
    ))
}

fn required(config: &ConnectionConfig, field: ConfigField) -> Result<&str> {
    config.field(field).ok_or_else(|| {
        InfluxError::configuration(format!(
            "{field} is required for product type '{}'. Set {}",
            config.product,
            field.env_var()
        ))
    })
}

fn databases_path(config: &ConnectionConfig) -> Result<String> {
    Ok(format!("{}/databases", cluster_path(config)?))
}

fn database_path(config: &ConnectionConfig, name: &str) -> Result<String> {
    Ok(format!(
        "{}/databases/{}",
        cluster_path(config)?,
        urlencoding::encode(name)
    ))
}

#[async_trait]
impl DatabaseEngine for DedicatedEngine {
    async fn list_databases(&self, ctx: EngineContext<'_>) -> Result<Vec<DatabaseInfo>> {
        let body = ctx.transport.get(&databases_path(ctx.config)?).await?;
        Ok(extract_array(&body, DEDICATED_DATABASE_ENVELOPES)
            .iter()
            .filter_map(parse_database)
            .collect())
    }

    async fn create_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        let payload = create_payload(name, options);
        let body = ctx
            .transport
            .post(&databases_path(ctx.config)?, &payload)
            .await?;

        // Some releases answer 200 with an empty body; fall back to what was sent
        Ok(parse_database(&body)
            .unwrap_or_else(|| database_from_payload(name, &payload)))
    }

    async fn update_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        let payload = update_payload(options)?;
        let body = ctx
            .transport
            .patch(&database_path(ctx.config, name)?, &payload)
            .await?;
        Ok(parse_database(&body)
            .unwrap_or_else(|| database_from_payload(name, &payload)))
    }

    async fn delete_database(&self, ctx: EngineContext<'_>, name: &str) -> Result<()> {
        ctx.transport
            .delete(&database_path(ctx.config, name)?)
            .await?;
        Ok(())
    }
}

/// Create payload with product defaults for omitted settings
#[must_use]
pub fn create_payload(name: &str, options: &DatabaseConfig) -> Value {
    json!({
        "name": name,
        "maxTables": options.max_tables.unwrap_or(DEFAULT_MAX_TABLES),
        "maxColumnsPerTable": options
            .max_columns_per_table
            .unwrap_or(DEFAULT_MAX_COLUMNS_PER_TABLE),
        "retentionPeriod": options
            .retention_period
            .unwrap_or(DEFAULT_RETENTION_PERIOD_NS),
    })
}

/// Partial update payload holding only the fields the caller provided
pub fn update_payload(options: &DatabaseConfig) -> Result<Value> {
    let mut patch = Map::new();
    if let Some(max_tables) = options.max_tables {
        patch.insert("maxTables".to_string(), json!(max_tables));
    }
    if let Some(max_columns) = options.max_columns_per_table {
        patch.insert("maxColumnsPerTable".to_string(), json!(max_columns));
    }
    if let Some(retention) = options.retention_period {
        patch.insert("retentionPeriod".to_string(), json!(retention));
    }

    if patch.is_empty() {
        return Err(InfluxError::invalid_input(
            "Nothing to update: provide at least one of max_tables, max_columns_per_table, \
             retention_period",
        ));
    }
    Ok(Value::Object(patch))
}

fn parse_database(item: &Value) -> Option<DatabaseInfo> {
    let name = str_field(item, "name")?;
    Some(DatabaseInfo {
        name,
        max_tables: u64_field(item, "maxTables"),
        max_columns_per_table: u64_field(item, "maxColumnsPerTable"),
        retention_period: u64_field(item, "retentionPeriod"),
        ..Default::default()
    })
}

fn database_from_payload(name: &str, payload: &Value) -> DatabaseInfo {
    DatabaseInfo {
        name: name.to_string(),
        max_tables: u64_field(payload, "maxTables"),
        max_columns_per_table: u64_field(payload, "maxColumnsPerTable"),
        retention_period: u64_field(payload, "retentionPeriod"),
        ..Default::default()
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[async_trait]
impl TokenEngine for DedicatedEngine {
    async fn list_tokens(&self, ctx: EngineContext<'_>) -> Result<Vec<TokenInfo>> {
        let path = format!("{}/tokens", cluster_path(ctx.config)?);
        let body = ctx.transport.get(&path).await?;
        Ok(extract_array(&body, DEDICATED_TOKEN_ENVELOPES)
            .iter()
            .filter_map(parse_token)
            .map(|token| TokenInfo {
                access_token: None,
                ..token
            })
            .collect())
    }

    async fn create_token(
        &self,
        ctx: EngineContext<'_>,
        request: &CreateTokenRequest,
    ) -> Result<TokenInfo> {
        let path = format!("{}/tokens", cluster_path(ctx.config)?);
        let body = ctx.transport.post(&path, &token_payload(request)).await?;
        parse_token(&body).ok_or_else(|| {
            InfluxError::from_status(
                200,
                "create token",
                Some("response did not contain a token id"),
            )
        })
    }

    async fn delete_token(&self, ctx: EngineContext<'_>, id: &str) -> Result<()> {
        let path = format!(
            "{}/tokens/{}",
            cluster_path(ctx.config)?,
            urlencoding::encode(id)
        );
        ctx.transport.delete(&path).await?;
        Ok(())
    }
}

/// Token create payload: one `{action, resource}` entry per permission
#[must_use]
pub fn token_payload(request: &CreateTokenRequest) -> Value {
    let permissions: Vec<Value> = request
        .permissions
        .iter()
        .map(|p| json!({ "action": p.action.as_str(), "resource": p.database }))
        .collect();
    json!({ "description": request.description, "permissions": permissions })
}

fn parse_token(item: &Value) -> Option<TokenInfo> {
    let id = str_field(item, "id")?;
    let permissions = item
        .get("permissions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|p| {
                    Some(TokenPermission {
                        action: TokenAction::parse(p.get("action")?.as_str()?)?,
                        database: str_field(p, "resource")?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(TokenInfo {
        id,
        description: str_field(item, "description"),
        permissions,
        created_at: str_field(item, "createdAt"),
        access_token: str_field(item, "accessToken"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_payload_applies_defaults() {
        let payload = create_payload("metrics", &DatabaseConfig::default());
        assert_eq!(
            payload,
            json!({
                "name": "metrics",
                "maxTables": 500,
                "maxColumnsPerTable": 200,
                "retentionPeriod": 0
            })
        );
    }

    #[test]
    fn test_create_payload_keeps_caller_values() {
        let options = DatabaseConfig {
            max_tables: Some(10),
            retention_period: Some(3_600_000_000_000),
            ..Default::default()
        };
        let payload = create_payload("metrics", &options);
        assert_eq!(payload["maxTables"], 10);
        assert_eq!(payload["maxColumnsPerTable"], 200);
        assert_eq!(payload["retentionPeriod"], 3_600_000_000_000_u64);
    }

    #[test]
    fn test_update_payload_is_partial() {
        let options = DatabaseConfig {
            max_columns_per_table: Some(250),
            ..Default::default()
        };
        assert_eq!(
            update_payload(&options).unwrap(),
            json!({"maxColumnsPerTable": 250})
        );
    }

    #[test]
    fn test_update_payload_empty_is_error() {
        // Description and schema type are not dedicated settings
        let options = DatabaseConfig {
            description: Some("ignored".to_string()),
            ..Default::default()
        };
        let err = update_payload(&options).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(err.message().contains("Nothing to update"));
    }

    #[test]
    fn test_paths_encode_names() {
        let config = ConnectionConfig::clustered("http://localhost:8086", "t", "c1", "a1", "m");
        assert_eq!(
            database_path(&config, "my db").unwrap(),
            "/api/v0/accounts/a1/clusters/c1/databases/my%20db"
        );
    }

    #[test]
    fn test_paths_need_account_and_cluster() {
        let config = ConnectionConfig::clustered("http://localhost:8086", "t", "c1", "", "m");
        let err = databases_path(&config).unwrap_err();
        assert!(err.message().contains("INFLUX_DB_ACCOUNT_ID"));
    }

    #[test]
    fn test_parse_database_fields() {
        let item = json!({
            "accountId": "a1",
            "clusterId": "c1",
            "name": "metrics",
            "maxTables": 500,
            "maxColumnsPerTable": 200,
            "retentionPeriod": 0
        });
        let info = parse_database(&item).unwrap();
        assert_eq!(info.name, "metrics");
        assert_eq!(info.max_tables, Some(500));
        assert_eq!(info.max_columns_per_table, Some(200));
        assert_eq!(info.retention_period, Some(0));
        assert_eq!(parse_database(&json!({"maxTables": 1})), None);
    }

    #[test]
    fn test_token_payload_and_parse() {
        let request = CreateTokenRequest {
            description: "ingest".to_string(),
            permissions: vec![TokenPermission {
                action: TokenAction::Write,
                database: "metrics".to_string(),
            }],
        };
        assert_eq!(
            token_payload(&request),
            json!({
                "description": "ingest",
                "permissions": [{"action": "write", "resource": "metrics"}]
            })
        );

        let token = parse_token(&json!({
            "id": "tok-1",
            "description": "ingest",
            "permissions": [
                {"action": "write", "resource": "metrics"},
                {"action": "admin", "resource": "*"}
            ],
            "createdAt": "2024-01-01T00:00:00Z",
            "accessToken": "apiv1_secret"
        }))
        .unwrap();
        assert_eq!(token.id, "tok-1");
        assert_eq!(token.permissions, request.permissions);
        assert_eq!(token.access_token.as_deref(), Some("apiv1_secret"));
    }
}
