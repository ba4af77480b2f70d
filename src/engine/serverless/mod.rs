//! Cloud Serverless Engine
//!
//! Cloud Serverless calls databases "buckets" and addresses every resource by id, so most
//! operations begin with a lookup:
//! - bucket name to bucket id (`GET /api/v2/buckets?name=`)
//! - the token's organization (`GET /api/v2/orgs`, first entry)
//! - measurement name to measurement schema id
//!
//! None of these lookups are cached. Retention is stored by the backend in seconds inside a
//! `retentionRules` array and is converted to nanoseconds for the canonical model.
//!
//! Measurement schema operations exist only here, so they are inherent methods on
//! [`ServerlessEngine`] rather than part of a shared trait. Schema updates are additive on
//! the backend: callers send the complete column set and nothing is merged for them.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::engine::{
    CreateTokenRequest, DatabaseConfig, DatabaseEngine, DatabaseInfo, EngineContext, SchemaColumn,
    SchemaInfo, SchemaType, TokenAction, TokenEngine, TokenInfo, TokenPermission,
    DEFAULT_BUCKET_RETENTION_SECONDS, NANOS_PER_SECOND,
};
use crate::error::{InfluxError, Result};
use crate::normalize::{
    at_path, extract_array, str_field, u64_field, AUTHORIZATION_ENVELOPES, BUCKET_ENVELOPES,
    MEASUREMENT_SCHEMA_ENVELOPES, ORG_ENVELOPES,
};

const BUCKETS_PATH: &str = "/api/v2/buckets";
const ORGS_PATH: &str = "/api/v2/orgs";
const AUTHORIZATIONS_PATH: &str = "/api/v2/authorizations";

/// Cloud Serverless engine
pub struct ServerlessEngine;

// ============================================================================
// Retention conversion
// ============================================================================

/// Bucket retention seconds for a canonical nanosecond retention.
///
/// `None`, zero, and anything under one second mean the 30 day default.
#[must_use]
pub fn retention_seconds_from_nanos(nanos: Option<u64>) -> u64 {
    match nanos.map(|n| n / NANOS_PER_SECOND) {
        Some(seconds) if seconds > 0 => seconds,
        _ => DEFAULT_BUCKET_RETENTION_SECONDS,
    }
}

/// Canonical nanosecond retention for a bucket retention in seconds
#[must_use]
pub const fn retention_nanos_from_seconds(seconds: u64) -> u64 {
    seconds.saturating_mul(NANOS_PER_SECOND)
}

fn retention_rules(seconds: u64) -> Value {
    json!([{ "type": "expire", "everySeconds": seconds }])
}

/// Normalize one bucket into the canonical database model
#[must_use]
pub fn parse_bucket(item: &Value) -> Option<DatabaseInfo> {
    let name = str_field(item, "name")?;
    let retention_period = item
        .get("retentionRules")
        .and_then(Value::as_array)
        .and_then(|rules| rules.first())
        .and_then(|rule| u64_field(rule, "everySeconds"))
        .map(retention_nanos_from_seconds);

    Some(DatabaseInfo {
        name,
        retention_period,
        bucket_id: str_field(item, "id"),
        org_id: str_field(item, "orgID"),
        storage_type: str_field(item, "type"),
        schema_type: item
            .get("schemaType")
            .and_then(Value::as_str)
            .and_then(SchemaType::parse),
        description: str_field(item, "description"),
        ..Default::default()
    })
}

fn is_system_bucket(item: &Value) -> bool {
    item.get("type").and_then(Value::as_str) == Some("system")
}

/// Bucket create payload
#[must_use]
pub fn create_payload(org_id: &str, name: &str, options: &DatabaseConfig) -> Value {
    let mut payload = Map::new();
    payload.insert("orgID".to_string(), json!(org_id));
    payload.insert("name".to_string(), json!(name));
    payload.insert(
        "retentionRules".to_string(),
        retention_rules(retention_seconds_from_nanos(options.retention_period)),
    );
    if let Some(description) = &options.description {
        payload.insert("description".to_string(), json!(description));
    }
    if let Some(schema_type) = options.schema_type {
        payload.insert("schemaType".to_string(), json!(schema_type.as_str()));
    }
    Value::Object(payload)
}

/// Bucket patch payload. Always carries `retentionRules`: the caller's retention, else the
/// bucket's current rules, else the default.
#[must_use]
pub fn update_payload(existing: &Value, options: &DatabaseConfig) -> Value {
    let rules = match options.retention_period {
        Some(nanos) => retention_rules(retention_seconds_from_nanos(Some(nanos))),
        None => existing
            .get("retentionRules")
            .filter(|rules| rules.as_array().is_some_and(|r| !r.is_empty()))
            .cloned()
            .unwrap_or_else(|| retention_rules(DEFAULT_BUCKET_RETENTION_SECONDS)),
    };

    let mut payload = Map::new();
    payload.insert("retentionRules".to_string(), rules);
    if let Some(description) = &options.description {
        payload.insert("description".to_string(), json!(description));
    }
    Value::Object(payload)
}

// ============================================================================
// Lookups
// ============================================================================

impl ServerlessEngine {
    /// Fetch a bucket by exact name
    pub async fn find_bucket(&self, ctx: EngineContext<'_>, name: &str) -> Result<Value> {
        let body = ctx
            .transport
            .get_with_query(BUCKETS_PATH, &[("name", name)])
            .await?;
        extract_array(&body, BUCKET_ENVELOPES)
            .iter()
            .find(|bucket| bucket.get("name").and_then(Value::as_str) == Some(name))
            .cloned()
            .ok_or_else(|| InfluxError::not_found(format!("Bucket '{name}' does not exist")))
    }

    /// Resolve a bucket name to its id
    pub async fn find_bucket_id(&self, ctx: EngineContext<'_>, name: &str) -> Result<String> {
        let bucket = self.find_bucket(ctx, name).await?;
        str_field(&bucket, "id").ok_or_else(|| {
            InfluxError::not_found(format!("Bucket '{name}' was returned without an id"))
        })
    }

    /// Organization the token belongs to (first one listed)
    pub async fn find_org_id(&self, ctx: EngineContext<'_>) -> Result<String> {
        let body = ctx.transport.get(ORGS_PATH).await?;
        extract_array(&body, ORG_ENVELOPES)
            .iter()
            .find_map(|org| str_field(org, "id"))
            .ok_or_else(|| {
                InfluxError::not_found("No organization is visible to the configured token")
            })
    }
}

#[async_trait]
impl DatabaseEngine for ServerlessEngine {
    async fn list_databases(&self, ctx: EngineContext<'_>) -> Result<Vec<DatabaseInfo>> {
        let body = ctx.transport.get(BUCKETS_PATH).await?;
        Ok(extract_array(&body, BUCKET_ENVELOPES)
            .iter()
            .filter(|bucket| !is_system_bucket(bucket))
            .filter_map(parse_bucket)
            .collect())
    }

    async fn create_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        let org_id = self.find_org_id(ctx).await?;
        let payload = create_payload(&org_id, name, options);
        let body = ctx.transport.post(BUCKETS_PATH, &payload).await?;
        Ok(parse_bucket(&body).unwrap_or_else(|| DatabaseInfo {
            retention_period: Some(retention_nanos_from_seconds(retention_seconds_from_nanos(
                options.retention_period,
            ))),
            org_id: Some(org_id),
            description: options.description.clone(),
            schema_type: options.schema_type,
            ..DatabaseInfo::named(name)
        }))
    }

    async fn update_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        let bucket = self.find_bucket(ctx, name).await?;
        let id = str_field(&bucket, "id").ok_or_else(|| {
            InfluxError::not_found(format!("Bucket '{name}' was returned without an id"))
        })?;

        let payload = update_payload(&bucket, options);
        let path = format!("{BUCKETS_PATH}/{}", urlencoding::encode(&id));
        let body = ctx.transport.patch(&path, &payload).await?;

        let mut merged = bucket;
        if let (Value::Object(target), Value::Object(changes)) = (&mut merged, &payload) {
            target.extend(changes.clone());
        }
        Ok(parse_bucket(&body)
            .or_else(|| parse_bucket(&merged))
            .unwrap_or_else(|| DatabaseInfo::named(name)))
    }

    async fn delete_database(&self, ctx: EngineContext<'_>, name: &str) -> Result<()> {
        let id = self.find_bucket_id(ctx, name).await?;
        let path = format!("{BUCKETS_PATH}/{}", urlencoding::encode(&id));
        ctx.transport.delete(&path).await?;
        Ok(())
    }
}

// ============================================================================
// Measurement schemas
// ============================================================================

fn schemas_path(bucket_id: &str) -> String {
    format!(
        "{BUCKETS_PATH}/{}/schema/measurements",
        urlencoding::encode(bucket_id)
    )
}

/// Wire form of a column list (`dataType` casing)
#[must_use]
pub fn columns_payload(columns: &[SchemaColumn]) -> Value {
    Value::Array(
        columns
            .iter()
            .map(|column| {
                let mut entry = json!({
                    "name": column.name,
                    "type": column.column_type.as_str(),
                });
                if let Some(data_type) = column.data_type {
                    entry["dataType"] = json!(data_type.as_str());
                }
                entry
            })
            .collect(),
    )
}

/// Normalize one measurement schema
#[must_use]
pub fn parse_schema(item: &Value, bucket_id: &str, bucket_name: &str) -> Option<SchemaInfo> {
    let name = str_field(item, "name")?;
    let columns = item.get("columns").and_then(|raw| {
        serde_json::from_value::<Vec<SchemaColumn>>(raw.clone())
            .map_err(|e| {
                debug!(error = %e, schema = %name, "unreadable schema columns");
            })
            .ok()
    });

    Some(SchemaInfo {
        id: str_field(item, "id"),
        name,
        bucket_id: bucket_id.to_string(),
        bucket_name: bucket_name.to_string(),
        columns,
        created_at: str_field(item, "createdAt"),
        updated_at: str_field(item, "updatedAt"),
    })
}

impl ServerlessEngine {
    pub async fn list_schemas(
        &self,
        ctx: EngineContext<'_>,
        bucket: &str,
    ) -> Result<Vec<SchemaInfo>> {
        let bucket_id = self.find_bucket_id(ctx, bucket).await?;
        let body = ctx.transport.get(&schemas_path(&bucket_id)).await?;
        Ok(extract_array(&body, MEASUREMENT_SCHEMA_ENVELOPES)
            .iter()
            .filter_map(|item| parse_schema(item, &bucket_id, bucket))
            .collect())
    }

    /// Fetch one measurement schema by name
    pub async fn get_schema(
        &self,
        ctx: EngineContext<'_>,
        bucket: &str,
        measurement: &str,
    ) -> Result<SchemaInfo> {
        let bucket_id = self.find_bucket_id(ctx, bucket).await?;
        self.find_schema(ctx, &bucket_id, bucket, measurement).await
    }

    pub async fn create_schema(
        &self,
        ctx: EngineContext<'_>,
        bucket: &str,
        measurement: &str,
        columns: &[SchemaColumn],
    ) -> Result<SchemaInfo> {
        let bucket_id = self.find_bucket_id(ctx, bucket).await?;
        let payload = json!({ "name": measurement, "columns": columns_payload(columns) });
        let body = ctx
            .transport
            .post(&schemas_path(&bucket_id), &payload)
            .await?;
        Ok(parse_schema(&body, &bucket_id, bucket)
            .unwrap_or_else(|| schema_from_request(&bucket_id, bucket, measurement, columns)))
    }

    /// Replace a schema's column set. The backend only accepts additions, so `columns`
    /// must hold every existing column as well as the new ones.
    pub async fn update_schema(
        &self,
        ctx: EngineContext<'_>,
        bucket: &str,
        measurement: &str,
        columns: &[SchemaColumn],
    ) -> Result<SchemaInfo> {
        let bucket_id = self.find_bucket_id(ctx, bucket).await?;
        let existing = self.find_schema(ctx, &bucket_id, bucket, measurement).await?;
        let schema_id = existing.id.ok_or_else(|| {
            InfluxError::not_found(format!(
                "Measurement schema '{measurement}' in bucket '{bucket}' has no id"
            ))
        })?;

        let path = format!(
            "{}/{}",
            schemas_path(&bucket_id),
            urlencoding::encode(&schema_id)
        );
        let payload = json!({ "columns": columns_payload(columns) });
        let body = ctx.transport.patch(&path, &payload).await?;
        Ok(parse_schema(&body, &bucket_id, bucket).unwrap_or_else(|| SchemaInfo {
            id: Some(schema_id),
            ..schema_from_request(&bucket_id, bucket, measurement, columns)
        }))
    }

    async fn find_schema(
        &self,
        ctx: EngineContext<'_>,
        bucket_id: &str,
        bucket: &str,
        measurement: &str,
    ) -> Result<SchemaInfo> {
        let body = ctx
            .transport
            .get_with_query(&schemas_path(bucket_id), &[("name", measurement)])
            .await?;
        extract_array(&body, MEASUREMENT_SCHEMA_ENVELOPES)
            .iter()
            .filter(|item| item.get("name").and_then(Value::as_str) == Some(measurement))
            .find_map(|item| parse_schema(item, bucket_id, bucket))
            .ok_or_else(|| {
                InfluxError::not_found(format!(
                    "Measurement schema '{measurement}' does not exist in bucket '{bucket}'"
                ))
            })
    }
}

fn schema_from_request(
    bucket_id: &str,
    bucket: &str,
    measurement: &str,
    columns: &[SchemaColumn],
) -> SchemaInfo {
    SchemaInfo {
        id: None,
        name: measurement.to_string(),
        bucket_id: bucket_id.to_string(),
        bucket_name: bucket.to_string(),
        columns: Some(columns.to_vec()),
        created_at: None,
        updated_at: None,
    }
}

// ============================================================================
// Authorizations
// ============================================================================

#[async_trait]
impl TokenEngine for ServerlessEngine {
    async fn list_tokens(&self, ctx: EngineContext<'_>) -> Result<Vec<TokenInfo>> {
        let body = ctx.transport.get(AUTHORIZATIONS_PATH).await?;
        Ok(extract_array(&body, AUTHORIZATION_ENVELOPES)
            .iter()
            .filter_map(parse_authorization)
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
        let org_id = self.find_org_id(ctx).await?;

        let mut permissions = Vec::with_capacity(request.permissions.len());
        for permission in &request.permissions {
            let bucket_id = self.find_bucket_id(ctx, &permission.database).await?;
            permissions.push(json!({
                "action": permission.action.as_str(),
                "resource": { "type": "buckets", "id": bucket_id, "orgID": org_id },
            }));
        }

        let payload = json!({
            "orgID": org_id,
            "description": request.description,
            "permissions": permissions,
        });
        let body = ctx.transport.post(AUTHORIZATIONS_PATH, &payload).await?;

        let mut token = parse_authorization(&body).ok_or_else(|| {
            InfluxError::from_status(
                200,
                "create token",
                Some("response did not contain an id"),
            )
        })?;
        // The response names buckets by id only; report the names the caller used
        token.permissions = request.permissions.clone();
        Ok(token)
    }

    async fn delete_token(&self, ctx: EngineContext<'_>, id: &str) -> Result<()> {
        let path = format!("{AUTHORIZATIONS_PATH}/{}", urlencoding::encode(id));
        ctx.transport.delete(&path).await?;
        Ok(())
    }
}

/// Normalize one authorization. Bucket permissions are named by bucket name when the
/// backend includes it, otherwise by bucket id.
#[must_use]
pub fn parse_authorization(item: &Value) -> Option<TokenInfo> {
    let id = str_field(item, "id")?;
    let permissions = item
        .get("permissions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|p| {
                    at_path(p, &["resource", "type"]).and_then(Value::as_str) == Some("buckets")
                })
                .filter_map(|p| {
                    let resource = p.get("resource")?;
                    Some(TokenPermission {
                        action: TokenAction::parse(p.get("action")?.as_str()?)?,
                        database: str_field(resource, "name")
                            .or_else(|| str_field(resource, "id"))
                            .unwrap_or_default(),
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
        access_token: str_field(item, "token"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ColumnDataType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retention_round_trip_one_day() {
        let one_day = 86_400_000_000_000;
        assert_eq!(retention_seconds_from_nanos(Some(one_day)), 86_400);
        assert_eq!(retention_nanos_from_seconds(86_400), one_day);

        let bucket = json!({
            "name": "a",
            "retentionRules": [{"type": "expire", "everySeconds": 86400}]
        });
        let info = parse_bucket(&bucket).unwrap();
        assert_eq!(info.retention_period, Some(one_day));
        assert_eq!(retention_seconds_from_nanos(info.retention_period), 86_400);
    }

    #[test]
    fn test_retention_defaults_to_thirty_days() {
        assert_eq!(retention_seconds_from_nanos(None), 2_592_000);
        assert_eq!(retention_seconds_from_nanos(Some(0)), 2_592_000);
        assert_eq!(retention_seconds_from_nanos(Some(999)), 2_592_000);
    }

    #[test]
    fn test_parse_bucket_metadata() {
        let bucket = json!({
            "id": "b1",
            "orgID": "o1",
            "type": "user",
            "name": "metrics",
            "description": "prod",
            "schemaType": "explicit",
            "retentionRules": []
        });
        let info = parse_bucket(&bucket).unwrap();
        assert_eq!(info.bucket_id.as_deref(), Some("b1"));
        assert_eq!(info.org_id.as_deref(), Some("o1"));
        assert_eq!(info.storage_type.as_deref(), Some("user"));
        assert_eq!(info.schema_type, Some(SchemaType::Explicit));
        assert_eq!(info.retention_period, None);
    }

    #[test]
    fn test_system_bucket_detection() {
        assert!(is_system_bucket(&json!({"name": "_monitoring", "type": "system"})));
        assert!(!is_system_bucket(&json!({"name": "a", "type": "user"})));
        assert!(!is_system_bucket(&json!({"name": "a"})));
    }

    #[test]
    fn test_create_payload() {
        let options = DatabaseConfig {
            retention_period: Some(86_400_000_000_000),
            schema_type: Some(SchemaType::Explicit),
            ..Default::default()
        };
        assert_eq!(
            create_payload("o1", "metrics", &options),
            json!({
                "orgID": "o1",
                "name": "metrics",
                "retentionRules": [{"type": "expire", "everySeconds": 86400}],
                "schemaType": "explicit"
            })
        );
    }

    #[test]
    fn test_update_payload_falls_back_to_existing_rules() {
        let existing = json!({
            "retentionRules": [{
                "type": "expire",
                "everySeconds": 3600,
                "shardGroupDurationSeconds": 3600
            }]
        });
        let payload = update_payload(&existing, &DatabaseConfig::default());
        assert_eq!(payload["retentionRules"], existing["retentionRules"]);
    }

    #[test]
    fn test_update_payload_falls_back_to_default() {
        let existing = json!({"retentionRules": []});
        let payload = update_payload(&existing, &DatabaseConfig::default());
        assert_eq!(
            payload,
            json!({"retentionRules": [{"type": "expire", "everySeconds": 2_592_000}]})
        );
    }

    #[test]
    fn test_update_payload_uses_caller_retention() {
        let existing = json!({"retentionRules": [{"type": "expire", "everySeconds": 3600}]});
        let options = DatabaseConfig {
            retention_period: Some(7_200_000_000_000),
            description: Some("hot".to_string()),
            ..Default::default()
        };
        assert_eq!(
            update_payload(&existing, &options),
            json!({
                "retentionRules": [{"type": "expire", "everySeconds": 7200}],
                "description": "hot"
            })
        );
    }

    #[test]
    fn test_columns_payload_uses_wire_casing() {
        let columns = vec![
            SchemaColumn::timestamp(),
            SchemaColumn::tag("host"),
            SchemaColumn::field("usage", ColumnDataType::Float),
        ];
        assert_eq!(
            columns_payload(&columns),
            json!([
                {"name": "time", "type": "timestamp"},
                {"name": "host", "type": "tag"},
                {"name": "usage", "type": "field", "dataType": "float"}
            ])
        );
    }

    #[test]
    fn test_parse_schema() {
        let item = json!({
            "id": "m1",
            "name": "cpu",
            "columns": [
                {"name": "time", "type": "timestamp"},
                {"name": "usage", "type": "field", "dataType": "float"}
            ],
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let schema = parse_schema(&item, "b1", "metrics").unwrap();
        assert_eq!(schema.id.as_deref(), Some("m1"));
        assert_eq!(schema.bucket_name, "metrics");
        assert_eq!(schema.columns.unwrap().len(), 2);
        assert_eq!(schema.updated_at, None);
    }

    #[test]
    fn test_parse_authorization_keeps_bucket_permissions() {
        let item = json!({
            "id": "auth1",
            "token": "secret",
            "description": "ingest",
            "permissions": [
                {"action": "write", "resource": {"type": "buckets", "id": "b1", "name": "metrics"}},
                {"action": "read", "resource": {"type": "buckets", "id": "b2"}},
                {"action": "read", "resource": {"type": "orgs", "id": "o1"}}
            ]
        });
        let token = parse_authorization(&item).unwrap();
        assert_eq!(
            token.permissions,
            vec![
                TokenPermission {
                    action: TokenAction::Write,
                    database: "metrics".to_string(),
                },
                TokenPermission {
                    action: TokenAction::Read,
                    database: "b2".to_string(),
                },
            ]
        );
        assert_eq!(token.access_token.as_deref(), Some("secret"));
    }
}
