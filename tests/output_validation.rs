//! Output Validation Tests
//!
//! Validates that everything written to stdout conforms to the envelope contract:
//! - Success envelopes carry exactly `ok`, `product`, `command`, `data`, `meta`
//! - Error envelopes carry exactly `ok`, `product`, `command`, `error`
//! - Canonical results serialize to single-line JSON with no absent-field noise
//! - Every error variant maps to a stable code

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use influxdb_mcp::engine::{ColumnDataType, TokenAction, TokenPermission};
use influxdb_mcp::error::TransportErrorKind;
use influxdb_mcp::{
    DatabaseInfo, ErrorEnvelope, ErrorInfo, HealthStatus, InfluxError, Metadata, ProductType,
    SchemaColumn, SchemaInfo, SuccessEnvelope, TokenInfo,
};

fn keys(value: &Value) -> Vec<&str> {
    let mut keys: Vec<_> = value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

// ============================================================================
// Envelope Structure Tests
// ============================================================================

#[test]
fn test_success_envelope_structure() {
    let envelope = SuccessEnvelope::new(
        "clustered",
        "list_databases",
        vec![DatabaseInfo::named("metrics")],
        Metadata::with_items(42, 1),
    );

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(
        keys(&json_value),
        vec!["command", "data", "meta", "ok", "product"]
    );
    assert_eq!(json_value["ok"], true);
    assert_eq!(json_value["product"], "clustered");
    assert_eq!(json_value["command"], "list_databases");
    assert_eq!(json_value["data"], json!([{"name": "metrics"}]));
    assert_eq!(
        json_value["meta"],
        json!({"execution_ms": 42, "items_returned": 1})
    );
}

#[test]
fn test_error_envelope_structure() {
    let error = ErrorInfo::new("TEST_ERROR", "message");
    let envelope = ErrorEnvelope::new("core", "create_database", error);

    let json_value = serde_json::to_value(&envelope).expect("Should serialize");
    assert_eq!(keys(&json_value), vec!["command", "error", "ok", "product"]);
    assert_eq!(json_value["ok"], false);
    assert_eq!(keys(&json_value["error"]), vec!["code", "message"]);
}

#[test]
fn test_error_envelope_before_config_has_empty_product() {
    let err = InfluxError::configuration("INFLUX_DB_PRODUCT_TYPE is not set");
    let envelope = ErrorEnvelope::from_error("", "list_databases", &err);

    let json_value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json_value["product"], "");
    assert_eq!(json_value["error"]["code"], "CONFIG_ERROR");
}

// ============================================================================
// Canonical Model Serialization
// ============================================================================

#[test]
fn test_database_info_serializes_to_single_line() {
    let info = DatabaseInfo {
        retention_period: Some(86_400_000_000_000),
        bucket_id: Some("b1".to_string()),
        ..DatabaseInfo::named("metrics")
    };

    let json_str = serde_json::to_string(&info).unwrap();
    assert!(!json_str.contains('\n'));
    assert_eq!(
        serde_json::from_str::<Value>(&json_str).unwrap(),
        json!({
            "name": "metrics",
            "retention_period": 86_400_000_000_000_u64,
            "bucket_id": "b1"
        })
    );
}

#[test]
fn test_schema_info_uses_wire_column_casing() {
    let schema = SchemaInfo {
        id: Some("m1".to_string()),
        name: "cpu".to_string(),
        bucket_id: "b1".to_string(),
        bucket_name: "metrics".to_string(),
        columns: Some(vec![
            SchemaColumn::timestamp(),
            SchemaColumn::field("usage", ColumnDataType::Integer),
        ]),
        created_at: None,
        updated_at: None,
    };

    let json_value = serde_json::to_value(&schema).unwrap();
    assert_eq!(
        json_value["columns"],
        json!([
            {"name": "time", "type": "timestamp"},
            {"name": "usage", "type": "field", "data_type": "integer"}
        ])
    );
    assert!(json_value.get("created_at").is_none());
}

#[test]
fn test_token_info_omits_secret_when_absent() {
    let token = TokenInfo {
        id: "t1".to_string(),
        description: Some("reader".to_string()),
        permissions: vec![TokenPermission {
            action: TokenAction::Read,
            database: "metrics".to_string(),
        }],
        ..Default::default()
    };

    let json_value = serde_json::to_value(&token).unwrap();
    assert!(json_value.get("access_token").is_none());
    assert_eq!(
        json_value["permissions"],
        json!([{"action": "read", "database": "metrics"}])
    );
}

#[test]
fn test_health_status_product_is_kebab_case() {
    let status = HealthStatus {
        product: ProductType::CloudServerless,
        endpoint: "/health".to_string(),
        healthy: true,
        status: "pass".to_string(),
        version: None,
    };

    let json_value = serde_json::to_value(&status).unwrap();
    assert_eq!(json_value["product"], "cloud-serverless");
    assert!(json_value.get("version").is_none());
}

// ============================================================================
// Error Code Consistency Tests
// ============================================================================

#[test]
fn test_all_error_codes_are_consistent() {
    let valid_codes = [
        "CONFIG_ERROR",
        "UNSUPPORTED_OPERATION",
        "NOT_FOUND",
        "BACKEND_ERROR",
        "TRANSPORT_ERROR",
        "INVALID_INPUT",
    ];

    let errors = [
        InfluxError::configuration("missing url"),
        InfluxError::unsupported("no schemas here"),
        InfluxError::not_found("bucket"),
        InfluxError::from_status(409, "create database 'metrics'", None),
        InfluxError::transport(TransportErrorKind::Timeout, "timed out"),
        InfluxError::invalid_input("blank name"),
    ];

    let codes: Vec<_> = errors.iter().map(InfluxError::error_code).collect();
    assert_eq!(codes, valid_codes);
}

#[test]
fn test_from_status_404_is_not_found() {
    let err = InfluxError::from_status(404, "delete database 'x'", Some("not here"));
    assert_eq!(err.error_code(), "NOT_FOUND");
    assert!(err.message().contains("not here"));
}
