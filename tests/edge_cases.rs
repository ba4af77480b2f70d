//! Edge Case Testing
//!
//! Failure paths and boundary conditions across the dispatch layer:
//! - HTTP status classification (401, 403, 404, 409, 500, anything else)
//! - Connection-level failures (refused, timeout, closed mid-response)
//! - Configuration and allow-list gates that must fail before any request is sent
//! - Caller input rejected before any request is sent

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use influxdb_mcp::engine::{ColumnType, CreateTokenRequest, TokenAction, TokenPermission};
use influxdb_mcp::error::{BackendErrorKind, TransportErrorKind};
use influxdb_mcp::{
    ConnectionConfig, DatabaseConfig, DatabaseService, HealthService, InfluxError, ProductType,
    SchemaColumn, SchemaService, TokenService,
};

/// A mock that fails the test if any request at all reaches the server
async fn silent_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    server
}

async fn core_list_with_status(status: u16, body: serde_json::Value) -> InfluxError {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/configure/database"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;

    let config = ConnectionConfig::core(server.uri(), "t");
    DatabaseService::new(&config).list().await.unwrap_err()
}

// ============================================================================
// HTTP status classification
// ============================================================================

#[tokio::test]
async fn test_unauthorized_status() {
    let err = core_list_with_status(401, json!({"error": "token expired"})).await;
    match &err {
        InfluxError::Backend { status, kind, .. } => {
            assert_eq!(*status, 401);
            assert_eq!(*kind, BackendErrorKind::Unauthorized);
        }
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(err.error_code(), "BACKEND_ERROR");
    assert!(err.message().contains("token expired"));
}

#[tokio::test]
async fn test_forbidden_status() {
    let err = core_list_with_status(403, json!({"message": "insufficient permissions"})).await;
    assert!(matches!(
        err,
        InfluxError::Backend {
            kind: BackendErrorKind::Forbidden,
            ..
        }
    ));
}

#[tokio::test]
async fn test_conflict_status_on_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/configure/database"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "database already exists"})),
        )
        .mount(&server)
        .await;

    let config = ConnectionConfig::enterprise(server.uri(), "t");
    let err = DatabaseService::new(&config)
        .create("metrics", &DatabaseConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InfluxError::Backend {
            status: 409,
            kind: BackendErrorKind::Conflict,
            ..
        }
    ));
    assert!(err.message().contains("already exists"));
}

#[tokio::test]
async fn test_server_error_status() {
    let err = core_list_with_status(500, json!({"error": "boom"})).await;
    assert!(matches!(
        err,
        InfluxError::Backend {
            kind: BackendErrorKind::ServerError,
            ..
        }
    ));
}

#[tokio::test]
async fn test_not_found_status() {
    let err = core_list_with_status(404, json!({})).await;
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_other_status_passes_server_message_through() {
    let err = core_list_with_status(422, json!({"message": "unprocessable name"})).await;
    assert!(matches!(
        err,
        InfluxError::Backend {
            status: 422,
            kind: BackendErrorKind::Other,
            ..
        }
    ));
    assert!(err.message().contains("unprocessable name"));
}

#[tokio::test]
async fn test_error_message_never_contains_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = ConnectionConfig::cloud_serverless(server.uri(), "very-secret-token");
    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert!(!err.message().contains("very-secret-token"));
}

// ============================================================================
// Transport failures
// ============================================================================

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = ConnectionConfig::core(format!("http://127.0.0.1:{port}"), "t");
    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
    assert!(
        err.is_transport(TransportErrorKind::ConnectionRefused),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/configure/database"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut config = ConnectionConfig::core(server.uri(), "t");
    config.timeout_ms = Some(50);
    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert!(err.is_transport(TransportErrorKind::Timeout), "got {err:?}");
}

/// Serve one connection: read the request head, write `reply` verbatim, then close
async fn one_shot_server(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket.write_all(reply).await.unwrap();
        socket.shutdown().await.ok();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_delete_closed_after_success_status_is_success() {
    let url = one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\n{\"ok\"").await;

    let config = ConnectionConfig::core(url, "t");
    DatabaseService::new(&config)
        .delete("metrics")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_closed_before_any_status_fails() {
    let url = one_shot_server(b"").await;

    let config = ConnectionConfig::core(url, "t");
    let err = DatabaseService::new(&config)
        .delete("metrics")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
}

#[tokio::test]
async fn test_list_truncated_body_fails() {
    let url = one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\n[\"a\"").await;

    let config = ConnectionConfig::core(url, "t");
    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
}

// ============================================================================
// Gates that fail before the network
// ============================================================================

#[tokio::test]
async fn test_missing_token_fails_before_request() {
    let server = silent_server().await;
    let mut config = ConnectionConfig::core(server.uri(), "t");
    config.token = Some("   ".to_string());

    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(err.message().contains("INFLUX_DB_TOKEN"));
}

#[tokio::test]
async fn test_clustered_without_management_token_fails_before_request() {
    let server = silent_server().await;
    let mut config = ConnectionConfig::clustered(server.uri(), "t", "c", "a", "m");
    config.management_token = None;

    let err = DatabaseService::new(&config).list().await.unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(err.message().contains("INFLUX_DB_MANAGEMENT_TOKEN"));
}

#[tokio::test]
async fn test_core_update_is_unsupported() {
    let server = silent_server().await;
    let config = ConnectionConfig::core(server.uri(), "t");
    let options = DatabaseConfig {
        max_tables: Some(5),
        ..Default::default()
    };

    let err = DatabaseService::new(&config)
        .update("metrics", &options)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
    assert!(err.message().contains("update_database"));
    assert!(err.message().contains("cloud-serverless"));
}

#[tokio::test]
async fn test_schemas_unsupported_outside_serverless() {
    let server = silent_server().await;
    for config in [
        ConnectionConfig::core(server.uri(), "t"),
        ConnectionConfig::enterprise(server.uri(), "t"),
        ConnectionConfig::clustered(server.uri(), "t", "c", "a", "m"),
    ] {
        let err = SchemaService::new(&config)
            .list("metrics")
            .await
            .unwrap_err();
        assert_eq!(
            err.error_code(),
            "UNSUPPORTED_OPERATION",
            "{}",
            config.product
        );
    }
}

#[tokio::test]
async fn test_tokens_unsupported_for_self_hosted() {
    let server = silent_server().await;
    for config in [
        ConnectionConfig::core(server.uri(), "t"),
        ConnectionConfig::clustered(server.uri(), "t", "c", "a", "m"),
    ] {
        let err = TokenService::new(&config).list().await.unwrap_err();
        assert_eq!(
            err.error_code(),
            "UNSUPPORTED_OPERATION",
            "{}",
            config.product
        );
    }
}

#[tokio::test]
async fn test_capability_gate_runs_before_allow_list() {
    // Core never supports schemas, but with nothing configured the missing fields are
    // reported first
    let err = SchemaService::new(&ConnectionConfig::new(ProductType::Core))
        .get("b", "m")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(err.message().contains("INFLUX_DB_INSTANCE_URL"));

    // Once the plane is reachable the allow-list decides
    let config = ConnectionConfig::core("http://127.0.0.1:1", "t");
    let err = SchemaService::new(&config).get("b", "m").await.unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
}

// ============================================================================
// Caller input
// ============================================================================

#[tokio::test]
async fn test_blank_database_name_rejected() {
    let server = silent_server().await;
    let config = ConnectionConfig::cloud_serverless(server.uri(), "t");
    let service = DatabaseService::new(&config);

    let err = service.create("  ", &DatabaseConfig::default()).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
    let err = service.delete("").await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_invalid_columns_rejected_before_bucket_lookup() {
    let server = silent_server().await;
    let config = ConnectionConfig::cloud_serverless(server.uri(), "t");
    let service = SchemaService::new(&config);

    let err = service.create("metrics", "cpu", &[]).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");

    let field_without_type = SchemaColumn {
        name: "usage".to_string(),
        column_type: ColumnType::Field,
        data_type: None,
    };
    let err = service
        .update("metrics", "cpu", &[field_without_type])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
    assert!(err.message().contains("usage"));

    let duplicate = vec![SchemaColumn::tag("host"), SchemaColumn::tag("host")];
    let err = service.create("metrics", "cpu", &duplicate).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_token_request_without_permissions_rejected() {
    let server = silent_server().await;
    let config = ConnectionConfig::cloud_serverless(server.uri(), "t");
    let service = TokenService::new(&config);

    let empty = CreateTokenRequest {
        description: "reader".to_string(),
        permissions: vec![],
    };
    let err = service.create(&empty).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");

    let blank_description = CreateTokenRequest {
        description: " ".to_string(),
        permissions: vec![TokenPermission {
            action: TokenAction::Write,
            database: "metrics".to_string(),
        }],
    };
    let err = service.create(&blank_description).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_failing_status_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "fail"})))
        .mount(&server)
        .await;

    let config = ConnectionConfig::cloud_serverless(server.uri(), "t");
    let status = HealthService::new(&config).check().await.unwrap();
    assert!(!status.healthy);
    assert_eq!(status.status, "fail");
}

#[tokio::test]
async fn test_health_fallback_only_on_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let config = ConnectionConfig::enterprise(server.uri(), "t");
    let err = HealthService::new(&config).check().await.unwrap_err();
    assert_eq!(err.error_code(), "BACKEND_ERROR");
}

#[tokio::test]
async fn test_health_text_ping_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    let config = ConnectionConfig::core(server.uri(), "t");
    let status = HealthService::new(&config).check().await.unwrap();
    assert!(status.healthy);
    assert_eq!(status.status, "OK");
    assert_eq!(status.version, None);
}
