//! MCP (Model Context Protocol) Server
//!
//! Manual JSON-RPC 2.0 over stdio, one request per line and one response per line.
//! The only dependencies are `serde_json`, `schemars` for tool input schemas, and `anyhow`
//! for protocol-level failures.
//!
//! # Design Principles
//!
//! 1. **Stateless**: each tool call resolves its configuration and builds its own transport
//! 2. **Thin**: tools only parse arguments and call the dispatch services
//! 3. **Structured failures**: an operation that fails returns an `isError` tool result
//!    holding an [`ErrorEnvelope`]; JSON-RPC errors are reserved for protocol problems
//!
//! # MCP Tools
//!
//! - `list_databases`, `create_database`, `update_database`, `delete_database`
//! - `list_measurement_schemas`, `get_measurement_schema`, `create_measurement_schema`,
//!   `update_measurement_schema`
//! - `list_tokens`, `create_token`, `delete_token`
//! - `health_check`
//!
//! Every tool accepts an optional `connection` naming a saved profile. Without it, the
//! configuration the server was started with is used.
//!
//! # Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "influxdb": {
//!       "command": "influxdb-mcp",
//!       "args": ["mcp"],
//!       "env": {
//!         "INFLUX_DB_PRODUCT_TYPE": "core",
//!         "INFLUX_DB_INSTANCE_URL": "http://localhost:8181"
//!       }
//!     }
//!   }
//! }
//! ```

use anyhow::{anyhow, Result};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::debug;

use crate::config::{resolve_connection, ConnectionConfig};
use crate::dispatch::{DatabaseService, HealthService, SchemaService, TokenService};
use crate::engine::{CreateTokenRequest, DatabaseConfig, SchemaColumn};
use crate::error::InfluxError;
use crate::output::{ErrorEnvelope, Metadata, SuccessEnvelope};

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn failure(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

// ============================================================================
// MCP Tool Result Structures
// ============================================================================

#[derive(Debug, Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

/// MCP tool call result
#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<TextContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl CallToolResult {
    fn render(data: &impl Serialize, is_error: bool) -> Result<Value> {
        let text = serde_json::to_string_pretty(data)?;
        let result = Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        };
        Ok(serde_json::to_value(result)?)
    }

    fn success<T: Serialize>(envelope: &SuccessEnvelope<T>) -> Result<Value> {
        Self::render(envelope, false)
    }

    fn error(envelope: &ErrorEnvelope) -> Result<Value> {
        Self::render(envelope, true)
    }
}

// ============================================================================
// Tool Arguments
// ============================================================================

/// Arguments for tools that only need a connection
#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ConnectionArgs {
    /// Saved connection profile to use instead of the server's configuration
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DatabaseArgs {
    /// Saved connection profile to use instead of the server's configuration
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Database (bucket) name
    name: String,
    #[serde(flatten)]
    options: DatabaseConfig,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteDatabaseArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Database (bucket) name
    name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct BucketArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Bucket name
    bucket: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MeasurementArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Bucket name
    bucket: String,
    /// Measurement name
    measurement: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SchemaColumnsArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Bucket name
    bucket: String,
    /// Measurement name
    measurement: String,
    /// Complete column set. On update, include every existing column as well.
    columns: Vec<SchemaColumn>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateTokenArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    #[serde(flatten)]
    request: CreateTokenRequest,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteTokenArgs {
    #[serde(default)]
    #[allow(dead_code)]
    connection: Option<String>,
    /// Token (authorization) id
    id: String,
}

fn tool<T: JsonSchema>(name: &str, description: &str) -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
        map.entry("type").or_insert_with(|| json!("object"));
    }
    json!({
        "name": name,
        "description": description,
        "inputSchema": schema,
    })
}

fn tool_definitions() -> Vec<Value> {
    vec![
        tool::<ConnectionArgs>(
            "list_databases",
            "List user databases. On Cloud Serverless these are buckets; system buckets are \
             excluded. Retention is reported in nanoseconds.",
        ),
        tool::<DatabaseArgs>(
            "create_database",
            "Create a database. Cloud Dedicated and Clustered default to max_tables=500, \
             max_columns_per_table=200, retention_period=0 (infinite). Cloud Serverless \
             defaults to 30 days of retention. retention_period is in nanoseconds.",
        ),
        tool::<DatabaseArgs>(
            "update_database",
            "Update database settings. Not available on Core or Enterprise. Only the provided \
             fields are changed.",
        ),
        tool::<DeleteDatabaseArgs>(
            "delete_database",
            "Delete a database and all of its data. This cannot be undone.",
        ),
        tool::<BucketArgs>(
            "list_measurement_schemas",
            "List explicit measurement schemas of a bucket. Cloud Serverless only.",
        ),
        tool::<MeasurementArgs>(
            "get_measurement_schema",
            "Get one measurement schema by name. Cloud Serverless only.",
        ),
        tool::<SchemaColumnsArgs>(
            "create_measurement_schema",
            "Create a measurement schema in a bucket created with schema_type=explicit. \
             Field columns need a dataType; tag and timestamp columns must not have one. \
             Cloud Serverless only.",
        ),
        tool::<SchemaColumnsArgs>(
            "update_measurement_schema",
            "Add columns to a measurement schema. Columns can only be added, so send the \
             complete existing column set plus the new columns. Cloud Serverless only.",
        ),
        tool::<ConnectionArgs>(
            "list_tokens",
            "List database tokens. Cloud Dedicated and Cloud Serverless only.",
        ),
        tool::<CreateTokenArgs>(
            "create_token",
            "Create a database token with read and/or write permissions on named databases. \
             The secret is returned only once. Cloud Dedicated and Cloud Serverless only.",
        ),
        tool::<DeleteTokenArgs>(
            "delete_token",
            "Delete a database token by id. Cloud Dedicated and Cloud Serverless only.",
        ),
        tool::<ConnectionArgs>(
            "health_check",
            "Check the data plane host (/health or /ping) and report whether it is healthy.",
        ),
    ]
}

// ============================================================================
// MCP Server
// ============================================================================

/// Run the MCP server loop on stdin/stdout until stdin closes
///
/// # Errors
///
/// Returns an error if stdio communication fails.
#[allow(clippy::future_not_send)]
pub async fn serve(config: ConnectionConfig) -> Result<()> {
    let stdin = io::stdin();
    let reader = stdin.lock();
    let mut stdout = io::stdout();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => match handle_request(&config, request).await {
                Some(response) => response,
                None => continue,
            },
            Err(e) => JsonRpcResponse::failure(None, -32700, format!("Parse error: {e}")),
        };

        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }

    Ok(())
}

/// Answer one request. Notifications (no `id`, `notifications/*`) get no response.
async fn handle_request(
    config: &ConnectionConfig,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    debug!(method = %request.method, "mcp request");
    if request.id.is_none() && request.method.starts_with("notifications/") {
        return None;
    }

    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize()),
        "tools/list" => Ok(json!({ "tools": tool_definitions() })),
        "tools/call" => handle_call_tool(config, request.params).await,
        _ => Err(anyhow!("Unknown method: {}", request.method)),
    };

    Some(match result {
        Ok(value) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: Some(value),
            error: None,
        },
        Err(e) => JsonRpcResponse::failure(request.id, -32603, e.to_string()),
    })
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "influxdb-mcp",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

async fn handle_call_tool(config: &ConnectionConfig, params: Option<Value>) -> Result<Value> {
    let params = params.ok_or_else(|| anyhow!("Missing params"))?;
    let name = params["name"].as_str().ok_or_else(|| anyhow!("Missing tool name"))?;
    if !tool_definitions().iter().any(|t| t["name"] == name) {
        return Err(anyhow!("Unknown tool: {name}"));
    }
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let config = match arguments.get("connection").and_then(Value::as_str) {
        Some(connection) => match resolve_connection(Some(connection)) {
            Ok(resolved) => resolved,
            Err(e) => return CallToolResult::error(&ErrorEnvelope::from_error("", name, &e)),
        },
        None => config.clone(),
    };
    let product = config.product.as_str();

    let start = Instant::now();
    match call_tool(&config, name, arguments).await {
        Ok((data, items)) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = items.map_or_else(
                || Metadata::new(elapsed),
                |count| Metadata::with_items(elapsed, count),
            );
            CallToolResult::success(&SuccessEnvelope::new(product, name, data, meta))
        }
        Err(e) => CallToolResult::error(&ErrorEnvelope::from_error(product, name, &e)),
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> crate::Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| InfluxError::invalid_input(format!("Invalid arguments for '{tool}': {e}")))
}

fn to_data(value: impl Serialize) -> crate::Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| InfluxError::invalid_input(format!("Could not serialize result: {e}")))
}

/// Run one tool; returns the payload and, for list tools, the item count
async fn call_tool(
    config: &ConnectionConfig,
    name: &str,
    arguments: Value,
) -> crate::Result<(Value, Option<usize>)> {
    match name {
        "list_databases" => {
            let databases = DatabaseService::new(config).list().await?;
            let count = databases.len();
            Ok((to_data(databases)?, Some(count)))
        }
        "create_database" => {
            let args: DatabaseArgs = parse_args(name, arguments)?;
            let database = DatabaseService::new(config)
                .create(&args.name, &args.options)
                .await?;
            Ok((to_data(database)?, None))
        }
        "update_database" => {
            let args: DatabaseArgs = parse_args(name, arguments)?;
            let database = DatabaseService::new(config)
                .update(&args.name, &args.options)
                .await?;
            Ok((to_data(database)?, None))
        }
        "delete_database" => {
            let args: DeleteDatabaseArgs = parse_args(name, arguments)?;
            DatabaseService::new(config).delete(&args.name).await?;
            Ok((json!({ "deleted": args.name }), None))
        }
        "list_measurement_schemas" => {
            let args: BucketArgs = parse_args(name, arguments)?;
            let schemas = SchemaService::new(config).list(&args.bucket).await?;
            let count = schemas.len();
            Ok((to_data(schemas)?, Some(count)))
        }
        "get_measurement_schema" => {
            let args: MeasurementArgs = parse_args(name, arguments)?;
            let schema = SchemaService::new(config)
                .get(&args.bucket, &args.measurement)
                .await?;
            Ok((to_data(schema)?, None))
        }
        "create_measurement_schema" => {
            let args: SchemaColumnsArgs = parse_args(name, arguments)?;
            let schema = SchemaService::new(config)
                .create(&args.bucket, &args.measurement, &args.columns)
                .await?;
            Ok((to_data(schema)?, None))
        }
        "update_measurement_schema" => {
            let args: SchemaColumnsArgs = parse_args(name, arguments)?;
            let schema = SchemaService::new(config)
                .update(&args.bucket, &args.measurement, &args.columns)
                .await?;
            Ok((to_data(schema)?, None))
        }
        "list_tokens" => {
            let tokens = TokenService::new(config).list().await?;
            let count = tokens.len();
            Ok((to_data(tokens)?, Some(count)))
        }
        "create_token" => {
            let args: CreateTokenArgs = parse_args(name, arguments)?;
            let token = TokenService::new(config).create(&args.request).await?;
            Ok((to_data(token)?, None))
        }
        "delete_token" => {
            let args: DeleteTokenArgs = parse_args(name, arguments)?;
            TokenService::new(config).delete(&args.id).await?;
            Ok((json!({ "deleted": args.id }), None))
        }
        "health_check" => {
            let status = HealthService::new(config).check().await?;
            Ok((to_data(status)?, None))
        }
        other => Err(InfluxError::invalid_input(format!("Unknown tool: {other}"))),
    }
}
