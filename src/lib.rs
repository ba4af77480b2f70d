//! influxdb-mcp - Uniform Management Across InfluxDB Products
//!
//! One set of database, schema and token operations over five backends with different
//! authentication, host layout, payloads and capabilities: InfluxDB 3 Core, Enterprise,
//! Cloud Dedicated, Clustered and Cloud Serverless.
//!
//! # Core Principles
//! - Fail before the network: capability and allow-list checks run first
//! - One canonical result model, whatever the backend returns
//! - No caching and no retries: every lookup goes back to the backend
//! - Configuration is passed explicitly, never held globally
//! - JSON-only output for the CLI and MCP surfaces
//!
//! # Module Organization
//! - [`product`] - Product type registry (auth scheme, host rules, required fields)
//! - [`config`] - Connection configuration, endpoint resolution, saved profiles
//! - [`capability`] - Plane capability and operation allow-list checks
//! - [`transport`] - Authenticated HTTP/JSON client
//! - [`normalize`] - Flexible response envelope extraction
//! - [`engine`] - Canonical types and per-product strategies
//! - [`dispatch`] - Resource services (databases, schemas, tokens, health)
//! - [`error`] / [`output`] - Error taxonomy and JSON envelopes
//! - [`mcp`] - MCP server

pub mod capability;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod normalize;
pub mod output;
pub mod product;
pub mod transport;

pub use capability::{
    check_capabilities, has_data_capabilities, has_management_capabilities,
    validate_operation_support, CapabilityResult, Operation,
};
pub use config::{
    list_connections, resolve_connection, resolve_endpoints, save_connection, ConfigLocation,
    ConnectionConfig, ConnectionRegistry, ResolvedEndpoints, StoredConnection,
};
pub use dispatch::{DatabaseService, HealthService, SchemaService, TokenService};
pub use engine::{
    DatabaseConfig, DatabaseInfo, HealthStatus, SchemaColumn, SchemaInfo, TokenInfo,
};
pub use error::{InfluxError, Result};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use product::{Plane, ProductType};
pub use transport::HttpTransport;
