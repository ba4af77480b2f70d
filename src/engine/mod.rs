//! Backend Engines and Canonical Types
//!
//! This module defines the canonical result model and the per-product strategy traits.
//! Each backend family implements [`DatabaseEngine`] (and [`TokenEngine`] where the
//! product manages tokens through an API):
//! - [`core_enterprise`]: InfluxDB 3 Core and Enterprise (`/api/v3/configure/...`)
//! - [`dedicated`]: Cloud Dedicated and Clustered (`/api/v0/accounts/.../clusters/...`)
//! - [`serverless`]: Cloud Serverless (`/api/v2/buckets`, `/api/v2/orgs`, schemas)
//!
//! # Stateless Design
//! Engines are zero-sized and hold nothing between calls. Every canonical value is
//! rebuilt from a backend response and handed to the caller; nothing is cached, so
//! every name-to-id lookup goes back to the backend.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::error::{InfluxError, Result};
use crate::product::ProductType;
use crate::transport::HttpTransport;

pub mod core_enterprise;
pub mod dedicated;
pub mod serverless;

/// Nanoseconds in one second
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Bucket retention applied when the caller gives none (30 days)
pub const DEFAULT_BUCKET_RETENTION_SECONDS: u64 = 2_592_000;

/// Cloud Dedicated defaults applied on create when the caller omits a field
pub const DEFAULT_MAX_TABLES: u64 = 500;
pub const DEFAULT_MAX_COLUMNS_PER_TABLE: u64 = 200;
pub const DEFAULT_RETENTION_PERIOD_NS: u64 = 0;

/// Bucket schema enforcement mode (Cloud Serverless)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Implicit,
    Explicit,
}

impl SchemaType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Implicit => "implicit",
            Self::Explicit => "explicit",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "implicit" => Some(Self::Implicit),
            "explicit" => Some(Self::Explicit),
            _ => None,
        }
    }
}

/// Canonical database description, whatever the backend calls it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database (or bucket) name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tables: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_columns_per_table: Option<u64>,

    /// Retention in nanoseconds, whatever unit the backend uses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<u64>,

    /// Bucket id (Cloud Serverless)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<String>,

    /// Organization id (Cloud Serverless)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Bucket type reported by the backend (`user` or `system`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DatabaseInfo {
    /// A database known only by name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Optional settings for create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseConfig {
    /// Maximum tables (Cloud Dedicated / Clustered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tables: Option<u64>,

    /// Maximum columns per table (Cloud Dedicated / Clustered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_columns_per_table: Option<u64>,

    /// Retention in nanoseconds; 0 means infinite on Cloud Dedicated / Clustered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<u64>,

    /// Bucket description (Cloud Serverless)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bucket schema type, sent on create only (Cloud Serverless)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
}

/// Measurement schema column role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Tag,
    Field,
    Timestamp,
}

impl ColumnType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Field => "field",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Measurement schema column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDataType {
    String,
    Float,
    Integer,
    Boolean,
    Time,
}

impl ColumnDataType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Time => "time",
        }
    }
}

/// One column of a measurement schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaColumn {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default, alias = "dataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<ColumnDataType>,
}

impl SchemaColumn {
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Tag,
            data_type: None,
        }
    }

    #[must_use]
    pub fn field(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Field,
            data_type: Some(data_type),
        }
    }

    #[must_use]
    pub fn timestamp() -> Self {
        Self {
            name: "time".to_string(),
            column_type: ColumnType::Timestamp,
            data_type: None,
        }
    }
}

/// Canonical measurement schema (Cloud Serverless only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub bucket_id: String,
    pub bucket_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<SchemaColumn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Token permission action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenAction {
    Read,
    Write,
}

impl TokenAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }
}

/// One permission on one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenPermission {
    pub action: TokenAction,
    /// Database (or bucket) name
    pub database: String,
}

/// Request to create a database token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreateTokenRequest {
    pub description: String,
    pub permissions: Vec<TokenPermission>,
}

/// Canonical token description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<TokenPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Secret value, only returned when the token is created. Listings never carry it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Result of a health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub product: ProductType,
    /// Path that answered
    pub endpoint: String,
    pub healthy: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// What an engine needs for one call: the configured deployment and a bound transport
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    pub config: &'a ConnectionConfig,
    pub transport: &'a HttpTransport,
}

/// Per-product database strategy
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    /// List user databases
    async fn list_databases(&self, ctx: EngineContext<'_>) -> Result<Vec<DatabaseInfo>>;

    /// Create a database, applying product defaults for omitted settings
    async fn create_database(
        &self,
        ctx: EngineContext<'_>,
        name: &str,
        options: &DatabaseConfig,
    ) -> Result<DatabaseInfo>;

    /// Update a database. Not every product defines this.
    async fn update_database(
        &self,
        ctx: EngineContext<'_>,
        _name: &str,
        _options: &DatabaseConfig,
    ) -> Result<DatabaseInfo> {
        Err(InfluxError::unsupported(format!(
            "Operation '{}' is not supported for product type '{}'",
            Operation::UpdateDatabase,
            ctx.config.product
        )))
    }

    /// Delete a database by name
    async fn delete_database(&self, ctx: EngineContext<'_>, name: &str) -> Result<()>;
}

/// Per-product token management strategy
#[async_trait]
pub trait TokenEngine: Send + Sync {
    async fn list_tokens(&self, ctx: EngineContext<'_>) -> Result<Vec<TokenInfo>>;

    async fn create_token(
        &self,
        ctx: EngineContext<'_>,
        request: &CreateTokenRequest,
    ) -> Result<TokenInfo>;

    async fn delete_token(&self, ctx: EngineContext<'_>, id: &str) -> Result<()>;
}

/// Database strategy registered for a product type
#[must_use]
pub fn database_engine(product: ProductType) -> &'static dyn DatabaseEngine {
    match product {
        ProductType::Core | ProductType::Enterprise => &core_enterprise::CoreEngine,
        ProductType::CloudDedicated | ProductType::Clustered => &dedicated::DedicatedEngine,
        ProductType::CloudServerless => &serverless::ServerlessEngine,
    }
}

/// Token strategy registered for a product type, if it has one
#[must_use]
pub fn token_engine(product: ProductType) -> Option<&'static dyn TokenEngine> {
    match product {
        ProductType::CloudDedicated => Some(&dedicated::DedicatedEngine),
        ProductType::CloudServerless => Some(&serverless::ServerlessEngine),
        _ => None,
    }
}
