//! Configuration Management
//!
//! This module owns [`ConnectionConfig`], the endpoint resolver, and the optional
//! on-disk registry of named connection profiles.
//!
//! # Sources
//! - Environment: `INFLUX_DB_PRODUCT_TYPE`, `INFLUX_DB_INSTANCE_URL`, `INFLUX_DB_TOKEN`,
//!   `INFLUX_DB_MANAGEMENT_TOKEN`, `INFLUX_DB_CLUSTER_ID`, `INFLUX_DB_ACCOUNT_ID`,
//!   `INFLUX_DB_TIMEOUT_MS`
//! - Local profiles: `.influxdb-mcp/config.json` (team-shareable, per-project)
//! - Global profiles: `~/.config/influxdb-mcp/connections.json` (per-user)
//!
//! # Resolution Precedence
//! Local profiles override global profiles with the same name. Stored profiles may
//! reference environment variables for tokens instead of holding them directly.
//!
//! # Endpoint Resolution
//! [`resolve_endpoints`] is pure: it never touches the network and never fails. A
//! missing field yields a missing host, and capability validation reports it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InfluxError, Result};
use crate::product::{
    AuthScheme, ConfigField, HostRule, Plane, ProductType, CLOUD_DEDICATED_MANAGEMENT_ORIGIN,
};

/// Environment variable selecting the product type
pub const PRODUCT_TYPE_ENV: &str = "INFLUX_DB_PRODUCT_TYPE";
/// Environment variable overriding the per-request timeout
pub const TIMEOUT_ENV: &str = "INFLUX_DB_TIMEOUT_MS";
/// Per-request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one InfluxDB deployment
///
/// Which fields are required depends on the product type; see
/// [`ProductType::data_plane_fields`] and [`ProductType::management_plane_fields`].
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Product type
    #[serde(rename = "type")]
    pub product: ProductType,

    /// Instance URL (all products except Cloud Dedicated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Data-plane token (also the management token for Core, Enterprise, Serverless)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Management API token (Cloud Dedicated, Clustered)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_token: Option<String>,

    /// Cluster id (Cloud Dedicated, Clustered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    /// Account id (Cloud Dedicated, Clustered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ConnectionConfig")
            .field("product", &self.product)
            .field("url", &self.url)
            .field("token", &redact(&self.token))
            .field("management_token", &redact(&self.management_token))
            .field("cluster_id", &self.cluster_id)
            .field("account_id", &self.account_id)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create an empty config for a product type
    #[must_use]
    pub const fn new(product: ProductType) -> Self {
        Self {
            product,
            url: None,
            token: None,
            management_token: None,
            cluster_id: None,
            account_id: None,
            timeout_ms: None,
        }
    }

    /// Create a Core config
    #[must_use]
    pub fn core(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            token: Some(token.into()),
            ..Self::new(ProductType::Core)
        }
    }

    /// Create an Enterprise config
    #[must_use]
    pub fn enterprise(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            product: ProductType::Enterprise,
            ..Self::core(url, token)
        }
    }

    /// Create a Cloud Serverless config
    #[must_use]
    pub fn cloud_serverless(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            product: ProductType::CloudServerless,
            ..Self::core(url, token)
        }
    }

    /// Create a Cloud Dedicated config
    #[must_use]
    pub fn cloud_dedicated(
        cluster_id: impl Into<String>,
        account_id: impl Into<String>,
        token: impl Into<String>,
        management_token: impl Into<String>,
    ) -> Self {
        Self {
            token: Some(token.into()),
            management_token: Some(management_token.into()),
            cluster_id: Some(cluster_id.into()),
            account_id: Some(account_id.into()),
            ..Self::new(ProductType::CloudDedicated)
        }
    }

    /// Create a Clustered config
    #[must_use]
    pub fn clustered(
        url: impl Into<String>,
        token: impl Into<String>,
        cluster_id: impl Into<String>,
        account_id: impl Into<String>,
        management_token: impl Into<String>,
    ) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::cloud_dedicated(cluster_id, account_id, token, management_token)
        }
        .with_product(ProductType::Clustered)
    }

    fn with_product(mut self, product: ProductType) -> Self {
        self.product = product;
        self
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment-shaped)
    ///
    /// Empty or whitespace-only values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let product = get(PRODUCT_TYPE_ENV)
            .ok_or_else(|| {
                InfluxError::configuration(format!(
                    "{PRODUCT_TYPE_ENV} is not set. Set it to one of: core, enterprise, \
                     cloud-dedicated, clustered, cloud-serverless"
                ))
            })?
            .parse::<ProductType>()?;

        let timeout_ms = get(TIMEOUT_ENV)
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    InfluxError::configuration(format!(
                        "{TIMEOUT_ENV} must be a whole number of milliseconds, got '{raw}'"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            product,
            url: get(ConfigField::Url.env_var()),
            token: get(ConfigField::Token.env_var()),
            management_token: get(ConfigField::ManagementToken.env_var()),
            cluster_id: get(ConfigField::ClusterId.env_var()),
            account_id: get(ConfigField::AccountId.env_var()),
            timeout_ms,
        })
    }

    /// Value of a field, `None` when absent or blank
    #[must_use]
    pub fn field(&self, field: ConfigField) -> Option<&str> {
        let value = match field {
            ConfigField::Url => &self.url,
            ConfigField::Token => &self.token,
            ConfigField::ManagementToken => &self.management_token,
            ConfigField::ClusterId => &self.cluster_id,
            ConfigField::AccountId => &self.account_id,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Per-request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis)
    }
}

/// Base URLs derived from a [`ConnectionConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoints {
    /// Host for query/write
    pub data_host: Option<String>,
    /// Host for administrative operations
    pub management_host: Option<String>,
}

impl ResolvedEndpoints {
    #[must_use]
    pub fn host(&self, plane: Plane) -> Option<&str> {
        match plane {
            Plane::Data => self.data_host.as_deref(),
            Plane::Management => self.management_host.as_deref(),
        }
    }
}

/// Compute data and management hosts. Recomputed on every call.
#[must_use]
pub fn resolve_endpoints(config: &ConnectionConfig) -> ResolvedEndpoints {
    ResolvedEndpoints {
        data_host: host_for(config, config.product.data_host_rule()),
        management_host: host_for(config, config.product.management_host_rule()),
    }
}

fn host_for(config: &ConnectionConfig, rule: HostRule) -> Option<String> {
    match rule {
        HostRule::InstanceUrl => config
            .field(ConfigField::Url)
            .map(|url| url.trim_end_matches('/').to_string()),
        HostRule::ClusterSubdomain => config
            .field(ConfigField::ClusterId)
            .map(|cluster_id| format!("https://{cluster_id}.a.influxdb.io")),
        HostRule::ManagementConsole => Some(CLOUD_DEDICATED_MANAGEMENT_ORIGIN.to_string()),
    }
}

/// Host, credential and auth scheme for one plane
#[derive(Clone)]
pub struct PlaneTarget {
    pub plane: Plane,
    pub host: String,
    pub token: String,
    pub auth: AuthScheme,
}

impl std::fmt::Debug for PlaneTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaneTarget")
            .field("plane", &self.plane)
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("auth", &self.auth)
            .finish()
    }
}

/// Resolve the host and credential for a plane
///
/// Fails with a configuration error if either is missing. Callers run capability
/// validation first, so reaching this error means the registry and resolver disagree.
pub fn resolve_plane(config: &ConnectionConfig, plane: Plane) -> Result<PlaneTarget> {
    let endpoints = resolve_endpoints(config);
    let host = endpoints.host(plane).ok_or_else(|| {
        InfluxError::configuration(format!(
            "No {plane} host could be resolved for product type '{}'",
            config.product
        ))
    })?;

    let credential = match plane {
        Plane::Data => ConfigField::Token,
        Plane::Management => config.product.management_credential(),
    };
    let token = config.field(credential).ok_or_else(|| {
        InfluxError::configuration(format!(
            "No {plane} token configured for product type '{}'. Set {}",
            config.product,
            credential.env_var()
        ))
    })?;

    Ok(PlaneTarget {
        plane,
        host: host.to_string(),
        token: token.to_string(),
        auth: config.product.auth_scheme(),
    })
}

// ============================================================================
// Named connection profiles
// ============================================================================

/// Stored connection profile
///
/// Like `ConnectionConfig`, but tokens may be supplied through environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConnection {
    /// Connection configuration
    #[serde(flatten)]
    pub config: ConnectionConfig,

    /// Environment variable holding the data token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Environment variable holding the management token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_token_env: Option<String>,
}

impl StoredConnection {
    /// Wrap a config with no environment references
    #[must_use]
    pub const fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            token_env: None,
            management_token_env: None,
        }
    }

    /// Resolve environment variable references and return the final config
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut config = self.config.clone();

        if let Some(env_var) = &self.token_env {
            config.token = Some(read_env_reference(env_var, "token")?);
        }
        if let Some(env_var) = &self.management_token_env {
            config.management_token = Some(read_env_reference(env_var, "management token")?);
        }

        Ok(config)
    }
}

fn read_env_reference(env_var: &str, what: &str) -> Result<String> {
    std::env::var(env_var).map_err(|_| {
        InfluxError::configuration(format!("Environment variable {env_var} not found for {what}"))
    })
}

/// Connection registry (stored in config files)
///
/// ```json
/// {
///   "connections": {
///     "prod": { "type": "cloud-serverless", "url": "https://...", "token_env": "PROD_TOKEN" }
///   },
///   "default": "prod"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionRegistry {
    /// Named connections
    #[serde(default)]
    pub connections: BTreeMap<String, StoredConnection>,

    /// Name of the default connection (must exist in connections map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ConnectionRegistry {
    /// Overlay `other` on top of `self`: same-named connections and the default are replaced
    pub fn merge(&mut self, other: Self) {
        self.connections.extend(other.connections);
        if other.default.is_some() {
            self.default = other.default;
        }
    }

    /// Look up a connection by name, or the default when `name` is `None`
    pub fn get(&self, name: Option<&str>) -> Result<&StoredConnection> {
        let available: Vec<_> = self.connections.keys().map(String::as_str).collect();

        let conn_name = match name {
            Some(n) => n,
            None => self.default.as_deref().ok_or_else(|| {
                InfluxError::configuration(format!(
                    "No default connection set. Available connections: {available:?}. \
                     Specify one with --connection or set a default in the config."
                ))
            })?,
        };

        self.connections.get(conn_name).ok_or_else(|| {
            let default_info = match &self.default {
                Some(d) => format!(" (default: '{d}')"),
                None => String::new(),
            };
            InfluxError::configuration(format!(
                "Connection '{conn_name}' not found. Available connections: \
                 {available:?}{default_info}"
            ))
        })
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.influxdb-mcp/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/influxdb-mcp/connections.json` (per-user)
    Global,
}

/// Get path to local config file (`.influxdb-mcp/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        InfluxError::configuration(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".influxdb-mcp").join("config.json"))
}

/// Get path to global config file (`~/.config/influxdb-mcp/connections.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| InfluxError::configuration("Could not determine user config directory"))?;

    Ok(config_dir.join("influxdb-mcp").join("connections.json"))
}

fn config_path(location: ConfigLocation) -> Result<PathBuf> {
    match location {
        ConfigLocation::Local => local_config_path(),
        ConfigLocation::Global => global_config_path(),
    }
}

/// Load a connection registry from a file. A missing file is an empty registry.
pub fn load_registry(path: &Path) -> Result<ConnectionRegistry> {
    if !path.exists() {
        return Ok(ConnectionRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| InfluxError::configuration(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents)
        .map_err(|e| InfluxError::configuration(format!("Invalid config file format: {e}")))
}

/// Save a connection registry to a file, creating parent directories
pub fn save_registry(path: &Path, registry: &ConnectionRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InfluxError::configuration(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(registry)
        .map_err(|e| InfluxError::configuration(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| InfluxError::configuration(format!("Could not write config file: {e}")))
}

/// Load global then local registries, local taking precedence
pub fn load_with_precedence() -> Result<ConnectionRegistry> {
    let mut merged = load_registry(&global_config_path()?)?;
    merged.merge(load_registry(&local_config_path()?)?);
    Ok(merged)
}

/// Resolve a stored connection by name (or the default) into a usable config
pub fn resolve_connection(name: Option<&str>) -> Result<ConnectionConfig> {
    let registry = load_with_precedence()?;
    registry.get(name)?.resolve()
}

/// Save a connection profile. The first connection saved becomes the default.
pub fn save_connection(
    name: Option<String>,
    stored: StoredConnection,
    location: ConfigLocation,
) -> Result<PathBuf> {
    let conn_name = name.unwrap_or_else(|| "default".to_string());
    let path = config_path(location)?;

    let mut registry = load_registry(&path)?;
    let is_first_connection = registry.connections.is_empty();
    registry.connections.insert(conn_name.clone(), stored);
    if is_first_connection {
        registry.default = Some(conn_name);
    }

    save_registry(&path, &registry)?;
    Ok(path)
}

/// Credential-free view of a stored connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub product: ProductType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_default: bool,
}

/// Summarize every connection in a registry
#[must_use]
pub fn summarize(registry: &ConnectionRegistry) -> Vec<ConnectionSummary> {
    registry
        .connections
        .iter()
        .map(|(name, stored)| ConnectionSummary {
            name: name.clone(),
            product: stored.config.product,
            url: stored.config.url.clone(),
            is_default: registry.default.as_deref() == Some(name.as_str()),
        })
        .collect()
}

/// List all available connections across local and global profiles
pub fn list_connections() -> Result<Vec<ConnectionSummary>> {
    Ok(summarize(&load_with_precedence()?))
}
