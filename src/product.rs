//! Product Type Registry
//!
//! The closed set of InfluxDB products this adapter speaks to, and the static facts
//! about each: which authorization scheme it expects, how its data-plane and
//! management-plane hosts are derived, and which credential fields each plane needs.
//!
//! Every branch in the adapter keys off [`ProductType`]. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{InfluxError, Result};

/// Origin of the Cloud Dedicated management console API
pub const CLOUD_DEDICATED_MANAGEMENT_ORIGIN: &str = "https://console.influxdata.com";

/// Supported InfluxDB product types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductType {
    /// InfluxDB 3 Core (open source)
    Core,
    /// InfluxDB 3 Enterprise
    Enterprise,
    /// InfluxDB Cloud Dedicated
    CloudDedicated,
    /// InfluxDB Clustered (self-managed)
    Clustered,
    /// InfluxDB Cloud Serverless
    CloudServerless,
}

/// Authorization header scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: Token <token>`
    Token,
}

impl AuthScheme {
    /// Render the `Authorization` header value for a token
    #[must_use]
    pub fn header_value(&self, token: &str) -> String {
        match self {
            Self::Bearer => format!("Bearer {token}"),
            Self::Token => format!("Token {token}"),
        }
    }
}

/// How a plane's base URL is derived from the connection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRule {
    /// The configured instance URL
    InstanceUrl,
    /// `https://{clusterId}.a.influxdb.io`
    ClusterSubdomain,
    /// The fixed management console origin
    ManagementConsole,
}

/// Which side of the product a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Query and write
    Data,
    /// Administrative operations
    Management,
}

impl Plane {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Management => "management",
        }
    }
}

impl std::fmt::Display for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential or addressing field of `ConnectionConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    Url,
    Token,
    ManagementToken,
    ClusterId,
    AccountId,
}

impl ConfigField {
    /// Every field, in registry order
    pub const ALL: [Self; 5] =
        [Self::Url, Self::Token, Self::ManagementToken, Self::ClusterId, Self::AccountId];

    /// Field name as it appears in stored configuration
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Token => "token",
            Self::ManagementToken => "management_token",
            Self::ClusterId => "cluster_id",
            Self::AccountId => "account_id",
        }
    }

    /// Environment variable that supplies this field
    #[must_use]
    pub const fn env_var(&self) -> &'static str {
        match self {
            Self::Url => "INFLUX_DB_INSTANCE_URL",
            Self::Token => "INFLUX_DB_TOKEN",
            Self::ManagementToken => "INFLUX_DB_MANAGEMENT_TOKEN",
            Self::ClusterId => "INFLUX_DB_CLUSTER_ID",
            Self::AccountId => "INFLUX_DB_ACCOUNT_ID",
        }
    }
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProductType {
    /// Every product type, in declaration order
    pub const ALL: [Self; 5] = [
        Self::Core,
        Self::Enterprise,
        Self::CloudDedicated,
        Self::Clustered,
        Self::CloudServerless,
    ];

    /// Get the product name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Enterprise => "enterprise",
            Self::CloudDedicated => "cloud-dedicated",
            Self::Clustered => "clustered",
            Self::CloudServerless => "cloud-serverless",
        }
    }

    /// Authorization scheme. Only Cloud Serverless uses the v2 `Token` scheme.
    #[must_use]
    pub const fn auth_scheme(&self) -> AuthScheme {
        match self {
            Self::CloudServerless => AuthScheme::Token,
            _ => AuthScheme::Bearer,
        }
    }

    #[must_use]
    pub const fn data_host_rule(&self) -> HostRule {
        match self {
            Self::CloudDedicated => HostRule::ClusterSubdomain,
            _ => HostRule::InstanceUrl,
        }
    }

    #[must_use]
    pub const fn management_host_rule(&self) -> HostRule {
        match self {
            Self::CloudDedicated => HostRule::ManagementConsole,
            _ => HostRule::InstanceUrl,
        }
    }

    /// Fields that must be present to perform data-plane operations
    #[must_use]
    pub const fn data_plane_fields(&self) -> &'static [ConfigField] {
        match self {
            Self::CloudDedicated => &[ConfigField::ClusterId, ConfigField::Token],
            _ => &[ConfigField::Url, ConfigField::Token],
        }
    }

    /// Fields that must be present to perform management-plane operations
    #[must_use]
    pub const fn management_plane_fields(&self) -> &'static [ConfigField] {
        match self {
            Self::CloudDedicated | Self::Clustered => {
                &[ConfigField::ClusterId, ConfigField::AccountId, ConfigField::ManagementToken]
            }
            _ => &[ConfigField::Url, ConfigField::Token],
        }
    }

    /// Required fields for a plane
    #[must_use]
    pub const fn plane_fields(&self, plane: Plane) -> &'static [ConfigField] {
        match plane {
            Plane::Data => self.data_plane_fields(),
            Plane::Management => self.management_plane_fields(),
        }
    }

    /// Which field holds the credential used on the management plane.
    ///
    /// Cloud Serverless and the self-hosted single-tenant products reuse the data token.
    #[must_use]
    pub const fn management_credential(&self) -> ConfigField {
        match self {
            Self::CloudDedicated | Self::Clustered => ConfigField::ManagementToken,
            _ => ConfigField::Token,
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = InfluxError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|p| p.as_str() == normalized).ok_or_else(|| {
            let valid: Vec<_> = Self::ALL.iter().map(ProductType::as_str).collect();
            InfluxError::configuration(format!(
                "Unknown product type '{s}'. Valid product types: {}",
                valid.join(", ")
            ))
        })
    }
}

/// Render a list of product types as `a, b, c`
#[must_use]
pub fn join_products(products: &[ProductType]) -> String {
    products.iter().map(ProductType::as_str).collect::<Vec<_>>().join(", ")
}
