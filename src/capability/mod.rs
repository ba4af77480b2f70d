//! Capability Validation
//!
//! Pure predicates over a [`ConnectionConfig`] that answer, before any request is
//! built, whether the configuration can reach a plane at all and whether the active
//! product type defines the requested operation.
//!
//! # Validation Strategy
//! - Per-plane required fields come from the product registry, never from global rules
//! - Failures name the exact missing fields and the environment variables that set them
//! - Operation support is an allow-list: each operation declares the products it exists for
//! - Nothing here performs I/O, so a misconfigured deployment fails fast

use serde::Serialize;

use crate::config::ConnectionConfig;
use crate::error::{InfluxError, Result};
use crate::product::{join_products, ConfigField, Plane, ProductType};

use crate::product::ProductType::{CloudDedicated, CloudServerless, Clustered};

const ALL_PRODUCTS: &[ProductType] = &ProductType::ALL;
const DATABASE_UPDATE_PRODUCTS: &[ProductType] = &[CloudDedicated, CloudServerless, Clustered];
const SCHEMA_PRODUCTS: &[ProductType] = &[CloudServerless];
const TOKEN_PRODUCTS: &[ProductType] = &[CloudDedicated, CloudServerless];

/// Outcome of checking one plane's required fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityResult {
    /// Plane that was checked
    pub plane: Plane,
    /// Product type the check ran against
    pub product: ProductType,
    /// Required fields that are absent, in registry order
    pub missing: Vec<ConfigField>,
}

impl CapabilityResult {
    /// Whether every required field is present
    #[must_use]
    pub fn is_capable(&self) -> bool {
        self.missing.is_empty()
    }

    /// Convert into a `Result`, describing the missing fields on failure
    pub fn into_result(self) -> Result<()> {
        if self.is_capable() {
            return Ok(());
        }

        let fields: Vec<_> = self.missing.iter().map(ConfigField::as_str).collect();
        let env_vars: Vec<_> = self.missing.iter().map(ConfigField::env_var).collect();
        Err(InfluxError::configuration(format!(
            "{} operations are not available for product type '{}': missing {}. Set {}",
            capitalize(self.plane.as_str()),
            self.product,
            fields.join(", "),
            env_vars.join(", ")
        )))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Check the fields a plane needs for the configured product type
#[must_use]
pub fn check_capabilities(config: &ConnectionConfig, plane: Plane) -> CapabilityResult {
    let missing = config
        .product
        .plane_fields(plane)
        .iter()
        .copied()
        .filter(|field| config.field(*field).is_none())
        .collect();

    CapabilityResult {
        plane,
        product: config.product,
        missing,
    }
}

/// Can this configuration perform data operations?
#[must_use]
pub fn has_data_capabilities(config: &ConnectionConfig) -> bool {
    check_capabilities(config, Plane::Data).is_capable()
}

/// Can this configuration perform management operations?
#[must_use]
pub fn has_management_capabilities(config: &ConnectionConfig) -> bool {
    check_capabilities(config, Plane::Management).is_capable()
}

/// Fail with a configuration error unless the plane is reachable
pub fn require_capabilities(config: &ConnectionConfig, plane: Plane) -> Result<()> {
    check_capabilities(config, plane).into_result()
}

/// Allow-list check: fail unless `current` is one of `supported`
pub fn validate_operation_support(
    operation: &str,
    supported: &[ProductType],
    current: ProductType,
) -> Result<()> {
    if supported.contains(&current) {
        return Ok(());
    }

    Err(InfluxError::unsupported(format!(
        "Operation '{operation}' is not supported for product type '{current}'. \
         Supported product types: {}",
        join_products(supported)
    )))
}

/// Every logical operation the dispatch layer exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListDatabases,
    CreateDatabase,
    UpdateDatabase,
    DeleteDatabase,
    ListSchemas,
    GetSchema,
    CreateSchema,
    UpdateSchema,
    ListTokens,
    CreateToken,
    DeleteToken,
    HealthCheck,
}

impl Operation {
    /// Stable operation name used in messages and logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ListDatabases => "list_databases",
            Self::CreateDatabase => "create_database",
            Self::UpdateDatabase => "update_database",
            Self::DeleteDatabase => "delete_database",
            Self::ListSchemas => "list_measurement_schemas",
            Self::GetSchema => "get_measurement_schema",
            Self::CreateSchema => "create_measurement_schema",
            Self::UpdateSchema => "update_measurement_schema",
            Self::ListTokens => "list_tokens",
            Self::CreateToken => "create_token",
            Self::DeleteToken => "delete_token",
            Self::HealthCheck => "health_check",
        }
    }

    /// Product types the operation is defined for
    #[must_use]
    pub const fn supported_products(&self) -> &'static [ProductType] {
        match self {
            Self::ListDatabases
            | Self::CreateDatabase
            | Self::DeleteDatabase
            | Self::HealthCheck => ALL_PRODUCTS,
            Self::UpdateDatabase => DATABASE_UPDATE_PRODUCTS,
            Self::ListSchemas | Self::GetSchema | Self::CreateSchema | Self::UpdateSchema => {
                SCHEMA_PRODUCTS
            }
            Self::ListTokens | Self::CreateToken | Self::DeleteToken => TOKEN_PRODUCTS,
        }
    }

    /// Plane the operation runs against
    #[must_use]
    pub const fn plane(&self) -> Plane {
        match self {
            Self::HealthCheck => Plane::Data,
            _ => Plane::Management,
        }
    }

    /// Whether the active product type defines this operation
    #[must_use]
    pub fn is_supported_by(&self, product: ProductType) -> bool {
        self.supported_products().contains(&product)
    }

    /// Run both gates in order: plane capability, then the operation allow-list
    pub fn validate(&self, config: &ConnectionConfig) -> Result<()> {
        require_capabilities(config, self.plane())?;
        validate_operation_support(self.name(), self.supported_products(), config.product)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
