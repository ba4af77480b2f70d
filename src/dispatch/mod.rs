//! Dispatch Layer
//!
//! One service per resource. Every call follows the same sequence and stops at the first
//! failure:
//!
//! 1. plane capability check
//! 2. operation allow-list check
//! 3. transport resolution for the operation's plane
//! 4. product-specific request through the registered engine
//! 5. normalization into the canonical model
//!
//! Steps 1 to 3 never touch the network, so a misconfigured deployment fails before any
//! request is sent. Services borrow the [`ConnectionConfig`] they are given; there is no
//! process-wide configuration.

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::error::{InfluxError, Result};
use crate::transport::HttpTransport;

mod databases;
mod health;
mod schemas;
mod tokens;

pub use databases::DatabaseService;
pub use health::HealthService;
pub use schemas::{validate_columns, SchemaService};
pub use tokens::TokenService;

/// Run the configuration gates for an operation and bind a transport to its plane
fn prepare(config: &ConnectionConfig, operation: Operation) -> Result<HttpTransport> {
    operation.validate(config)?;
    HttpTransport::for_plane(config, operation.plane())
}

/// Reject blank names and ids before any request is built. `what` labels the value in
/// the error, e.g. "Bucket name" or "Token id".
fn require_name<'n>(what: &str, value: &'n str) -> Result<&'n str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InfluxError::invalid_input(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductType;

    #[test]
    fn test_require_name_trims() {
        assert_eq!(require_name("Database name", "  metrics ").unwrap(), "metrics");
    }

    #[test]
    fn test_require_name_rejects_blank() {
        let err = require_name("Bucket name", "   ").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(err.message().contains("Bucket name must not be empty"));
    }

    #[test]
    fn test_prepare_runs_gates_before_transport() {
        let empty = ConnectionConfig::new(ProductType::Core);
        let err = prepare(&empty, Operation::ListDatabases).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let config = ConnectionConfig::core("http://localhost:8181", "t");
        let err = prepare(&config, Operation::CreateSchema).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");

        let transport = prepare(&config, Operation::ListDatabases).unwrap();
        assert_eq!(transport.host(), "http://localhost:8181");
    }

    #[test]
    fn test_prepare_uses_management_console_for_dedicated() {
        let config = ConnectionConfig::cloud_dedicated("abc123", "acct", "t", "m");
        let management = prepare(&config, Operation::ListDatabases).unwrap();
        assert_eq!(management.host(), "https://console.influxdata.com");

        let data = prepare(&config, Operation::HealthCheck).unwrap();
        assert_eq!(data.host(), "https://abc123.a.influxdb.io");
    }
}
