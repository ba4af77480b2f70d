//! Data plane health check

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::engine::HealthStatus;
use crate::error::{InfluxError, Result};
use crate::normalize::str_field;
use crate::product::ProductType;
use crate::transport::HttpTransport;

use super::prepare;

const HEALTH_PATH: &str = "/health";
const PING_PATH: &str = "/ping";

/// Checks the data host of one configured deployment
#[derive(Debug, Clone, Copy)]
pub struct HealthService<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> HealthService<'a> {
    #[must_use]
    pub const fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    /// `/health` on Cloud Serverless, `/ping` on Cloud Dedicated, and `/health` with a
    /// `/ping` fallback on 404 everywhere else
    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn check(&self) -> Result<HealthStatus> {
        let transport = prepare(self.config, Operation::HealthCheck)?;
        let product = self.config.product;

        let (endpoint, body) = match product {
            ProductType::CloudServerless => (HEALTH_PATH, transport.get(HEALTH_PATH).await?),
            ProductType::CloudDedicated => (PING_PATH, transport.get(PING_PATH).await?),
            _ => health_with_fallback(&transport).await?,
        };

        let status = interpret(product, endpoint, &body);
        info!(endpoint, healthy = status.healthy, "health check complete");
        Ok(status)
    }
}

async fn health_with_fallback(transport: &HttpTransport) -> Result<(&'static str, Value)> {
    match transport.get(HEALTH_PATH).await {
        Ok(body) => Ok((HEALTH_PATH, body)),
        Err(InfluxError::NotFound(_)) => {
            debug!("no /health endpoint, falling back to /ping");
            Ok((PING_PATH, transport.get(PING_PATH).await?))
        }
        Err(e) => Err(e),
    }
}

/// Read a health response. Any 2xx answer is healthy unless the body reports `fail`.
#[must_use]
pub fn interpret(product: ProductType, endpoint: &str, body: &Value) -> HealthStatus {
    let (status, version) = match body {
        Value::Object(_) => (
            str_field(body, "status").unwrap_or_else(|| "pass".to_string()),
            str_field(body, "version"),
        ),
        Value::String(text) => (text.clone(), None),
        _ => ("pass".to_string(), None),
    };

    HealthStatus {
        product,
        endpoint: endpoint.to_string(),
        healthy: !status.eq_ignore_ascii_case("fail"),
        status,
        version,
    }
}
