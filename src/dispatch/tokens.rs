//! Database token resource (Cloud Dedicated, Cloud Serverless)

use tracing::{info, instrument};

use crate::capability::Operation;
use crate::config::ConnectionConfig;
use crate::engine::{token_engine, CreateTokenRequest, EngineContext, TokenEngine, TokenInfo};
use crate::error::{InfluxError, Result};
use crate::transport::HttpTransport;

use super::{prepare, require_name};

/// Token operations for one configured deployment
#[derive(Debug, Clone, Copy)]
pub struct TokenService<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> TokenService<'a> {
    #[must_use]
    pub const fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    fn engine(&self, operation: Operation) -> Result<(HttpTransport, &'static dyn TokenEngine)> {
        let transport = prepare(self.config, operation)?;
        let engine = token_engine(self.config.product).ok_or_else(|| {
            InfluxError::unsupported(format!(
                "Operation '{operation}' is not supported for product type '{}'",
                self.config.product
            ))
        })?;
        Ok((transport, engine))
    }

    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn list(&self) -> Result<Vec<TokenInfo>> {
        let (transport, engine) = self.engine(Operation::ListTokens)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let tokens = engine.list_tokens(ctx).await?;
        info!(count = tokens.len(), "listed tokens");
        Ok(tokens)
    }

    /// Create a token. The returned `access_token` is the only time the secret is shown.
    #[instrument(skip(self, request), fields(product = %self.config.product))]
    pub async fn create(&self, request: &CreateTokenRequest) -> Result<TokenInfo> {
        let (transport, engine) = self.engine(Operation::CreateToken)?;
        validate_request(request)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        let token = engine.create_token(ctx, request).await?;
        info!(
            token_id = %token.id,
            permissions = token.permissions.len(),
            "created token"
        );
        Ok(token)
    }

    #[instrument(skip(self), fields(product = %self.config.product))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let (transport, engine) = self.engine(Operation::DeleteToken)?;
        let id = require_name("Token id", id)?;
        let ctx = EngineContext {
            config: self.config,
            transport: &transport,
        };

        engine.delete_token(ctx, id).await?;
        info!(token_id = id, "deleted token");
        Ok(())
    }
}

fn validate_request(request: &CreateTokenRequest) -> Result<()> {
    if request.description.trim().is_empty() {
        return Err(InfluxError::invalid_input("Token description must not be empty"));
    }
    if request.permissions.is_empty() {
        return Err(InfluxError::invalid_input("At least one permission is required"));
    }
    for permission in &request.permissions {
        require_name("Permission database name", &permission.database)?;
    }
    Ok(())
}
