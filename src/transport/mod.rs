//! HTTP Transport
//!
//! A minimal authenticated JSON client bound to one resolved host and one credential.
//!
//! # Behaviour
//! - The `Authorization` scheme is fixed at construction from the product type
//! - Every request carries the configured timeout
//! - Non-success statuses become [`InfluxError::from_status`] errors
//! - Connection failures are classified into [`TransportErrorKind`]s
//! - A DELETE whose success status arrived before the body was cut off is a success
//!
//! No retries and no caching: a transient failure is surfaced to the caller.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{resolve_plane, ConnectionConfig, PlaneTarget};
use crate::error::{InfluxError, Result, TransportErrorKind};
use crate::product::Plane;

/// Authenticated JSON client for one plane of one deployment
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    /// Rendered `Authorization` header value
    /// WARNING: Sensitive data, do not log
    authorization: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for a resolved plane target
    pub fn new(target: &PlaneTarget, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                InfluxError::transport(
                    TransportErrorKind::Other,
                    format!("Could not build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            host: target.host.clone(),
            authorization: target.auth.header_value(&target.token),
        })
    }

    /// Resolve a plane from the config and create a transport for it
    pub fn for_plane(config: &ConnectionConfig, plane: Plane) -> Result<Self> {
        Self::new(&resolve_plane(config, plane)?, config.timeout())
    }

    /// Base URL this transport talks to
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    /// DELETE. Some backends close the socket right after sending a success status;
    /// that is reported as success with a `null` body.
    pub async fn delete(&self, path: &str) -> Result<Value> {
        tolerate_aborted_delete(self.send(Method::DELETE, path, &[], None).await)
    }

    pub async fn delete_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        tolerate_aborted_delete(self.send(Method::DELETE, path, query, None).await)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{path}", self.host);
        debug!(%method, host = %self.host, path, "sending request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, &self.authorization)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| classify(&e))?;
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if method == Method::DELETE && status.is_success() => {
                warn!(
                    path,
                    status = status.as_u16(),
                    error = %error_chain(&e),
                    "connection closed after delete succeeded, treating as success"
                );
                return Ok(Value::Null);
            }
            Err(e) => return Err(classify(&e)),
        };

        if !status.is_success() {
            debug!(%method, path, status = status.as_u16(), "request failed");
            return Err(InfluxError::from_status(
                status.as_u16(),
                &format!("{method} {path}"),
                extract_server_message(&text).as_deref(),
            ));
        }

        Ok(parse_body(&text))
    }
}

/// Parse a response body: empty is `null`, non-JSON text is kept as a string
#[must_use]
pub fn parse_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed)
        .unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Pull a human-readable message out of an error body
#[must_use]
pub fn extract_server_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    ["message", "error", "detail"]
        .iter()
        .find_map(|key| match &json[*key] {
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        })
        .or_else(|| Some(trimmed.to_string()))
}

/// Reclassify a delete the client reports as aborted as success
pub fn tolerate_aborted_delete(result: Result<Value>) -> Result<Value> {
    match result {
        Err(err) if is_aborted(&err) => {
            warn!(error = %err, "delete aborted by the connection, treating as success");
            Ok(Value::Null)
        }
        other => other,
    }
}

/// Whether a transport error reports the request as aborted
#[must_use]
pub fn is_aborted(err: &InfluxError) -> bool {
    match err {
        InfluxError::Transport { message, .. } => message.to_lowercase().contains("aborted"),
        _ => false,
    }
}

fn is_closed_message(lower: &str) -> bool {
    lower.contains("connection closed before message completed")
        || lower.contains("incomplete message")
        || lower.contains("socket hang up")
        || lower.contains("connection reset")
}

/// Map an HTTP client error to a transport error kind
fn classify(err: &reqwest::Error) -> InfluxError {
    let detail = error_chain(err);
    let lower = detail.to_lowercase();

    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
    {
        TransportErrorKind::HostNotFound
    } else if lower.contains("connection refused") {
        TransportErrorKind::ConnectionRefused
    } else if is_closed_message(&lower) {
        TransportErrorKind::ConnectionClosed
    } else {
        TransportErrorKind::Other
    };

    InfluxError::transport(kind, detail)
}

/// Render an error with its source chain, skipping repeated messages
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        let message = inner.to_string();
        if !parts.iter().any(|p| p.contains(&message)) {
            parts.push(message);
        }
        source = inner.source();
    }
    parts.join(": ")
}
