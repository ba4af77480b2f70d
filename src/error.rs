//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout the adapter.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Configuration`: Missing or invalid credentials for the requested plane
//! - `UnsupportedOperation`: Operation not defined for the active product type
//! - `NotFound`: Name-to-id resolution failed, or the backend answered 404
//! - `Backend`: Any other non-success HTTP status, classified by status code
//! - `Transport`: Connection-level failure (refused, DNS, timeout, closed)
//! - `InvalidInput`: Malformed caller arguments rejected before any network call

use thiserror::Error;

/// Longest server message kept in an error, in characters
const MAX_SERVER_MESSAGE_CHARS: usize = 300;

/// Classification of a non-success HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 400
    InvalidRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 409
    Conflict,
    /// 500
    ServerError,
    /// Any other status, passed through with the server's message
    Other,
}

impl BackendErrorKind {
    /// Classify an HTTP status code. 404 is not a backend kind, see [`InfluxError::from_status`].
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            409 => Self::Conflict,
            500 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Actionable one-line description of the failure
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid request, check the names and parameters sent",
            Self::Unauthorized => "Unauthorized, the token is missing, expired or invalid",
            Self::Forbidden => {
                "Forbidden, the token does not have the permissions this operation needs"
            }
            Self::Conflict => "Conflict, the resource already exists or is being modified",
            Self::ServerError => "Internal server error reported by InfluxDB",
            Self::Other => "Unexpected response from InfluxDB",
        }
    }
}

/// Classification of a connection-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Nothing listening on the host/port (`ECONNREFUSED`)
    ConnectionRefused,
    /// DNS resolution failed (`ENOTFOUND`)
    HostNotFound,
    /// The per-request timeout elapsed
    Timeout,
    /// The peer closed or aborted the connection mid-response
    ConnectionClosed,
    /// Anything else reported by the HTTP client
    Other,
}

impl TransportErrorKind {
    /// Stable short name used in messages
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::HostNotFound => "ENOTFOUND",
            Self::Timeout => "ETIMEDOUT",
            Self::ConnectionClosed => "ECONNRESET",
            Self::Other => "EIO",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for adapter operations
#[derive(Error, Debug)]
pub enum InfluxError {
    /// Missing or invalid credentials, raised before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation not defined for the active product type
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Resource not found (name resolution or backend 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend answered with a non-success status
    #[error("{message}")]
    Backend {
        status: u16,
        kind: BackendErrorKind,
        message: String,
    },

    /// Connection-level failure
    #[error("Transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl InfluxError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by agents.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Get human-readable error message (no credentials, no raw payloads)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a transport error
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Map a non-success HTTP status plus the server's message to an error.
    ///
    /// `context` names what was being attempted, e.g. "create database 'metrics'".
    #[must_use]
    pub fn from_status(status: u16, context: &str, server_message: Option<&str>) -> Self {
        let suffix = server_message
            .map(one_line)
            .filter(|m| !m.is_empty())
            .map(|m| format!(". Server message: {m}"))
            .unwrap_or_default();

        if status == 404 {
            return Self::NotFound(format!("{context} failed: resource does not exist{suffix}"));
        }

        let kind = BackendErrorKind::from_status(status);
        Self::Backend {
            status,
            kind,
            message: format!(
                "{context} failed (HTTP {status}): {}{suffix}",
                kind.describe()
            ),
        }
    }

    /// Whether this is a transport error of the given kind
    #[must_use]
    pub fn is_transport(&self, expected: TransportErrorKind) -> bool {
        matches!(self, Self::Transport { kind, .. } if *kind == expected)
    }
}

/// Collapse whitespace and clip a server message to a single bounded line
fn one_line(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_SERVER_MESSAGE_CHARS {
        let clipped: String = collapsed.chars().take(MAX_SERVER_MESSAGE_CHARS).collect();
        format!("{clipped}...")
    } else {
        collapsed
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, InfluxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = [
            (InfluxError::configuration("test"), "CONFIG_ERROR"),
            (InfluxError::unsupported("test"), "UNSUPPORTED_OPERATION"),
            (InfluxError::not_found("test"), "NOT_FOUND"),
            (InfluxError::from_status(500, "x", None), "BACKEND_ERROR"),
            (
                InfluxError::transport(TransportErrorKind::Timeout, "test"),
                "TRANSPORT_ERROR",
            ),
            (InfluxError::invalid_input("test"), "INVALID_INPUT"),
        ];
        for (err, code) in cases {
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (400, BackendErrorKind::InvalidRequest),
            (401, BackendErrorKind::Unauthorized),
            (403, BackendErrorKind::Forbidden),
            (409, BackendErrorKind::Conflict),
            (500, BackendErrorKind::ServerError),
            (422, BackendErrorKind::Other),
            (503, BackendErrorKind::Other),
        ];
        for (status, expected) in cases {
            match InfluxError::from_status(status, "list databases", None) {
                InfluxError::Backend {
                    status: s, kind, ..
                } => {
                    assert_eq!(s, status);
                    assert_eq!(kind, expected);
                }
                other => panic!("unexpected error for {status}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_404_is_not_found() {
        let err = InfluxError::from_status(404, "delete database 'x'", Some("bucket not found"));
        assert!(matches!(err, InfluxError::NotFound(_)));
        assert!(err.message().contains("Server message: bucket not found"));
    }

    #[test]
    fn test_server_message_is_one_line_and_bounded() {
        let long = format!("line one\nline two {}", "x".repeat(1000));
        let err = InfluxError::from_status(400, "create database 'x'", Some(&long));
        let message = err.message();
        assert!(!message.contains('\n'));
        assert!(message.contains("line one line two"));
        assert!(message.ends_with("..."));
        assert!(message.len() < 500);
    }

    #[test]
    fn test_forbidden_mentions_permissions() {
        let err = InfluxError::from_status(403, "create token", None);
        assert!(err.message().contains("permissions"));
        assert!(err.message().contains("HTTP 403"));
    }

    #[test]
    fn test_transport_kind_in_message() {
        let err =
            InfluxError::transport(TransportErrorKind::ConnectionRefused, "nothing listening");
        assert!(err.message().contains("ECONNREFUSED"));
        assert!(err.is_transport(TransportErrorKind::ConnectionRefused));
        assert!(!err.is_transport(TransportErrorKind::Timeout));
    }
}
