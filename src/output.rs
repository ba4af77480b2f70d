//! JSON Output Envelope Types
//!
//! Every CLI command and MCP tool call returns either a [`SuccessEnvelope`] or an
//! [`ErrorEnvelope`].
//!
//! # Output Contract
//! - Success: `{"ok": true, "product": "...", "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "product": "...", "command": "...", "error": {...}}`, where
//!   `error` is `{"code": "...", "message": "..."}`
//!
//! `product` is the serde name of the active product type, or an empty string when the
//! failure happened before a configuration was loaded.

use serde::{Deserialize, Serialize};

use crate::error::InfluxError;

/// Success envelope for operation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Product type the operation ran against (core, cloud-serverless, ...)
    pub product: String,

    /// Command that was executed (e.g. `list_databases`)
    pub command: String,

    /// Operation-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        product: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self {
            ok: true,
            product: product.into(),
            command: command.into(),
            data,
            meta,
        }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Product type, empty if no configuration was resolved
    pub product: String,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(product: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            product: product.into(),
            command: command.into(),
            error,
        }
    }

    /// Create error envelope from an [`InfluxError`]
    pub fn from_error(
        product: impl Into<String>,
        command: impl Into<String>,
        err: &InfluxError,
    ) -> Self {
        Self::new(product, command, ErrorInfo::new(err.error_code(), err.message()))
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `CONFIG_ERROR`, `NOT_FOUND`)
    pub code: String,

    /// One-line, actionable message. Never contains credentials.
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of items returned by list operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_returned: Option<usize>,
}

impl Metadata {
    #[must_use]
    pub const fn new(execution_ms: u64) -> Self {
        Self {
            execution_ms,
            items_returned: None,
        }
    }

    #[must_use]
    pub const fn with_items(execution_ms: u64, items_returned: usize) -> Self {
        Self {
            execution_ms,
            items_returned: Some(items_returned),
        }
    }
}
