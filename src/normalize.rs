//! Response Normalization Helpers
//!
//! Backends wrap list results in several different envelopes, and the shape has shifted
//! between releases. [`extract_array`] picks the first array found at any of a list of
//! candidate key paths, so each resource declares its envelopes once instead of
//! hand-rolling the probing.

use serde_json::Value;
use tracing::warn;

/// A key path into a JSON document. The empty path is the document root.
pub type KeyPath = &'static [&'static str];

/// Envelopes seen for Core/Enterprise database listings
pub const CORE_DATABASE_ENVELOPES: &[KeyPath] =
    &[&[], &["databases"], &["data", "databases"], &["result", "databases"]];

/// Envelopes seen for Cloud Dedicated/Clustered database listings
pub const DEDICATED_DATABASE_ENVELOPES: &[KeyPath] = &[&[], &["databases"]];

/// Envelopes for Cloud Serverless bucket listings
pub const BUCKET_ENVELOPES: &[KeyPath] = &[&["buckets"]];

/// Envelopes for Cloud Serverless organization listings
pub const ORG_ENVELOPES: &[KeyPath] = &[&["orgs"]];

/// Envelopes for measurement schema listings
pub const MEASUREMENT_SCHEMA_ENVELOPES: &[KeyPath] = &[&["measurementSchemas"]];

/// Envelopes for Cloud Dedicated token listings
pub const DEDICATED_TOKEN_ENVELOPES: &[KeyPath] = &[&[], &["tokens"]];

/// Envelopes for Cloud Serverless authorization listings
pub const AUTHORIZATION_ENVELOPES: &[KeyPath] = &[&["authorizations"]];

/// Walk a key path
#[must_use]
pub fn at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Return the first array found at any candidate path, or an empty slice.
///
/// A `null` body is an empty list. Any other shape without a recognised array is logged
/// and also treated as empty.
#[must_use]
pub fn extract_array<'a>(value: &'a Value, candidates: &[KeyPath]) -> &'a [Value] {
    if value.is_null() {
        return &[];
    }

    if let Some(items) =
        candidates.iter().find_map(|path| at_path(value, path).and_then(Value::as_array))
    {
        return items;
    }

    warn!(
        candidates = ?candidates,
        "response did not contain an array at any expected location"
    );
    &[]
}

/// Non-blank string at a key
#[must_use]
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(String::from)
}

/// Non-negative integer at a key
#[must_use]
pub fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}
