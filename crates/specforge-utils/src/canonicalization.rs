//! Canonical JSON emission and content hashing
//!
//! JSON contracts (CLI `--json` output, snapshot hashes) are emitted in JCS
//! (RFC 8785) canonical form so identical values always produce identical
//! bytes.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Emit a value as JCS (RFC 8785) canonical JSON.
///
/// # Example
///
/// ```rust
/// use specforge_utils::canonicalization::emit_jcs;
/// use serde_json::json;
///
/// let out = emit_jcs(&json!({"b": 1, "a": 2})).unwrap();
/// assert_eq!(out, r#"{"a":2,"b":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// BLAKE3 hash over an artifact map, independent of insertion order.
///
/// Each entry contributes its name and content, length-prefixed so that
/// `{"ab": "c"}` and `{"a": "bc"}` hash differently.
#[must_use]
pub fn hash_artifacts(artifacts: &BTreeMap<String, String>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (name, content) in artifacts {
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
