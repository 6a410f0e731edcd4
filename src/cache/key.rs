//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use super::hasher::to_hex;

/// Number of digest bytes kept in a key (32 hex chars).
const KEY_DIGEST_BYTES: usize = 16;

/// File extension of record files.
pub const RECORD_EXT: &str = "json";

/// Operation parameters that participate in the cache key.
///
/// Backed by a `BTreeMap`, so iteration and serialization are always sorted by
/// name regardless of insertion order.
///
/// The tools only store strings and numbers, but any JSON value is accepted.
/// Arrays keep their element order; nested objects serialize with sorted keys
/// as well, so they are canonical too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheParams(BTreeMap<String, serde_json::Value>);

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted-key JSON rendering used for key derivation.
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for CacheParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CacheParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Identity of one cached (file, operation, parameters) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    /// Wraps an existing key string, e.g. one recovered from a file name.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Name of the backing record file.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.key, RECORD_EXT)
    }

    /// Operation prefix of the key.
    pub fn operation(&self) -> &str {
        self.key.rsplit_once('_').map(|(op, _)| op).unwrap_or(&self.key)
    }

    /// Whether the key can safely name a file inside the cache directory.
    pub fn is_file_safe(&self) -> bool {
        !self.key.is_empty()
            && self
                .key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derives `"{operation}_{digest}"` from an absolute path, an operation name
/// and canonical parameters.
///
/// Pure: neither the path nor anything else is touched on disk.
pub fn derive_key(absolute_path: &Path, operation: &str, params: &CacheParams) -> CacheKey {
    let material = format!(
        "{}_{}_{}",
        absolute_path.display(),
        operation,
        params.canonical()
    );
    let digest = Sha256::digest(material.as_bytes());
    CacheKey::new(format!(
        "{}_{}",
        sanitize_operation(operation),
        to_hex(&digest[..KEY_DIGEST_BYTES])
    ))
}

fn sanitize_operation(operation: &str) -> String {
    let cleaned: String = operation
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "op".to_string()
    } else {
        cleaned
    }
}
