//! Error types for cache operations.

use std::path::PathBuf;

/// Errors raised inside the cache subsystem.
///
/// These never leave [`CacheManager`](super::CacheManager) through `get`/`put`/`clear`:
/// the facade logs them and degrades to a miss or a skipped write. Only
/// [`CacheManager::stats`](super::CacheManager::stats) hands one back, as an
/// explicit value.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading, writing, or listing a cache file (or the hashed source) failed.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded.
    #[error("cache serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },

    /// A key that cannot name a file inside the cache directory.
    #[error("invalid cache key: {key}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization {
            reason: e.to_string(),
        }
    }
}
