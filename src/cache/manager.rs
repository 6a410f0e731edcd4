//! Cache manager: the facade the tools talk to.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::backend::{CacheBackend, DirectoryStats, FileStore, NullCache};
use super::entry::{system_time_secs, unix_now, CacheEntry, Validity};
use super::error::CacheError;
use super::hasher::ContentHasher;
use super::key::{derive_key, CacheKey, CacheParams};
use crate::paths::normalize_path;

/// Directory name under the OS temp root.
pub const DEFAULT_CACHE_SUBDIR: &str = "ai_image_analysis_cache";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join(DEFAULT_CACHE_SUBDIR),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `AI_VISION_CACHE_DIR` and `AI_VISION_CACHE_DISABLED`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("AI_VISION_CACHE_DIR") {
            if !dir.trim().is_empty() {
                cfg.cache_dir = PathBuf::from(dir);
            }
        }
        if let Ok(v) = std::env::var("AI_VISION_CACHE_DISABLED") {
            if matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                cfg.enabled = false;
            }
        }
        cfg
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Process-local counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Result cache keyed by (file, operation, parameters).
///
/// `get`, `put` and `clear` never fail from the caller's point of view: any
/// internal error is logged and the call behaves like a miss or a skipped
/// write. Safe to share across threads behind an `Arc`.
pub struct CacheManager {
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stats: AtomicStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        if config.enabled {
            Self::new(Box::new(FileStore::open(&config.cache_dir)))
        } else {
            Self::new(Box::new(NullCache::new()))
        }
    }

    /// Key under which a result for these inputs is stored.
    pub fn key_for(
        &self,
        file: &Path,
        operation: &str,
        params: &CacheParams,
    ) -> Result<CacheKey, CacheError> {
        let path = absolutize(file)?;
        Ok(derive_key(&path, operation, params))
    }

    /// Returns the cached payload if the record exists, the file bytes are
    /// unchanged, and the record is within its TTL.
    pub fn get(&self, file: &Path, operation: &str, params: &CacheParams) -> Option<String> {
        match self.try_get(file, operation, params) {
            Ok(Some(payload)) => {
                AtomicStats::bump(&self.stats.hits);
                tracing::debug!(file = %file.display(), operation, "cache hit");
                Some(payload)
            }
            Ok(None) => {
                AtomicStats::bump(&self.stats.misses);
                None
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.misses);
                AtomicStats::bump(&self.stats.errors);
                tracing::warn!(error = %e, "cache retrieval failed (non-fatal)");
                None
            }
        }
    }

    fn try_get(
        &self,
        file: &Path,
        operation: &str,
        params: &CacheParams,
    ) -> Result<Option<String>, CacheError> {
        let key = self.key_for(file, operation, params)?;
        let entry = match self.backend.read(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(CacheError::Serialization { reason }) => {
                tracing::debug!(key = %key, %reason, "removing corrupt cache record");
                self.evict(&key);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // An unreadable source keeps its record: it may reappear unchanged.
        let current_hash = match ContentHasher::hash_file(file) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!(error = %e, key = %key, "source unreadable; treating as miss");
                return Ok(None);
            }
        };

        match entry.validate(&current_hash, unix_now()) {
            Validity::Fresh => Ok(Some(entry.payload)),
            Validity::Stale => {
                tracing::debug!(key = %key, "source changed; evicting cache record");
                self.evict(&key);
                Ok(None)
            }
            Validity::Expired => {
                tracing::debug!(key = %key, "cache record expired; evicting");
                self.evict(&key);
                Ok(None)
            }
        }
    }

    fn evict(&self, key: &CacheKey) {
        match self.backend.delete(key) {
            Ok(true) => AtomicStats::bump(&self.stats.evictions),
            Ok(false) => {}
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                tracing::warn!(error = %e, key = %key, "failed to evict cache record");
            }
        }
    }

    /// Stores `result` for these inputs. Failures are logged and dropped.
    pub fn put(&self, file: &Path, operation: &str, params: &CacheParams, result: &str) {
        match self.try_put(file, operation, params, result) {
            Ok(()) => AtomicStats::bump(&self.stats.stores),
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                tracing::warn!(error = %e, "cache storage failed (non-fatal)");
            }
        }
    }

    fn try_put(
        &self,
        file: &Path,
        operation: &str,
        params: &CacheParams,
        result: &str,
    ) -> Result<(), CacheError> {
        let path = absolutize(file)?;
        let key = derive_key(&path, operation, params);
        let content_hash = ContentHasher::hash_file(&path)?;
        let meta = std::fs::metadata(&path).map_err(|e| CacheError::io(&path, e))?;

        let entry = CacheEntry {
            source_identity: path.display().to_string(),
            content_hash,
            operation: operation.to_string(),
            parameters: params.clone(),
            payload: result.to_string(),
            created_at: unix_now(),
            size_at_write: meta.len(),
            mtime_at_write: meta.modified().map(system_time_secs).unwrap_or(0.0),
        };
        self.backend.write(&key, &entry)?;
        tracing::debug!(key = %key, "cached result");
        Ok(())
    }

    /// Removes every record. Keeps going past individual failures and
    /// returns how many were actually removed.
    pub fn clear(&self) -> usize {
        let keys = match self.backend.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                tracing::warn!(error = %e, "cache clearing failed");
                return 0;
            }
        };

        let mut removed = 0;
        for key in &keys {
            match self.backend.delete(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    AtomicStats::bump(&self.stats.errors);
                    tracing::warn!(error = %e, key = %key, "failed to remove cache record");
                }
            }
        }
        tracing::info!(removed, "cleared cache");
        removed
    }

    /// On-disk statistics. Errors are returned as values, never raised.
    pub fn stats(&self) -> Result<DirectoryStats, CacheError> {
        self.backend.stats()
    }

    /// Hit/miss/store counters for this process.
    pub fn counters(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

static GLOBAL_CACHE: Lazy<Arc<CacheManager>> =
    Lazy::new(|| Arc::new(CacheManager::from_config(&CacheConfig::from_env())));

/// Process-wide cache, built from the environment on first use.
pub fn global() -> Arc<CacheManager> {
    GLOBAL_CACHE.clone()
}

fn absolutize(path: &Path) -> Result<PathBuf, CacheError> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    let cwd = std::env::current_dir().map_err(|e| CacheError::io(path, e))?;
    Ok(normalize_path(&cwd.join(path)))
}
