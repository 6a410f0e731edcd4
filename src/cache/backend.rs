//! Cache backend implementations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::entry::CacheEntry;
use super::error::CacheError;
use super::key::{CacheKey, RECORD_EXT};

/// Aggregate view of a backend's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryStats {
    pub directory: PathBuf,
    pub file_count: usize,
    pub total_bytes: u64,
}

impl DirectoryStats {
    /// Total size in MiB, rounded to two decimals.
    pub fn total_size_mb(&self) -> f64 {
        (self.total_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Record storage used by [`CacheManager`](super::CacheManager).
///
/// Implementations report failures as [`CacheError`]; turning those into
/// misses is the manager's job.
pub trait CacheBackend: Send + Sync {
    /// Loads a record. An absent record is `Ok(None)`.
    fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;
    /// Stores a record, replacing any previous one for the key.
    fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError>;
    /// Removes a record. Returns whether something was removed.
    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;
    /// Keys of every stored record.
    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError>;
    fn stats(&self) -> Result<DirectoryStats, CacheError>;
    fn name(&self) -> &'static str;
}

/// Directory of pretty-printed JSON records, one file per key.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so readers see either the previous record or the new one.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, attempting to create the directory once.
    ///
    /// A failed creation is logged, not returned; writes retry it and fail
    /// individually if the directory stays unusable.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let store = Self { dir: dir.into() };
        if let Err(e) = store.ensure_dir() {
            tracing::warn!(error = %e, "cache directory unavailable; caching will be skipped");
        }
        store
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the cache directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))
    }

    /// Key for one directory listing entry, if it is a record. Unreadable
    /// entries are logged and skipped so one bad entry cannot hide the rest.
    fn listed_key(&self, entry: std::io::Result<fs::DirEntry>) -> Option<CacheKey> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.dir.display(), "skipping unreadable cache entry");
                return None;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            return None;
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            return None;
        }
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(CacheKey::new)
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        if !key.is_file_safe() {
            return Err(CacheError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(key.file_name()))
    }
}

impl CacheBackend for FileStore {
    fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.record_path(key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let entry = serde_json::from_str(&raw)?;
        Ok(Some(entry))
    }

    fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.record_path(key)?;
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(entry)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::io(&self.dir, e))?;
        if let Err(e) = tmp.write_all(json.as_bytes()).and_then(|_| tmp.flush()) {
            return Err(CacheError::io(tmp.path(), e));
        }
        tmp.persist(&path)
            .map_err(|e| CacheError::io(&path, e.error))?;
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };

        let mut keys: Vec<CacheKey> = entries.filter_map(|e| self.listed_key(e)).collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(keys)
    }

    fn stats(&self) -> Result<DirectoryStats, CacheError> {
        let keys = self.list_keys()?;
        let mut file_count = 0;
        let mut total_bytes = 0;
        for key in &keys {
            // Records can vanish between listing and stat; those are skipped.
            let Ok(path) = self.record_path(key) else {
                continue;
            };
            if let Ok(meta) = fs::metadata(&path) {
                file_count += 1;
                total_bytes += meta.len();
            }
        }
        Ok(DirectoryStats {
            directory: self.dir.clone(),
            file_count,
            total_bytes,
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Backend that stores nothing. Used when caching is disabled.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for NullCache {
    fn read(&self, _: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }
    fn write(&self, _: &CacheKey, _: &CacheEntry) -> Result<(), CacheError> {
        Ok(())
    }
    fn delete(&self, _: &CacheKey) -> Result<bool, CacheError> {
        Ok(false)
    }
    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        Ok(Vec::new())
    }
    fn stats(&self) -> Result<DirectoryStats, CacheError> {
        Ok(DirectoryStats {
            directory: PathBuf::new(),
            file_count: 0,
            total_bytes: 0,
        })
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
