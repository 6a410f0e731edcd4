//! # Image Analysis Result Cache
//!
//! Persistent, content-addressed cache for the results of remote vision calls,
//! so that asking the same question about the same image twice costs one API
//! request.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Facade with `get`/`put`/`clear`/`stats`; never fails the caller |
//! | [`CacheConfig`] | Cache directory and on/off switch |
//! | [`CacheBackend`] | Trait for record storage |
//! | [`FileStore`] | JSON-record directory with atomic writes |
//! | [`NullCache`] | No-op backend for disabling caching |
//! | [`CacheKey`] / [`derive_key`] | Key derivation from path, operation and parameters |
//! | [`ContentHasher`] | Streaming SHA-256 of file bytes |
//!
//! ## Validity
//!
//! A record is served only while the SHA-256 of the file still matches the one
//! recorded at write time and the record is at most [`ENTRY_TTL`] (30 days)
//! old. Records failing either check are deleted when they are next read;
//! there is no background sweep and no size bound.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_vision_tools::cache::{CacheConfig, CacheManager, CacheParams};
//! use std::path::Path;
//!
//! let cache = CacheManager::from_config(&CacheConfig::from_env());
//! let params = CacheParams::new().with("prompt", "Describe this image.");
//! let image = Path::new("/images/a.png");
//!
//! if cache.get(image, "describe", &params).is_none() {
//!     let result = "a cat on a sofa"; // expensive call goes here
//!     cache.put(image, "describe", &params, result);
//! }
//! ```

mod backend;
mod entry;
mod error;
mod hasher;
mod key;
mod manager;

pub use backend::{CacheBackend, DirectoryStats, FileStore, NullCache};
pub use entry::{unix_now, CacheEntry, Validity, ENTRY_TTL};
pub use error::CacheError;
pub use hasher::ContentHasher;
pub use key::{derive_key, CacheKey, CacheParams, RECORD_EXT};
pub use manager::{global, CacheConfig, CacheManager, CacheStats, DEFAULT_CACHE_SUBDIR};
