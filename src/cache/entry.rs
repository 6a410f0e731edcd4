//! Cached records and their validity rules.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::key::CacheParams;

/// Fixed validity window of a record: 30 days.
pub const ENTRY_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// One serialized cache record.
///
/// Written once and never patched; a later `put` for the same key replaces
/// the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Absolute path of the source file. Diagnostics only.
    pub source_identity: String,
    /// SHA-256 hex of the source bytes at write time.
    pub content_hash: String,
    pub operation: String,
    pub parameters: CacheParams,
    pub payload: String,
    /// Seconds since the Unix epoch.
    pub created_at: f64,
    pub size_at_write: u64,
    /// Seconds since the Unix epoch; informational.
    pub mtime_at_write: f64,
}

/// Outcome of checking a record against the live file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Fresh,
    /// Content hash no longer matches the file.
    Stale,
    /// Older than [`ENTRY_TTL`].
    Expired,
}

impl CacheEntry {
    /// Age of the record at `now`. Records stamped in the future count as age zero.
    pub fn age_at(&self, now: f64) -> Duration {
        let secs = (now - self.created_at).max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    pub fn is_expired_at(&self, now: f64) -> bool {
        self.age_at(now) > ENTRY_TTL
    }

    /// Applies the retrieval rule: the hash must match and the age must be
    /// within the TTL. The hash is checked first.
    pub fn validate(&self, current_hash: &str, now: f64) -> Validity {
        if self.content_hash != current_hash {
            Validity::Stale
        } else if self.is_expired_at(now) {
            Validity::Expired
        } else {
            Validity::Fresh
        }
    }
}

/// Current wall-clock time as fractional epoch seconds.
pub fn unix_now() -> f64 {
    system_time_secs(SystemTime::now())
}

pub(crate) fn system_time_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: f64) -> CacheEntry {
        CacheEntry {
            source_identity: "/img/a.png".into(),
            content_hash: "abc".into(),
            operation: "describe".into(),
            parameters: CacheParams::new().with("prompt", "x"),
            payload: "hello".into(),
            created_at,
            size_at_write: 2,
            mtime_at_write: created_at,
        }
    }

    #[test]
    fn fresh_when_hash_matches_and_young() {
        let now = 1_000_000_000.0;
        assert_eq!(entry(now - 60.0).validate("abc", now), Validity::Fresh);
    }

    #[test]
    fn stale_beats_expired() {
        let now = 1_000_000_000.0;
        let old = entry(now - ENTRY_TTL.as_secs_f64() * 2.0);
        assert_eq!(old.validate("other", now), Validity::Stale);
    }

    #[test]
    fn expired_past_ttl() {
        let now = 1_000_000_000.0;
        let e = entry(now - ENTRY_TTL.as_secs_f64() - 1.0);
        assert_eq!(e.validate("abc", now), Validity::Expired);
    }

    #[test]
    fn exactly_ttl_is_still_fresh() {
        let now = 1_000_000_000.0;
        let e = entry(now - ENTRY_TTL.as_secs_f64());
        assert_eq!(e.validate("abc", now), Validity::Fresh);
    }

    #[test]
    fn future_timestamp_is_not_expired() {
        let now = 1_000_000_000.0;
        assert_eq!(entry(now + 3600.0).age_at(now), Duration::ZERO);
    }

    #[test]
    fn serialized_fields() {
        let json = serde_json::to_value(entry(10.0)).unwrap();
        let obj = json.as_object().unwrap();
        for field in [
            "source_identity",
            "content_hash",
            "operation",
            "parameters",
            "payload",
            "created_at",
            "size_at_write",
            "mtime_at_write",
        ] {
            assert!(obj.contains_key(field), "missing {field}");
        }
        assert_eq!(obj.len(), 8);
        assert_eq!(json["parameters"]["prompt"], "x");
    }
}
