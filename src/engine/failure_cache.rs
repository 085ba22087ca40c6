//! Short-TTL record of recently-failed video IDs.
//!
//! Purely an optimization to short-circuit repeat work, never a correctness
//! mechanism: a TTL of zero disables it entirely, and `force_retry` bypasses
//! it per call.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

pub struct FailureCache {
    ttl: ChronoDuration,
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl FailureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Timestamp of a non-expired failure for this video, if any.
    ///
    /// Reads never take the write lock; expired entries are reported as
    /// absent here and physically pruned by the next `put`.
    pub fn get(&self, video_id: &str) -> Option<DateTime<Utc>> {
        if self.ttl.is_zero() {
            return None;
        }

        let entries = self.read_entries();
        let recorded = *entries.get(video_id)?;
        if Utc::now().signed_duration_since(recorded) < self.ttl {
            Some(recorded)
        } else {
            None
        }
    }

    /// Record that every strategy failed for this video just now.
    pub fn put(&self, video_id: &str) {
        if self.ttl.is_zero() {
            return;
        }

        let now = Utc::now();
        let mut entries = self.write_entries();
        entries.retain(|_, recorded| now.signed_duration_since(*recorded) < self.ttl);
        entries.insert(video_id.to_string(), now);
    }

    /// Drop a single entry, e.g. after an explicit retry succeeded.
    pub fn invalidate(&self, video_id: &str) {
        self.write_entries().remove(video_id);
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let cache = FailureCache::new(Duration::from_secs(3600));
        assert!(cache.get("vid_one_0001").is_none());

        cache.put("vid_one_0001");
        assert!(cache.get("vid_one_0001").is_some());
        assert!(cache.get("vid_two_0002").is_none());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = FailureCache::new(Duration::ZERO);
        cache.put("vid_one_0001");
        assert!(cache.get("vid_one_0001").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_reported_absent() {
        let cache = FailureCache::new(Duration::from_millis(10));
        cache.put("vid_one_0001");
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("vid_one_0001").is_none());
    }

    #[test]
    fn test_put_prunes_expired_entries() {
        let cache = FailureCache::new(Duration::from_millis(10));
        cache.put("vid_one_0001");
        std::thread::sleep(Duration::from_millis(25));
        cache.put("vid_two_0002");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = FailureCache::new(Duration::from_secs(3600));
        cache.put("vid_one_0001");
        cache.invalidate("vid_one_0001");
        assert!(cache.get("vid_one_0001").is_none());
    }
}
