//! Key/value store for scrape results with per-entry expiry.
//!
//! Entries are only evicted when a read finds them expired; there is no
//! background sweep, so the key space is expected to stay small (one key per
//! dataset). Build one instance at start-up and share it behind an `Arc`.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let timestamp = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| timestamp.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            timestamp,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub is_cached: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
}

pub struct Cache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    default_ttl: Duration,
}

impl<T: Clone> Cache<T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key` for the default TTL, replacing any
    /// existing entry.
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        log::debug!("Caching '{}' for {:?}", key, ttl);
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let value = self.read(key, |entry| entry.value.clone());
        log::debug!(
            "Cache {} for '{}'",
            if value.is_some() { "hit" } else { "miss" },
            key
        );
        value
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Like [`Cache::get`], expired entries are evicted by this call.
    pub fn status(&self, key: &str) -> CacheStatus {
        let now = Utc::now();
        self.read(key, |entry| CacheStatus {
            is_cached: true,
            last_updated: Some(entry.timestamp),
            expires_at: Some(entry.expires_at),
            age_secs: Some((now - entry.timestamp).num_seconds()),
        })
        .unwrap_or_default()
    }

    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    fn read<R>(&self, key: &str, f: impl FnOnce(&CacheEntry<T>) -> R) -> Option<R> {
        let now = Utc::now();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            log::debug!("Evicted expired cache entry '{}'", key);
            return None;
        }

        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| f(entry.value()))
    }
}

impl<T: Clone> Default for Cache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T> Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const SHORT_TTL: Duration = Duration::from_millis(20);

    fn wait_past(ttl: Duration) {
        thread::sleep(ttl + Duration::from_millis(30));
    }

    #[test]
    fn test_set_then_get() {
        let cache = Cache::default();
        cache.set("stocking:recent", vec![1, 2, 3]);

        assert_eq!(cache.get("stocking:recent"), Some(vec![1, 2, 3]));
        assert!(cache.has("stocking:recent"));
        assert_eq!(cache.get("stocking:backfill"), None);
        assert_eq!(cache.default_ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = Cache::default();
        cache.set("k", "v1");
        cache.set("k", "v2");

        assert_eq!(cache.get("k"), Some("v2"));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = Cache::default();
        cache.set_with_ttl("k", 42, SHORT_TTL);
        assert_eq!(cache.get("k"), Some(42));

        wait_past(SHORT_TTL);

        assert_eq!(cache.get("k"), None);
        assert!(!cache.status("k").is_cached);
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_status_reports_entry_times() {
        let cache = Cache::new(Duration::from_secs(90));
        assert_eq!(cache.status("k"), CacheStatus::default());

        cache.set("k", ());
        let status = cache.status("k");

        assert!(status.is_cached);
        let last_updated = status.last_updated.expect("last updated");
        let expires_at = status.expires_at.expect("expires at");
        assert_eq!((expires_at - last_updated).num_seconds(), 90);
        assert_eq!(status.age_secs, Some(0));
    }

    #[test]
    fn test_status_evicts_expired_entry() {
        let cache = Cache::default();
        cache.set_with_ttl("k", 1, SHORT_TTL);

        wait_past(SHORT_TTL);

        assert!(!cache.status("k").is_cached);
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn test_clear_and_clear_all() {
        let cache = Cache::default();
        cache.set("a", 1);
        cache.set("b", 2);

        cache.clear("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear_all();
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let cache = Cache::default();
        cache.set_with_ttl("k", 1, Duration::MAX);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_shared_between_threads() {
        let cache = Arc::new(Cache::default());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.set(format!("layer:{i}"), i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4 {
            assert_eq!(cache.get(&format!("layer:{i}")), Some(i));
        }
    }
}
