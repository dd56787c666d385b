//! Keyed stage-output cache with per-entry TTL and an aggregate byte budget.
//!
//! Entries expire after their TTL independent of size pressure. When a `set`
//! pushes the aggregate serialized size over the configured budget, entries
//! are evicted oldest-by-remaining-TTL (earliest expiry deadline first)
//! until the cache is back under budget.
//!
//! Cache failures never propagate: a serialization problem degrades the
//! operation to a miss or no-op with a log line, and a disabled cache
//! behaves as permanently empty.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub approx_size_bytes: usize,
    pub max_size_bytes: usize,
}

struct CacheEntry {
    value: Value,
    size_bytes: usize,
    expires_at: Instant,
}

pub struct StageCache {
    enabled: bool,
    max_bytes: usize,
    default_ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    current_bytes: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StageCache {
    pub fn new(enabled: bool, max_bytes: usize, default_ttl: Duration) -> Self {
        Self {
            enabled,
            max_bytes,
            default_ttl,
            entries: RwLock::new(HashMap::new()),
            current_bytes: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.cache_enabled,
            config.cache_max_bytes,
            config.cache_default_ttl,
        )
    }

    /// Look up a key, dropping it on the way if its TTL has lapsed.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                if let Some(expired) = entries.remove(key) {
                    self.current_bytes
                        .fetch_sub(expired.size_bytes, Ordering::Relaxed);
                    debug!("cache entry `{key}` expired");
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value under `key` with an optional per-entry TTL.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }

        let size_bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes.len(),
            Err(err) => {
                warn!("cache set for `{key}` skipped, value not serializable: {err}");
                return;
            }
        };

        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                size_bytes,
                expires_at,
            },
        ) {
            self.current_bytes
                .fetch_sub(previous.size_bytes, Ordering::Relaxed);
        }
        self.current_bytes.fetch_add(size_bytes, Ordering::Relaxed);

        self.evict_over_budget(&mut entries);
    }

    pub async fn delete(&self, key: &str) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.write().await;
        if let Some(removed) = entries.remove(key) {
            self.current_bytes
                .fetch_sub(removed.size_bytes, Ordering::Relaxed);
        }
    }

    pub async fn has(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let entries = self.entries.read().await;
        entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    pub async fn stats(&self) -> CacheStats {
        let mut entries = self.entries.write().await;
        self.sweep_expired(&mut entries);
        CacheStats {
            count: entries.len(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            approx_size_bytes: self.current_bytes.load(Ordering::Relaxed),
            max_size_bytes: self.max_bytes,
        }
    }

    /// Drop every entry whose TTL has lapsed, releasing its budget share.
    fn sweep_expired(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            if let Some(removed) = entries.remove(&key) {
                self.current_bytes
                    .fetch_sub(removed.size_bytes, Ordering::Relaxed);
                debug!("cache entry `{key}` expired");
            }
        }
    }

    /// Evict entries with the earliest expiry deadline until under budget.
    /// Expired entries are reclaimed first.
    fn evict_over_budget(&self, entries: &mut HashMap<String, CacheEntry>) {
        self.sweep_expired(entries);
        while self.current_bytes.load(Ordering::Relaxed) > self.max_bytes {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else {
                break;
            };
            if let Some(evicted) = entries.remove(&key) {
                self.current_bytes
                    .fetch_sub(evicted.size_bytes, Ordering::Relaxed);
                debug!("cache evicted `{key}` ({} bytes) over budget", evicted.size_bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(max_bytes: usize) -> StageCache {
        StageCache::new(true, max_bytes, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache(1024 * 1024);
        cache.set("a", json!({"x": 1}), None).await;
        assert_eq!(cache.get("a").await, Some(json!({"x": 1})));
        assert!(cache.has("a").await);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = cache(1024 * 1024);
        cache
            .set("short", json!("v"), Some(Duration::from_millis(50)))
            .await;
        assert!(cache.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("short").await.is_none());
        assert!(!cache.has("short").await);

        // Expired entry must release its share of the budget
        assert_eq!(cache.stats().await.approx_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_size_eviction_oldest_first() {
        let cache = cache(60);
        let payload = json!("xxxxxxxxxxxxxxxxxxxx"); // 22 bytes serialized

        // Stagger TTLs so "a" has the earliest deadline
        cache.set("a", payload.clone(), Some(Duration::from_secs(10))).await;
        cache.set("b", payload.clone(), Some(Duration::from_secs(20))).await;
        cache.set("c", payload.clone(), Some(Duration::from_secs(30))).await;

        let stats = cache.stats().await;
        assert!(stats.approx_size_bytes <= 60, "over budget: {stats:?}");
        assert!(!cache.has("a").await, "oldest entry should be evicted");
        assert!(cache.has("c").await, "newest entry should survive");
    }

    #[tokio::test]
    async fn test_stats_reclaims_expired_entries() {
        let cache = cache(1024);
        cache
            .set("gone", json!("expired soon"), Some(Duration::from_millis(30)))
            .await;
        cache.set("stays", json!("long lived"), None).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        // No get on "gone"; stats alone must reclaim it
        let stats = cache.stats().await;
        assert_eq!(stats.count, 1);
        let live = serde_json::to_vec(&json!("long lived")).unwrap().len();
        assert_eq!(stats.approx_size_bytes, live);
        assert!(cache.has("stays").await);
    }

    #[tokio::test]
    async fn test_disabled_cache_behaves_empty() {
        let cache = StageCache::new(false, 1024, Duration::from_secs(60));
        cache.set("a", json!(1), None).await;
        assert!(cache.get("a").await.is_none());
        assert!(!cache.has("a").await);
        cache.delete("a").await;

        let stats = cache.stats().await;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let cache = cache(1024);
        cache.set("a", json!([1, 2, 3]), None).await;
        assert!(cache.get("a").await.is_some());
        cache.delete("a").await;
        assert!(cache.get("a").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.approx_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_size() {
        let cache = cache(1024);
        cache.set("a", json!("aaaaaaaaaa"), None).await;
        let before = cache.stats().await.approx_size_bytes;
        cache.set("a", json!("bb"), None).await;
        let after = cache.stats().await.approx_size_bytes;
        assert!(after < before);
        assert_eq!(cache.stats().await.count, 1);
    }
}
