//! In-process cache store
//!
//! DashMap keyed by namespace, FxHashMap within. Reads take only the
//! namespace shard's read lock; writes lock only the target namespace, so
//! different namespaces never contend.
//!
//! Expiry is lazy: an expired entry reads as absent. A namespace sweeps its
//! expired entries on a write once it has doubled in size since its last
//! sweep, which keeps writes amortized O(1); [`MemoryCache::purge_expired`]
//! sweeps everything on demand.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::time::{Duration, Instant};
use txguard_core::{CacheResult, CacheStore};

/// Cached value with its deadline
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Smallest namespace size that triggers a sweep on write
const MIN_SWEEP_LEN: usize = 64;

/// Entries of one namespace
#[derive(Debug)]
struct Shard {
    data: FxHashMap<String, CacheEntry>,
    sweep_at: usize,
}

impl Default for Shard {
    fn default() -> Self {
        Self {
            data: FxHashMap::default(),
            sweep_at: MIN_SWEEP_LEN,
        }
    }
}

impl Shard {
    fn live_len(&self, now: Instant) -> usize {
        self.data.values().filter(|entry| entry.is_live(now)).count()
    }

    fn purge(&mut self, now: Instant) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| entry.is_live(now));
        self.sweep_at = (self.data.len() * 2).max(MIN_SWEEP_LEN);
        before - self.data.len()
    }

    fn insert(&mut self, key: String, entry: CacheEntry, now: Instant) {
        if self.data.len() >= self.sweep_at {
            self.purge(now);
        }
        self.data.insert(key, entry);
    }
}

/// Process-local [`CacheStore`]
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use txguard_core::CacheStore;
/// use txguard_storage::MemoryCache;
///
/// let cache = MemoryCache::new();
/// cache.put("users", "42", serde_json::json!({"id": 42}), Duration::from_secs(60)).unwrap();
/// assert!(cache.get("users", "42").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    shards: DashMap<String, Shard>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with room for `namespaces` namespaces
    pub fn with_capacity(namespaces: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(namespaces),
        }
    }

    /// Number of live entries in a namespace
    pub fn namespace_len(&self, namespace: &str) -> usize {
        let now = Instant::now();
        self.shards
            .get(namespace)
            .map(|shard| shard.live_len(now))
            .unwrap_or(0)
    }

    /// Number of namespaces holding entries (live or not yet purged)
    pub fn namespace_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of live entries across all namespaces
    pub fn total_entries(&self) -> usize {
        let now = Instant::now();
        self.shards.iter().map(|shard| shard.live_len(now)).sum()
    }

    /// Drop every expired entry; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let purged: usize = self
            .shards
            .iter_mut()
            .map(|mut shard| shard.purge(now))
            .sum();
        self.shards.retain(|_, shard| !shard.data.is_empty());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        purged
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Value>> {
        let now = Instant::now();
        Ok(self.shards.get(namespace).and_then(|shard| {
            shard
                .data
                .get(key)
                .filter(|entry| entry.is_live(now))
                .map(|entry| entry.value.clone())
        }))
    }

    fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64));
        let mut shard = self.shards.entry(namespace.to_string()).or_default();
        shard.insert(key.to_string(), CacheEntry { value, expires_at }, now);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> CacheResult<()> {
        if let Some(mut shard) = self.shards.get_mut(namespace) {
            shard.data.remove(key);
        }
        Ok(())
    }

    fn remove_all(&self, namespace: &str) -> CacheResult<()> {
        self.shards.remove(namespace);
        Ok(())
    }
}
