//! Two-level cache store
//!
//! Combines a fast near cache (L1, typically [`MemoryCache`](crate::MemoryCache))
//! with a shared far cache (L2, typically an external cache server).
//!
//! | Operation | L1 | L2 |
//! |-----------|----|----|
//! | get | read first | read on L1 miss, backfill L1 |
//! | put | write second | write first (authoritative) |
//! | remove / remove_all | yes | yes |
//!
//! L1 failures are logged and never fail the call; L2 failures are returned.

use serde_json::Value;
use std::time::Duration;
use txguard_core::{CacheResult, CacheStore};

/// Default upper bound on how long a value lives in L1
///
/// An L2 hit is backfilled into L1 for the full near ttl, since the store
/// does not report how long the L2 entry has left. A backfilled copy can
/// therefore outlive its L2 entry by up to this long.
pub const DEFAULT_NEAR_TTL: Duration = Duration::from_secs(60);

/// Near/far cache pair
#[derive(Debug)]
pub struct TieredCache<L1, L2> {
    near: L1,
    far: L2,
    near_ttl: Duration,
}

impl<L1: CacheStore, L2: CacheStore> TieredCache<L1, L2> {
    /// Combine `near` and `far` with the default L1 ttl cap
    pub fn new(near: L1, far: L2) -> Self {
        Self::with_near_ttl(near, far, DEFAULT_NEAR_TTL)
    }

    /// Combine `near` and `far`; L1 copies live at most `near_ttl`
    ///
    /// A short cap bounds how long one process can serve a value that
    /// another process already evicted from L2.
    pub fn with_near_ttl(near: L1, far: L2, near_ttl: Duration) -> Self {
        Self {
            near,
            far,
            near_ttl,
        }
    }

    /// The near cache
    pub fn near(&self) -> &L1 {
        &self.near
    }

    /// The far cache
    pub fn far(&self) -> &L2 {
        &self.far
    }
}

impl<L1: CacheStore, L2: CacheStore> CacheStore for TieredCache<L1, L2> {
    fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Value>> {
        match self.near.get(namespace, key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(namespace, key, error = %e, "Near cache read failed");
            }
        }

        let found = self.far.get(namespace, key)?;
        if let Some(value) = &found {
            if let Err(e) = self.near.put(namespace, key, value.clone(), self.near_ttl) {
                tracing::warn!(namespace, key, error = %e, "Near cache backfill failed");
            }
        }
        Ok(found)
    }

    fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        self.far.put(namespace, key, value.clone(), ttl)?;
        if let Err(e) = self.near.put(namespace, key, value, ttl.min(self.near_ttl)) {
            tracing::warn!(namespace, key, error = %e, "Near cache write failed");
        }
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> CacheResult<()> {
        if let Err(e) = self.near.remove(namespace, key) {
            tracing::warn!(namespace, key, error = %e, "Near cache remove failed");
        }
        self.far.remove(namespace, key)
    }

    fn remove_all(&self, namespace: &str) -> CacheResult<()> {
        if let Err(e) = self.near.remove_all(namespace) {
            tracing::warn!(namespace, error = %e, "Near cache clear failed");
        }
        self.far.remove_all(namespace)
    }
}
