//! Cache store contract
//!
//! Stores hold JSON values grouped by namespace. Expiry is the store's
//! business: an expired entry must read as absent.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Default time-to-live for cached values: one hour
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// How finely concurrent cache production is serialized
///
/// With `Entry`, producers for different keys of one namespace run in
/// parallel. With `Namespace`, every miss in a namespace waits for the
/// production in flight, whichever key it is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockGranularity {
    /// One lock per namespace
    Namespace,
    /// One lock per namespace and key
    #[default]
    Entry,
}

/// A namespaced key-value cache with per-entry time-to-live
pub trait CacheStore: Send + Sync {
    /// Read an entry. Absent and expired entries both return `None`.
    fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Value>>;

    /// Store an entry that expires after `ttl`
    fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> CacheResult<()>;

    /// Remove a single entry
    fn remove(&self, namespace: &str, key: &str) -> CacheResult<()>;

    /// Remove every entry of a namespace
    fn remove_all(&self, namespace: &str) -> CacheResult<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Value>> {
        (**self).get(namespace, key)
    }

    fn put(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        (**self).put(namespace, key, value, ttl)
    }

    fn remove(&self, namespace: &str, key: &str) -> CacheResult<()> {
        (**self).remove(namespace, key)
    }

    fn remove_all(&self, namespace: &str) -> CacheResult<()> {
        (**self).remove_all(namespace)
    }
}
