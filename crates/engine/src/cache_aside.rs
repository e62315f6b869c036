//! Stampede-safe cache-aside
//!
//! [`CacheAside::get_or_compute`] returns a cached value when there is one
//! and otherwise produces, stores and returns it. Production is serialized
//! per lock key with double-checked locking:
//!
//! 1. Read the store; a hit returns without locking
//! 2. On a miss, take the lock for the key
//! 3. Read again; another caller may have produced the value meanwhile
//! 4. Still missing: run the producer and store its value
//!
//! The cache is a performance layer only. Store failures and entries that no
//! longer decode are logged and handled as misses, and a value that cannot be
//! stored is still returned to the caller.
//!
//! A producer must not call back into production of its own key: the lock
//! is not reentrant and the call would deadlock.
//!
//! Lock registry entries are never removed. With [`LockGranularity::Entry`]
//! every distinct key gets its own lock, and keys derived from arguments
//! grow the registry with every distinct argument tuple. Operations whose
//! arguments are unbounded should use [`LockGranularity::Namespace`] or a
//! fixed `cache_key`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use txguard_concurrency::{KeyLockRegistry, LockKey};
use txguard_core::{
    resolve_target, split_namespaces, CacheStore, LockGranularity, MetadataProvider, NoMetadata,
    OperationId, DEFAULT_TTL,
};

/// Cache-aside executor over a [`CacheStore`]
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use txguard_engine::CacheAside;
/// use txguard_storage::MemoryCache;
///
/// let cache = CacheAside::new(Arc::new(MemoryCache::new()));
///
/// let first: Result<u64, ()> = cache.get_or_compute("squares", "12", None, || Ok(144));
/// let second: Result<u64, ()> = cache.get_or_compute("squares", "12", None, || Ok(0));
/// assert_eq!(first, Ok(144));
/// assert_eq!(second, Ok(144));
/// ```
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    locks: Arc<KeyLockRegistry>,
    granularity: LockGranularity,
    default_ttl: Duration,
    metadata: Arc<dyn MetadataProvider>,
}

impl CacheAside {
    /// Cache-aside over `store`, sharing the process-wide lock registry
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            locks: KeyLockRegistry::global(),
            granularity: LockGranularity::default(),
            default_ttl: DEFAULT_TTL,
            metadata: Arc::new(NoMetadata),
        }
    }

    /// Serialize production per namespace or per entry
    pub fn with_granularity(mut self, granularity: LockGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Time-to-live for values stored without an explicit one
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Settings provider for [`get_or_compute_for`](Self::get_or_compute_for)
    /// and [`evict_for`](Self::evict_for)
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Use a private lock registry instead of the process-wide one
    pub fn with_lock_registry(mut self, locks: Arc<KeyLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// The registry serializing production
    pub fn lock_registry(&self) -> &Arc<KeyLockRegistry> {
        &self.locks
    }

    /// Lock granularity in use
    pub fn granularity(&self) -> LockGranularity {
        self.granularity
    }

    /// Default time-to-live
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the cached value for `key` in `namespace`, producing it on a miss
    ///
    /// At most one producer runs at a time per lock key. Callers arriving
    /// during production wait and then read the produced value. A producer
    /// error is returned unchanged and nothing is stored; the next caller
    /// produces again.
    pub fn get_or_compute<T, E, F>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.lookup(namespace, key) {
            tracing::trace!(namespace, key, "Cache hit");
            return Ok(value);
        }

        let lock = self
            .locks
            .acquire(&LockKey::for_granularity(self.granularity, namespace, key));
        let _held = lock.lock();

        if let Some(value) = self.lookup(namespace, key) {
            tracing::debug!(namespace, key, "Cache filled while waiting for production lock");
            return Ok(value);
        }

        tracing::debug!(namespace, key, "Cache miss, producing value");
        let value = producer()?;
        self.store_value(namespace, key, &value, ttl.unwrap_or(self.default_ttl));
        Ok(value)
    }

    /// [`get_or_compute`](Self::get_or_compute) for a registered operation
    ///
    /// Namespace, key and ttl come from the operation's cache settings.
    /// Unset namespace defaults to `Owner.method`, unset key to a hash of the
    /// operation and `args`. If `args` cannot be encoded and no key is configured, the
    /// producer runs without the cache.
    pub fn get_or_compute_for<A, T, E, F>(
        &self,
        operation: &OperationId,
        args: &A,
        producer: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        let config = self.metadata.cache_config(operation);
        match resolve_target(operation, config.as_ref(), args, self.default_ttl) {
            Ok(target) => {
                self.get_or_compute(&target.namespace, &target.key, Some(target.ttl), producer)
            }
            Err(e) => {
                tracing::warn!(operation = %operation, error = %e, "Cannot derive cache key, bypassing cache");
                producer()
            }
        }
    }

    /// Cached value of a registered operation, without producing or locking
    ///
    /// Returns `None` on a miss, a store failure, an undecodable entry or
    /// arguments that cannot be encoded.
    pub fn peek_for<A, T>(&self, operation: &OperationId, args: &A) -> Option<T>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let config = self.metadata.cache_config(operation);
        let target = resolve_target(operation, config.as_ref(), args, self.default_ttl).ok()?;
        self.lookup(&target.namespace, &target.key)
    }

    /// Run `op`, then clear every namespace in `namespaces` if it succeeded
    ///
    /// Each item may be a comma-delimited list. Nothing is evicted when `op`
    /// fails. Eviction failures are logged and do not change the result.
    pub fn evict<'a, I, T, E, F>(&self, namespaces: I, op: F) -> Result<T, E>
    where
        I: IntoIterator<Item = &'a str>,
        F: FnOnce() -> Result<T, E>,
    {
        let value = op()?;
        for namespace in split_namespaces(namespaces) {
            match self.store.remove_all(namespace) {
                Ok(()) => tracing::debug!(namespace, "Evicted cache namespace"),
                Err(e) => tracing::error!(namespace, error = %e, "Failed to evict cache namespace"),
            }
        }
        Ok(value)
    }

    /// [`evict`](Self::evict) with the namespaces registered for `operation`
    pub fn evict_for<T, E, F>(&self, operation: &OperationId, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let namespaces = self.metadata.evict_namespaces(operation);
        self.evict(namespaces.iter().map(String::as_str), op)
    }

    fn lookup<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        match self.store.get(namespace, key) {
            Ok(Some(raw)) => match serde_json::from_value(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(namespace, key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(namespace, key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn store_value<T: Serialize>(&self, namespace: &str, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(namespace, key, error = %e, "Produced value is not cacheable");
                return;
            }
        };
        if let Err(e) = self.store.put(namespace, key, raw, ttl) {
            tracing::warn!(namespace, key, error = %e, "Cache write failed");
        }
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("granularity", &self.granularity)
            .field("default_ttl", &self.default_ttl)
            .field("locks", &self.locks.len())
            .finish()
    }
}
