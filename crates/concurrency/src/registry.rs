//! Per-key lock registry for cache production
//!
//! Replaces a global production lock with one lock per cache key, so
//! production for unrelated keys never contends.
//!
//! # Design
//!
//! - DashMap: sharded, concurrent reads of existing locks
//! - Insert-if-absent via `entry().or_insert_with()`: racing first accesses
//!   all end up with the same `Arc<KeyLock>`
//! - Locks are never removed; keys are expected to have bounded cardinality
//!
//! parking_lot mutexes do not poison, so a producer that fails or panics
//! while holding a lock leaves it usable for the next caller.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use txguard_core::LockGranularity;

/// Registry key: a namespace, optionally narrowed to one entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    namespace: String,
    entry: Option<String>,
}

impl LockKey {
    /// Key covering a whole namespace
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entry: None,
        }
    }

    /// Key covering one entry of a namespace
    pub fn entry(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entry: Some(key.into()),
        }
    }

    /// Key for a cache entry at the given granularity
    pub fn for_granularity(granularity: LockGranularity, namespace: &str, key: &str) -> Self {
        match granularity {
            LockGranularity::Namespace => Self::namespace(namespace),
            LockGranularity::Entry => Self::entry(namespace, key),
        }
    }

    /// Namespace part
    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    /// Entry part, `None` for namespace-wide keys
    pub fn entry_name(&self) -> Option<&str> {
        self.entry.as_deref()
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}/{}", self.namespace, entry),
            None => write!(f, "{}", self.namespace),
        }
    }
}

/// Reusable mutual-exclusion lock for one registry key
#[derive(Default)]
pub struct KeyLock {
    mutex: Mutex<()>,
}

impl KeyLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held; released when the guard drops
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock()
    }

    /// Take the lock if it is free
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.mutex.try_lock()
    }

    /// Check if someone holds the lock
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

impl fmt::Debug for KeyLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Concurrent map from key to lock
///
/// # Thread Safety
///
/// All operations are thread-safe. Two callers asking for the same key
/// always receive the identical lock instance, even when both are the first
/// to ask.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    locks: DashMap<LockKey, Arc<KeyLock>>,
}

static GLOBAL: Lazy<Arc<KeyLockRegistry>> = Lazy::new(|| Arc::new(KeyLockRegistry::new()));

impl KeyLockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    ///
    /// Executors that share a cache store must share a registry, otherwise
    /// each serializes production only among its own callers.
    pub fn global() -> Arc<KeyLockRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Get the lock for `key`, creating it on first access
    ///
    /// Existing locks are found through a shared read; only the first
    /// access to a key takes the shard's write lock.
    ///
    /// Locks are never removed, so the registry holds one entry per distinct
    /// key ever acquired.
    pub fn acquire(&self, key: &LockKey) -> Arc<KeyLock> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::trace!(key = %key, "Created cache production lock");
                Arc::new(KeyLock::new())
            });
        Arc::clone(lock.value())
    }

    /// Check if a lock exists for `key`
    pub fn contains(&self, key: &LockKey) -> bool {
        self.locks.contains_key(key)
    }

    /// Number of locks created so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no lock was created yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
