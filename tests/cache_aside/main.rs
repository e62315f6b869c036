//! Cache-Aside Test Suite
//!
//! Stampede protection, lock granularity and eviction ordering, exercised
//! through the guard facade over the in-memory cache.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test cache_aside
//! cargo test --test cache_aside stampede::
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use txguard::concurrency::KeyLockRegistry;
use txguard::prelude::*;
use txguard::storage::{MemoryCache, MemoryDatabase, MemoryPool};

// Test modules
pub mod eviction;
pub mod stampede;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Guard with its own cache and lock registry, so tests never share state
pub fn create_guard() -> (Guard<MemoryPool>, Arc<MemoryCache>) {
    create_guard_with(GuardConfig::default(), MetadataRegistry::new())
}

/// Guard with the given configuration and operation settings
pub fn create_guard_with(
    config: GuardConfig,
    registry: MetadataRegistry,
) -> (Guard<MemoryPool>, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let guard = Guard::builder(MemoryPool::new(Arc::new(MemoryDatabase::new())))
        .config(config)
        .metadata(Arc::new(registry))
        .cache_store(cache.clone())
        .lock_registry(Arc::new(KeyLockRegistry::new()))
        .build()
        .unwrap();
    (guard, cache)
}

/// Producer call counter
#[derive(Default)]
pub struct Calls(AtomicUsize);

impl Calls {
    /// Record one call
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Calls so far
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
