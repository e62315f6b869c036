//! Transaction Propagation Test Suite
//!
//! End-to-end scenarios for the transaction executor running against the
//! in-memory reference pool.
//!
//! ## Key Verification Points
//!
//! 1. Nested calls join the outer transaction and see the same resource
//! 2. Isolation only ever increases along a call chain
//! 3. Every exit path commits or rolls back exactly once and releases
//! 4. Propagation policies decide which calls are wrapped
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test transactions
//! cargo test --test transactions nesting::
//! ```

use std::sync::Arc;

use txguard::prelude::*;
use txguard::storage::{MemoryDatabase, MemoryPool};

pub mod isolation;
pub mod nesting;
pub mod propagation;
pub mod rollback;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Create a pool over an empty database
pub fn create_pool() -> MemoryPool {
    MemoryPool::new(Arc::new(MemoryDatabase::new()))
}

/// Create a guard and keep a handle on its pool for assertions
pub fn create_guard() -> (Guard<MemoryPool>, MemoryPool) {
    let pool = create_pool();
    let guard = Guard::new(pool.clone());
    (guard, pool)
}

/// Assert that every acquired connection was handed back
pub fn assert_no_leak(pool: &MemoryPool) {
    assert_eq!(
        pool.stats().open(),
        0,
        "{} connection(s) not released",
        pool.stats().open()
    );
}
