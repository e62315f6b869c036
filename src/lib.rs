//! # txguard
//!
//! Transaction propagation and stampede-safe cache-aside for data-access calls.
//!
//! txguard wraps calls to a database in two guards:
//!
//! - **Transactions**: the outermost call on a call chain acquires a resource,
//!   begins a transaction and finishes it; nested calls join it. Commit,
//!   rollback and release happen on every exit path.
//! - **Cache-aside**: cached reads use double-checked locking so at most one
//!   producer per key runs at a time.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use txguard::prelude::*;
//! use txguard::storage::{MemoryCache, MemoryDatabase, MemoryPool};
//!
//! let pool = MemoryPool::new(Arc::new(MemoryDatabase::new()));
//! let guard = Guard::builder(pool)
//!     .cache_store(Arc::new(MemoryCache::new()))
//!     .build()?;
//!
//! // Transactions
//! let ctx = guard.context();
//! guard.run(&ctx, IsolationLevel::Serializable, |ctx| {
//!     let conn = ctx.resource().unwrap();
//!     conn.write("account:1", json!(100))
//! })?;
//!
//! // Cache-aside
//! let total: u64 = guard.get_or_compute("reports", "total", None, || Ok::<_, Error>(100))?;
//! assert_eq!(total, 100);
//! # Ok::<(), txguard::Error>(())
//! ```
//!
//! ## Configuration
//!
//! Per-operation settings (cache namespace, key, ttl, isolation, evicted
//! namespaces) are registered in code through [`MetadataRegistry`] or loaded
//! from TOML with [`GuardConfig`].

#![warn(missing_docs)]

mod error;
mod guard;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use guard::{Guard, GuardBuilder};

// Re-export component crates
pub use txguard_concurrency as concurrency;
pub use txguard_engine as engine;
pub use txguard_storage as storage;

// Re-export core types
pub use txguard_core::{
    hash_args, operation_key, split_namespaces, CacheConfig, CacheError, CacheStore, ConfigError, GuardConfig,
    IsolationLevel, LockGranularity, MetadataProvider, MetadataRegistry, OperationConfig,
    OperationId, Resource, ResourceError, ResourcePool, TypeConfig, DEFAULT_TTL,
};
pub use txguard_engine::{
    envelope_policy, install_finalize_policy, CacheAside, Decision, FinalizePolicy,
    MethodNamePolicy, MethodPatternPolicy, Outcome, PropagationPolicy, TransactionExecutor,
    TxContext, TxError,
};
