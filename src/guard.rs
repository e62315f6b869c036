//! Main entry point for txguard.
//!
//! A [`Guard`] bundles a [`TransactionExecutor`] and a [`CacheAside`] that
//! share one set of operation settings, so a data-access call can be guarded
//! by transaction, cache and eviction in one place.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use txguard_concurrency::KeyLockRegistry;
use txguard_core::{
    CacheStore, GuardConfig, IsolationLevel, MetadataProvider, OperationId, ResourcePool,
};
use txguard_engine::{
    policy_from_config, CacheAside, FinalizePolicy, PropagationPolicy, TransactionExecutor,
    TxContext, TxError,
};
use txguard_storage::MemoryCache;

/// Transaction and cache guards for one resource pool.
///
/// Create a guard with [`Guard::new`] or [`Guard::builder`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use txguard::prelude::*;
/// use txguard::storage::{MemoryDatabase, MemoryPool};
///
/// let pool = MemoryPool::new(Arc::new(MemoryDatabase::new()));
/// let guard = Guard::new(pool.clone());
/// let ctx = guard.context();
///
/// guard
///     .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
///         let conn = ctx.resource().unwrap();
///         conn.write("user:1", json!({"name": "Alice"}))
///     })
///     .unwrap();
///
/// assert_eq!(pool.database().get("user:1"), Some(json!({"name": "Alice"})));
/// ```
pub struct Guard<P: ResourcePool> {
    executor: TransactionExecutor<P>,
    cache: CacheAside,
}

impl<P: ResourcePool> Guard<P> {
    /// Guard with default settings and an in-process cache.
    pub fn new(pool: P) -> Self {
        let executor = TransactionExecutor::new(pool);
        let cache = CacheAside::new(Arc::new(MemoryCache::new()));
        Self { executor, cache }
    }

    /// Create a builder for guard configuration.
    pub fn builder(pool: P) -> GuardBuilder<P> {
        GuardBuilder::new(pool)
    }

    /// A fresh call chain.
    pub fn context(&self) -> TxContext<P> {
        self.executor.context()
    }

    /// The transaction executor.
    pub fn executor(&self) -> &TransactionExecutor<P> {
        &self.executor
    }

    /// The cache-aside executor.
    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Run `op` in a transaction at `isolation`.
    pub fn run<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        isolation: IsolationLevel,
        op: F,
    ) -> std::result::Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> std::result::Result<T, E>,
    {
        self.executor.run(ctx, isolation, op)
    }

    /// Run `op` in a transaction if `policy` selects `method`, unwrapped otherwise.
    pub fn run_in_transaction<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        method: &str,
        policy: &dyn PropagationPolicy,
        isolation: IsolationLevel,
        op: F,
    ) -> std::result::Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> std::result::Result<T, E>,
    {
        self.executor
            .run_with_policy(ctx, method, policy, isolation, op)
    }

    /// Run a registered operation in a transaction.
    ///
    /// Isolation and propagation come from the guard's configuration.
    pub fn run_operation<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        operation: &OperationId,
        op: F,
    ) -> std::result::Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> std::result::Result<T, E>,
    {
        self.executor.run_operation(ctx, operation, op)
    }

    /// Return the cached value or produce it, one producer per key at a time.
    pub fn get_or_compute<T, E, F>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.cache.get_or_compute(namespace, key, ttl, producer)
    }

    /// Cache-aside for a registered operation, keyed by its arguments.
    pub fn get_or_compute_for<A, T, E, F>(
        &self,
        operation: &OperationId,
        args: &A,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.cache.get_or_compute_for(operation, args, producer)
    }

    /// Run `op`, then evict `namespaces` if it succeeded.
    pub fn evict<'a, I, T, E, F>(&self, namespaces: I, op: F) -> std::result::Result<T, E>
    where
        I: IntoIterator<Item = &'a str>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.cache.evict(namespaces, op)
    }

    /// Run `op`, then evict the namespaces registered for `operation`.
    pub fn evict_for<T, E, F>(&self, operation: &OperationId, op: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.cache.evict_for(operation, op)
    }

    /// Guard a registered operation with everything configured for it.
    ///
    /// In order, from the outside in:
    /// 1. Eviction of the operation's `evict` namespaces after success
    /// 2. Cache-aside, when the operation has cache settings
    /// 3. The transaction
    ///
    /// A cache hit therefore opens no transaction. When `ctx` already has a
    /// transaction bound, the cache is only read: a value produced inside a
    /// transaction owned further up the chain may still be rolled back, so it
    /// is not stored.
    pub fn call<A, T, E, F>(
        &self,
        ctx: &TxContext<P>,
        operation: &OperationId,
        args: &A,
        op: F,
    ) -> std::result::Result<T, TxError<E>>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned + 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> std::result::Result<T, E>,
    {
        let cached = self.executor.metadata().cache_config(operation).is_some();
        self.cache.evict_for(operation, || {
            if cached && ctx.is_bound() {
                match self.cache.peek_for(operation, args) {
                    Some(value) => Ok(value),
                    None => {
                        tracing::debug!(operation = %operation, "Joined transaction, not caching result");
                        self.executor.run_operation(ctx, operation, op)
                    }
                }
            } else if cached {
                self.cache.get_or_compute_for(operation, args, || {
                    self.executor.run_operation(ctx, operation, op)
                })
            } else {
                self.executor.run_operation(ctx, operation, op)
            }
        })
    }
}

impl<P: ResourcePool> std::fmt::Debug for Guard<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("executor", &self.executor)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Builder for guard configuration.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use txguard::prelude::*;
/// use txguard::storage::{MemoryDatabase, MemoryPool};
///
/// let config = GuardConfig::from_toml_str(r#"
///     default_isolation = "repeatable_read"
///
///     [propagation]
///     pattern = "save.*|delete.*"
/// "#).unwrap();
///
/// let guard = Guard::builder(MemoryPool::new(Arc::new(MemoryDatabase::new())))
///     .config(config)
///     .build()
///     .unwrap();
/// assert_eq!(guard.executor().default_isolation(), IsolationLevel::RepeatableRead);
/// ```
pub struct GuardBuilder<P: ResourcePool> {
    pool: P,
    config: Option<GuardConfig>,
    config_path: Option<PathBuf>,
    store: Option<Arc<dyn CacheStore>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    propagation: Option<Arc<dyn PropagationPolicy>>,
    finalize: Option<Arc<dyn FinalizePolicy>>,
    locks: Option<Arc<KeyLockRegistry>>,
}

impl<P: ResourcePool> GuardBuilder<P> {
    fn new(pool: P) -> Self {
        Self {
            pool,
            config: None,
            config_path: None,
            store: None,
            metadata: None,
            propagation: None,
            finalize: None,
            locks: None,
        }
    }

    /// Use an already parsed configuration.
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a TOML file at build time.
    ///
    /// Ignored when [`config`](Self::config) is also given.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Cache store (default: in-process [`MemoryCache`]).
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Operation settings, replacing the ones derived from the configuration.
    pub fn metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Propagation policy, replacing the configured one.
    pub fn propagation(mut self, policy: Arc<dyn PropagationPolicy>) -> Self {
        self.propagation = Some(policy);
        self
    }

    /// Commit/rollback classification for this guard.
    pub fn finalize_policy(mut self, policy: Arc<dyn FinalizePolicy>) -> Self {
        self.finalize = Some(policy);
        self
    }

    /// Private lock registry (default: process-wide).
    ///
    /// The registry keeps one lock per key forever. Under the default entry
    /// granularity, operations keyed by unbounded arguments should be
    /// configured with `lock_granularity = "namespace"` or a fixed
    /// `cache_key`.
    pub fn lock_registry(mut self, locks: Arc<KeyLockRegistry>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Build the guard.
    ///
    /// Fails when the configuration cannot be read or is inconsistent.
    pub fn build(self) -> Result<Guard<P>> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => GuardConfig::load(path)?,
            (None, None) => GuardConfig::default(),
        };
        config.validate()?;

        let metadata: Arc<dyn MetadataProvider> = match self.metadata {
            Some(metadata) => metadata,
            None => Arc::new(config.into_registry()?),
        };
        let propagation = match self.propagation {
            Some(policy) => policy,
            None => policy_from_config(&config.propagation)?,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCache::new()) as Arc<dyn CacheStore>);

        let mut executor = TransactionExecutor::builder(self.pool)
            .default_isolation(config.default_isolation)
            .propagation(propagation)
            .metadata(Arc::clone(&metadata));
        if let Some(policy) = self.finalize {
            executor = executor.finalize_policy(policy);
        }

        let mut cache = CacheAside::new(store)
            .with_granularity(config.lock_granularity)
            .with_default_ttl(config.default_ttl())
            .with_metadata(metadata);
        if let Some(locks) = self.locks {
            cache = cache.with_lock_registry(locks);
        }

        tracing::debug!(
            default_isolation = %config.default_isolation,
            lock_granularity = ?config.lock_granularity,
            operations = config.operations.len(),
            "Built guard"
        );

        Ok(Guard {
            executor: executor.build(),
            cache,
        })
    }
}
