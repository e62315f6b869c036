//! Transaction executor
//!
//! Wraps an operation in a transaction on a pooled resource, or joins the
//! transaction already bound to the call chain.
//!
//! # Lifecycle of a top-level call
//!
//! 1. Acquire a resource from the pool
//! 2. Remember its auto-commit mode, disable auto-commit
//! 3. Set the isolation level and begin
//! 4. Bind the resource to the chain
//! 5. Run the operation
//! 6. Commit or roll back
//! 7. Restore auto-commit and close the resource
//! 8. Unbind
//!
//! Steps 6 and 7 also run when the operation panics. A nested call on the
//! same chain only runs the operation (raising the isolation level first when
//! it asks for a stronger one); the owner finishes the transaction.

use crate::error::TxError;
use crate::finalize::{installed_finalize_policy, Decision, DefaultFinalize, FinalizePolicy, Outcome};
use crate::policy::{AlwaysPolicy, PropagationPolicy};
use std::sync::Arc;
use txguard_concurrency::ResourceContext;
use txguard_core::{
    IsolationLevel, MetadataProvider, NoMetadata, OperationId, Resource, ResourceError,
    ResourcePool, ResourceResult,
};

/// Call-chain context for the resources of pool `P`
pub type TxContext<P> = ResourceContext<<P as ResourcePool>::Resource>;

/// Part a call plays in the chain's transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRole {
    /// Started the transaction and finishes it
    Owner,
    /// Runs inside a transaction owned further up the chain
    Joiner,
}

impl std::fmt::Display for TxRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxRole::Owner => write!(f, "owner"),
            TxRole::Joiner => write!(f, "joiner"),
        }
    }
}

/// What one call asks of the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDescriptor {
    /// Requested isolation level
    pub isolation: IsolationLevel,
    /// Owner if nothing is bound yet, otherwise joiner
    pub role: TxRole,
}

impl TxDescriptor {
    /// Describe a call at `isolation` on `ctx`
    pub fn for_call<R: ?Sized>(ctx: &ResourceContext<R>, isolation: IsolationLevel) -> Self {
        let role = if ctx.is_bound() {
            TxRole::Joiner
        } else {
            TxRole::Owner
        };
        Self { isolation, role }
    }
}

/// Runs operations inside transactions on resources from a pool
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use txguard_core::IsolationLevel;
/// use txguard_engine::TransactionExecutor;
/// use txguard_storage::{MemoryDatabase, MemoryPool};
///
/// let pool = MemoryPool::new(Arc::new(MemoryDatabase::new()));
/// let executor = TransactionExecutor::new(pool.clone());
/// let ctx = executor.context();
///
/// let written = executor.run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
///     let conn = ctx.resource().unwrap();
///     conn.write("row:1", serde_json::json!(1))
/// });
/// assert!(written.is_ok());
/// assert_eq!(pool.stats().commits(), 1);
/// ```
pub struct TransactionExecutor<P: ResourcePool> {
    pool: P,
    default_isolation: IsolationLevel,
    propagation: Arc<dyn PropagationPolicy>,
    metadata: Arc<dyn MetadataProvider>,
    finalize: Option<Arc<dyn FinalizePolicy>>,
}

impl<P: ResourcePool> TransactionExecutor<P> {
    /// Executor with default settings: read-committed, every call wrapped
    pub fn new(pool: P) -> Self {
        Self::builder(pool).build()
    }

    /// Start configuring an executor
    pub fn builder(pool: P) -> ExecutorBuilder<P> {
        ExecutorBuilder::new(pool)
    }

    /// A fresh call chain for this executor's resources
    pub fn context(&self) -> TxContext<P> {
        ResourceContext::new()
    }

    /// The underlying pool
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Isolation used when nothing more specific is configured
    pub fn default_isolation(&self) -> IsolationLevel {
        self.default_isolation
    }

    /// Settings provider consulted by [`run_operation`](Self::run_operation)
    pub fn metadata(&self) -> &Arc<dyn MetadataProvider> {
        &self.metadata
    }

    /// Run `op` in a transaction at `isolation`
    ///
    /// Joins the chain's transaction when one is bound, otherwise owns a new
    /// one. The operation's own error comes back as [`TxError::Operation`].
    pub fn run<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        isolation: IsolationLevel,
        op: F,
    ) -> Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> Result<T, E>,
    {
        let descriptor = TxDescriptor::for_call(ctx, isolation);
        let span = tracing::debug_span!(
            "transaction",
            chain_id = %ctx.chain_id(),
            isolation = %descriptor.isolation,
            role = %descriptor.role,
        );
        let _enter = span.enter();

        match (descriptor.role, ctx.resource()) {
            (TxRole::Joiner, Some(resource)) => {
                self.run_nested(ctx, &resource, descriptor.isolation, op)
            }
            _ => self.run_owned(ctx, descriptor.isolation, op),
        }
    }

    /// Run `op` in a transaction only if `policy` selects `method`
    ///
    /// Unselected calls run the operation directly, with no transaction.
    pub fn run_with_policy<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        method: &str,
        policy: &dyn PropagationPolicy,
        isolation: IsolationLevel,
        op: F,
    ) -> Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> Result<T, E>,
    {
        if policy.applies_to(method) {
            self.run(ctx, isolation, op)
        } else {
            tracing::trace!(method, "Running without transaction");
            op(ctx).map_err(TxError::Operation)
        }
    }

    /// Run a registered operation
    ///
    /// The isolation level comes from the operation's settings, then its
    /// owning type's, then the executor default. The executor's propagation
    /// policy decides from the method name whether a transaction is used.
    pub fn run_operation<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        operation: &OperationId,
        op: F,
    ) -> Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> Result<T, E>,
    {
        let isolation = self
            .metadata
            .resolve_isolation(operation, self.default_isolation);
        self.run_with_policy(
            ctx,
            &operation.method,
            self.propagation.as_ref(),
            isolation,
            op,
        )
    }

    fn run_nested<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        resource: &Arc<P::Resource>,
        isolation: IsolationLevel,
        op: F,
    ) -> Result<T, TxError<E>>
    where
        F: FnOnce(&TxContext<P>) -> Result<T, E>,
    {
        let _nested = ctx.enter_nested();

        let current = ctx.isolation().unwrap_or_default();
        if isolation > current {
            resource
                .set_isolation_level(isolation)
                .map_err(TxError::Setup)?;
            ctx.raise_isolation(isolation);
            tracing::debug!(from = %current, to = %isolation, "Raised isolation of joined transaction");
        }

        tracing::debug!(depth = ctx.depth(), "Joined transaction");
        op(ctx).map_err(TxError::Operation)
    }

    fn run_owned<T, E, F>(
        &self,
        ctx: &TxContext<P>,
        isolation: IsolationLevel,
        op: F,
    ) -> Result<T, TxError<E>>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(&TxContext<P>) -> Result<T, E>,
    {
        let resource = self.pool.acquire().map_err(|e| {
            tracing::warn!(error = %e, "Failed to acquire resource");
            TxError::Acquire(e)
        })?;

        let mut tx = OwnedTransaction::prepare(resource, isolation).map_err(|e| {
            tracing::warn!(error = %e, "Failed to prepare transaction");
            TxError::Setup(e)
        })?;

        let binding = ctx
            .bind(Arc::clone(&tx.resource), isolation)
            .map_err(|e| TxError::Setup(ResourceError::Backend(e.to_string())))?;
        tracing::debug!("Began transaction");

        let result = op(ctx);

        let decision = if binding.rollback_only() {
            tracing::debug!("Rollback requested by the operation");
            Decision::Rollback
        } else {
            self.decide(&result)
        };

        let finished = tx.finish(decision);
        tx.release();
        drop(binding);

        match (result, finished) {
            (Err(e), _) => Err(TxError::Operation(e)),
            (Ok(_), Err(e)) => Err(TxError::Commit(e)),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    fn decide<T: 'static, E: 'static>(&self, result: &Result<T, E>) -> Decision {
        let outcome = match result {
            Ok(value) => Outcome::Returned(value),
            Err(error) => Outcome::Failed(error),
        };

        match &self.finalize {
            Some(policy) => policy.decide(outcome),
            None => match installed_finalize_policy() {
                Some(policy) => policy.decide(outcome),
                None => DefaultFinalize.decide(outcome),
            },
        }
    }
}

impl<P: ResourcePool> std::fmt::Debug for TransactionExecutor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("default_isolation", &self.default_isolation)
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// Builder for [`TransactionExecutor`]
pub struct ExecutorBuilder<P: ResourcePool> {
    pool: P,
    default_isolation: IsolationLevel,
    propagation: Arc<dyn PropagationPolicy>,
    metadata: Arc<dyn MetadataProvider>,
    finalize: Option<Arc<dyn FinalizePolicy>>,
}

impl<P: ResourcePool> ExecutorBuilder<P> {
    fn new(pool: P) -> Self {
        Self {
            pool,
            default_isolation: IsolationLevel::default(),
            propagation: Arc::new(AlwaysPolicy),
            metadata: Arc::new(NoMetadata),
            finalize: None,
        }
    }

    /// Isolation used when neither operation nor type overrides it
    pub fn default_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }

    /// Policy selecting which methods get a transaction in `run_operation`
    pub fn propagation(mut self, policy: Arc<dyn PropagationPolicy>) -> Self {
        self.propagation = policy;
        self
    }

    /// Source of per-operation settings
    pub fn metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Commit/rollback classification for this executor only
    pub fn finalize_policy(mut self, policy: Arc<dyn FinalizePolicy>) -> Self {
        self.finalize = Some(policy);
        self
    }

    /// Build the executor
    pub fn build(self) -> TransactionExecutor<P> {
        TransactionExecutor {
            pool: self.pool,
            default_isolation: self.default_isolation,
            propagation: self.propagation,
            metadata: self.metadata,
            finalize: self.finalize,
        }
    }
}

/// A resource owned by one top-level call
///
/// Dropping it rolls back a transaction that was never finished and returns
/// the resource to its pool, so every exit path releases.
struct OwnedTransaction<R: Resource> {
    resource: Arc<R>,
    restore_auto_commit: bool,
    open: bool,
    released: bool,
}

impl<R: Resource> OwnedTransaction<R> {
    fn prepare(resource: Arc<R>, isolation: IsolationLevel) -> ResourceResult<Self> {
        let mut tx = Self {
            resource,
            restore_auto_commit: false,
            open: false,
            released: false,
        };

        if tx.resource.auto_commit()? {
            tx.resource.set_auto_commit(false)?;
            tx.restore_auto_commit = true;
        }
        tx.resource.set_isolation_level(isolation)?;
        tx.resource.begin()?;
        tx.open = true;
        Ok(tx)
    }

    /// Commit or roll back. A failed commit is followed by a rollback.
    fn finish(&mut self, decision: Decision) -> ResourceResult<()> {
        self.open = false;
        match decision {
            Decision::Commit => match self.resource.commit() {
                Ok(()) => {
                    tracing::debug!("Committed transaction");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Commit failed, rolling back");
                    self.rollback();
                    Err(e)
                }
            },
            Decision::Rollback => {
                self.rollback();
                Ok(())
            }
        }
    }

    fn rollback(&self) {
        match self.resource.rollback() {
            Ok(()) => tracing::debug!("Rolled back transaction"),
            Err(e) => tracing::warn!(error = %e, "Rollback failed"),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.restore_auto_commit {
            if let Err(e) = self.resource.set_auto_commit(true) {
                tracing::warn!(error = %e, "Failed to restore auto-commit");
            }
        }
        if let Err(e) = self.resource.close() {
            tracing::error!(error = %e, "Failed to release resource");
        }
    }
}

impl<R: Resource> Drop for OwnedTransaction<R> {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!("Transaction left unfinished, rolling back");
            self.open = false;
            self.rollback();
        }
        self.release();
    }
}
