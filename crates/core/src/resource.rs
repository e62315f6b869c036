//! Resource pool contract
//!
//! A [`Resource`] is a stateful handle to the database (a connection). The
//! transaction executor never constructs resources itself: it asks a
//! [`ResourcePool`] for one, drives it through the transaction lifecycle and
//! hands it back with [`Resource::close`].
//!
//! All methods take `&self`. A resource is shared by reference between the
//! owning executor invocation and every nested joiner on the same call chain,
//! so implementations use interior mutability.

use crate::error::ResourceError;
use crate::isolation::IsolationLevel;
use std::sync::Arc;

/// Result type for resource operations
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

/// A transactional resource, typically a database connection
pub trait Resource: Send + Sync {
    /// Current isolation level
    fn isolation_level(&self) -> ResourceResult<IsolationLevel>;

    /// Change the isolation level
    fn set_isolation_level(&self, level: IsolationLevel) -> ResourceResult<()>;

    /// Whether every statement commits on its own
    fn auto_commit(&self) -> ResourceResult<bool>;

    /// Enable or disable auto-commit
    fn set_auto_commit(&self, enabled: bool) -> ResourceResult<()>;

    /// Start a transaction
    fn begin(&self) -> ResourceResult<()>;

    /// Make the current transaction's writes durable
    fn commit(&self) -> ResourceResult<()>;

    /// Discard the current transaction's writes
    fn rollback(&self) -> ResourceResult<()>;

    /// Release the resource back to its pool
    fn close(&self) -> ResourceResult<()>;
}

/// Source of resources
///
/// `acquire` may block while the pool waits for a free resource. A pool
/// timeout is reported as [`ResourceError::Timeout`].
pub trait ResourcePool: Send + Sync {
    /// Resource type handed out by this pool
    type Resource: Resource + 'static;

    /// Take a resource from the pool
    fn acquire(&self) -> ResourceResult<Arc<Self::Resource>>;
}

impl<P: ResourcePool + ?Sized> ResourcePool for Arc<P> {
    type Resource = P::Resource;

    fn acquire(&self) -> ResourceResult<Arc<Self::Resource>> {
        (**self).acquire()
    }
}
