//! Per-call-chain resource binding
//!
//! A [`ResourceContext`] represents one logical call chain. The outermost
//! transactional call binds a resource to it; every nested call on the same
//! chain receives the same context and therefore observes the same resource.
//!
//! # Invariants
//!
//! - At most one resource is bound at a time
//! - The bound resource never changes while bound (nested calls see the same `Arc`)
//! - The isolation level recorded for the binding only increases
//! - The binding is removed when the [`BindingGuard`] returned by
//!   [`ResourceContext::bind`] is dropped, on every exit path including unwinding
//!
//! # Thread Safety
//!
//! `ResourceContext` is `Send` but not `Sync`. A chain can move to another
//! thread, but it can never be shared by two threads at once, so a bound
//! resource is never used by two call chains concurrently.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;
use txguard_core::IsolationLevel;
use uuid::Uuid;

/// Binding state of a chain
struct Binding<R: ?Sized> {
    resource: Arc<R>,
    isolation: IsolationLevel,
    rollback_only: bool,
}

/// Resource bound to one logical call chain
pub struct ResourceContext<R: ?Sized> {
    chain_id: Uuid,
    binding: RefCell<Option<Binding<R>>>,
    depth: Cell<usize>,
}

/// Error returned when binding to a chain that already has a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyBound;

impl fmt::Display for AlreadyBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a resource is already bound to this call chain")
    }
}

impl std::error::Error for AlreadyBound {}

impl<R: ?Sized> ResourceContext<R> {
    /// Start a new call chain with nothing bound
    pub fn new() -> Self {
        Self {
            chain_id: Uuid::new_v4(),
            binding: RefCell::new(None),
            depth: Cell::new(0),
        }
    }

    /// Unique id of this chain, used in log fields
    pub fn chain_id(&self) -> Uuid {
        self.chain_id
    }

    /// Check if a resource is bound
    pub fn is_bound(&self) -> bool {
        self.binding.borrow().is_some()
    }

    /// The bound resource, if any
    pub fn resource(&self) -> Option<Arc<R>> {
        self.binding
            .borrow()
            .as_ref()
            .map(|binding| Arc::clone(&binding.resource))
    }

    /// Isolation level in effect for the bound resource
    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.binding.borrow().as_ref().map(|binding| binding.isolation)
    }

    /// Number of nested joiners currently running on this chain
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Bind `resource` to this chain
    ///
    /// The binding lasts until the returned guard is dropped.
    pub fn bind(
        &self,
        resource: Arc<R>,
        isolation: IsolationLevel,
    ) -> Result<BindingGuard<'_, R>, AlreadyBound> {
        let mut slot = self.binding.borrow_mut();
        if slot.is_some() {
            return Err(AlreadyBound);
        }
        *slot = Some(Binding {
            resource,
            isolation,
            rollback_only: false,
        });
        Ok(BindingGuard { context: self })
    }

    /// Record a stronger isolation level for the bound resource
    ///
    /// Returns `true` if `level` is stronger than the current one and was
    /// recorded. Weaker or equal levels, or an unbound chain, leave the
    /// context unchanged and return `false`.
    pub fn raise_isolation(&self, level: IsolationLevel) -> bool {
        match self.binding.borrow_mut().as_mut() {
            Some(binding) if level > binding.isolation => {
                binding.isolation = level;
                true
            }
            _ => false,
        }
    }

    /// Request that the chain's transaction be rolled back instead of committed
    ///
    /// The owning call rolls back when it finishes and still returns the
    /// operation's value. Returns `false` when nothing is bound, in which
    /// case there is no transaction to abort.
    pub fn set_rollback_only(&self) -> bool {
        match self.binding.borrow_mut().as_mut() {
            Some(binding) => {
                binding.rollback_only = true;
                true
            }
            None => {
                tracing::debug!(chain_id = %self.chain_id, "Rollback requested outside a transaction");
                false
            }
        }
    }

    /// Check if rollback was requested
    pub fn is_rollback_only(&self) -> bool {
        self.binding
            .borrow()
            .as_ref()
            .map(|binding| binding.rollback_only)
            .unwrap_or(false)
    }

    /// Mark entry of a nested joiner; the depth drops again with the guard
    pub fn enter_nested(&self) -> NestedGuard<'_, R> {
        self.depth.set(self.depth.get() + 1);
        NestedGuard { context: self }
    }
}

impl<R: ?Sized> Default for ResourceContext<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ?Sized> fmt::Debug for ResourceContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("chain_id", &self.chain_id)
            .field("bound", &self.is_bound())
            .field("isolation", &self.isolation())
            .field("depth", &self.depth.get())
            .finish()
    }
}

/// Keeps a resource bound; unbinds on drop
#[must_use = "the resource is unbound as soon as the guard is dropped"]
pub struct BindingGuard<'a, R: ?Sized> {
    context: &'a ResourceContext<R>,
}

impl<R: ?Sized> BindingGuard<'_, R> {
    /// Check if rollback was requested anywhere on the chain
    pub fn rollback_only(&self) -> bool {
        self.context.is_rollback_only()
    }

    /// Isolation level in effect
    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.context.isolation()
    }
}

impl<R: ?Sized> Drop for BindingGuard<'_, R> {
    fn drop(&mut self) {
        self.context.binding.borrow_mut().take();
    }
}

/// Tracks one nested joiner; decrements the chain depth on drop
pub struct NestedGuard<'a, R: ?Sized> {
    context: &'a ResourceContext<R>,
}

impl<R: ?Sized> Drop for NestedGuard<'_, R> {
    fn drop(&mut self) {
        let depth = self.context.depth.get();
        self.context.depth.set(depth.saturating_sub(1));
    }
}
