//! Concurrency primitives for txguard
//!
//! This crate provides the two pieces of shared-state coordination the
//! executors build on:
//! - [`ResourceContext`]: the resource bound to one logical call chain
//! - [`KeyLockRegistry`]: per-key locks that serialize cache production

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod registry;

pub use context::{AlreadyBound, BindingGuard, NestedGuard, ResourceContext};
pub use registry::{KeyLock, KeyLockRegistry, LockKey};
