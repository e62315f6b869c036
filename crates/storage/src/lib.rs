//! Reference backends for txguard
//!
//! This crate implements the collaborator contracts from `txguard-core`:
//! - [`MemoryCache`]: in-process cache with per-entry TTL
//! - [`TieredCache`]: near/far combination of two cache stores
//! - [`MemoryDatabase`], [`MemoryPool`], [`MemoryConnection`]: a transactional
//!   in-memory resource with lifecycle counters and fault injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory_cache;
pub mod memory_db;
pub mod tiered;

pub use memory_cache::MemoryCache;
pub use memory_db::{FaultPlan, MemoryConnection, MemoryDatabase, MemoryPool, PoolStats};
pub use tiered::{TieredCache, DEFAULT_NEAR_TTL};
