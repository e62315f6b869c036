//! Core types and collaborator contracts for txguard
//!
//! This crate defines everything the executors depend on but do not own:
//! - [`IsolationLevel`]: ordered SQL isolation levels
//! - [`Resource`] / [`ResourcePool`]: the transactional resource contract
//! - [`CacheStore`]: the namespaced cache contract
//! - [`OperationId`], [`MetadataProvider`], [`MetadataRegistry`]: per-operation settings
//! - [`GuardConfig`]: TOML configuration
//! - Cache-key derivation ([`hash_args`], [`operation_key`], [`resolve_target`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod isolation;
pub mod key;
pub mod metadata;
pub mod operation;
pub mod resource;

pub use cache::{CacheResult, CacheStore, LockGranularity, DEFAULT_TTL};
pub use config::{EvictList, GuardConfig, OperationEntry, PropagationConfig, TypeEntry};
pub use error::{CacheError, ConfigError, ResourceError};
pub use isolation::IsolationLevel;
pub use key::{hash_args, operation_key, resolve_target, resolve_target_default, CacheTarget};
pub use metadata::{MetadataProvider, MetadataRegistry, NoMetadata};
pub use operation::{split_namespaces, CacheConfig, OperationConfig, OperationId, TypeConfig};
pub use resource::{Resource, ResourcePool, ResourceResult};
