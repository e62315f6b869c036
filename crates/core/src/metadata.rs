//! Metadata lookup for guarded operations
//!
//! Executors ask a [`MetadataProvider`] for the settings attached to the call
//! they are guarding. [`MetadataRegistry`] is the provider used in practice:
//! settings are registered once at setup time (in code or from a config file)
//! and read concurrently afterwards.
//!
//! # Isolation precedence
//!
//! 1. Override on the operation
//! 2. Override on the operation's owning type
//! 3. Process default

use crate::isolation::IsolationLevel;
use crate::operation::{CacheConfig, OperationConfig, OperationId, TypeConfig};
use dashmap::DashMap;

/// Settings lookup for the call being guarded
pub trait MetadataProvider: Send + Sync {
    /// Cache settings of the operation, `None` when it is not cached
    fn cache_config(&self, op: &OperationId) -> Option<CacheConfig>;

    /// Isolation override attached to the operation itself
    fn operation_isolation(&self, op: &OperationId) -> Option<IsolationLevel>;

    /// Isolation override attached to the owning type
    fn type_isolation(&self, owner: &str) -> Option<IsolationLevel>;

    /// Namespace lists evicted after the operation succeeds
    fn evict_namespaces(&self, op: &OperationId) -> Vec<String>;

    /// Effective isolation for `op`
    fn resolve_isolation(&self, op: &OperationId, default: IsolationLevel) -> IsolationLevel {
        self.operation_isolation(op)
            .or_else(|| self.type_isolation(&op.owner))
            .unwrap_or(default)
    }
}

/// Provider with nothing configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataProvider for NoMetadata {
    fn cache_config(&self, _op: &OperationId) -> Option<CacheConfig> {
        None
    }

    fn operation_isolation(&self, _op: &OperationId) -> Option<IsolationLevel> {
        None
    }

    fn type_isolation(&self, _owner: &str) -> Option<IsolationLevel> {
        None
    }

    fn evict_namespaces(&self, _op: &OperationId) -> Vec<String> {
        Vec::new()
    }
}

/// Registry of operation and type settings
///
/// Registering the same operation twice replaces the earlier settings.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    operations: DashMap<OperationId, OperationConfig>,
    types: DashMap<String, TypeConfig>,
}

impl MetadataRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach settings to an operation
    pub fn register_operation(&self, op: OperationId, config: OperationConfig) {
        if self.operations.insert(op.clone(), config).is_some() {
            tracing::debug!(operation = %op, "Replaced operation settings");
        }
    }

    /// Attach settings to an owning type
    pub fn register_type(&self, owner: impl Into<String>, config: TypeConfig) {
        self.types.insert(owner.into(), config);
    }

    /// Settings registered for an operation
    pub fn operation(&self, op: &OperationId) -> Option<OperationConfig> {
        self.operations.get(op).map(|entry| entry.value().clone())
    }

    /// Number of registered operations
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Number of registered types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn cache_config(&self, op: &OperationId) -> Option<CacheConfig> {
        self.operations
            .get(op)
            .and_then(|entry| entry.value().cache.clone())
    }

    fn operation_isolation(&self, op: &OperationId) -> Option<IsolationLevel> {
        self.operations.get(op).and_then(|entry| entry.value().isolation)
    }

    fn type_isolation(&self, owner: &str) -> Option<IsolationLevel> {
        self.types.get(owner).and_then(|entry| entry.value().isolation)
    }

    fn evict_namespaces(&self, op: &OperationId) -> Vec<String> {
        self.operations
            .get(op)
            .map(|entry| entry.value().evict.clone())
            .unwrap_or_default()
    }
}
