//! Convenient imports for txguard.
//!
//! ```
//! use txguard::prelude::*;
//! ```

// Main entry point
pub use crate::guard::{Guard, GuardBuilder};

// Error handling
pub use crate::error::{Error, Result};
pub use txguard_core::{CacheError, ConfigError, ResourceError};

// Configuration and settings
pub use txguard_core::{
    GuardConfig, IsolationLevel, LockGranularity, MetadataRegistry, OperationConfig, OperationId,
    TypeConfig,
};

// Collaborator contracts
pub use txguard_core::{CacheStore, Resource, ResourcePool};

// Policies
pub use txguard_engine::{
    AlwaysPolicy, Decision, FinalizePolicy, MethodNamePolicy, MethodPatternPolicy, NeverPolicy,
    Outcome, PropagationPolicy, TxContext, TxError,
};

// Re-export serde_json for convenience
pub use serde_json::json;
