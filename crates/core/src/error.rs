//! Error types for the collaborator contracts
//!
//! Each external collaborator gets its own error type:
//! - [`ResourceError`]: resource pools and the resources they hand out
//! - [`CacheError`]: cache stores
//! - [`ConfigError`]: configuration loading and validation

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a resource pool or a resource
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The pool could not supply a resource
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// The pool gave up waiting for a free resource
    #[error("timed out after {0:?} waiting for a resource")]
    Timeout(Duration),

    /// The resource was already closed
    #[error("resource is closed")]
    Closed,

    /// Backend-specific failure (driver error, broken connection, ...)
    #[error("backend error: {0}")]
    Backend(String),
}

impl ResourceError {
    /// Check if retrying the call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResourceError::Timeout(_) | ResourceError::Unavailable(_))
    }
}

/// Failure reported by a cache store
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Backend-specific failure
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or has the wrong shape
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Unknown isolation level name or code
    #[error("invalid isolation level: {0}")]
    InvalidIsolation(String),

    /// Method-name pattern failed to compile
    #[error("invalid method pattern: {0}")]
    InvalidPattern(String),

    /// Anything else that is structurally wrong
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
