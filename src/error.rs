//! Unified error type for txguard.
//!
//! Wraps the per-crate errors behind one enum so applications can use `?`
//! across configuration, transactions and their own data access.

use thiserror::Error;
use txguard_core::{CacheError, ConfigError, ResourceError};
use txguard_engine::TxError;

/// All txguard errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No resource could be acquired; nothing ran
    #[error("failed to acquire a resource: {0}")]
    Acquire(#[source] ResourceError),

    /// The transaction could not be started
    #[error("failed to start transaction: {0}")]
    Setup(#[source] ResourceError),

    /// The operation succeeded but its commit failed and was rolled back
    #[error("commit failed: {0}")]
    Commit(#[source] ResourceError),

    /// A resource call made by the operation failed
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// A cache store call failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error raised by application code
    #[error("{0}")]
    Operation(String),
}

/// Result type for txguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Pool exhaustion and timeouts may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Acquire(e) | Error::Resource(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if the transaction machinery rather than the operation failed.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Acquire(_) | Error::Setup(_) | Error::Commit(_))
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

// Infrastructure failures keep their stage; the operation's error converts on its own
impl<E: Into<Error>> From<TxError<E>> for Error {
    fn from(e: TxError<E>) -> Self {
        match e {
            TxError::Acquire(e) => Error::Acquire(e),
            TxError::Setup(e) => Error::Setup(e),
            TxError::Commit(e) => Error::Commit(e),
            TxError::Operation(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
