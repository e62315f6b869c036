//! Transaction executor errors
//!
//! [`TxError`] separates failures of the transaction machinery from failures
//! of the wrapped operation. The operation's own error type is carried
//! unchanged in [`TxError::Operation`].
//!
//! Rollback and release failures never appear here: they are logged, and the
//! operation's outcome keeps the return channel.

use thiserror::Error;
use txguard_core::ResourceError;

/// Failure of a transactional call
#[derive(Debug, Error)]
pub enum TxError<E> {
    /// The pool could not supply a resource; nothing was opened
    #[error("failed to acquire a resource: {0}")]
    Acquire(#[source] ResourceError),

    /// The resource could not be prepared (auto-commit, isolation, begin)
    #[error("failed to prepare the transaction: {0}")]
    Setup(#[source] ResourceError),

    /// The operation succeeded but the commit failed; the transaction was rolled back
    #[error("commit failed: {0}")]
    Commit(#[source] ResourceError),

    /// The wrapped operation returned an error
    #[error("{0}")]
    Operation(E),
}

impl<E> TxError<E> {
    /// Check if the wrapped operation failed
    pub fn is_operation(&self) -> bool {
        matches!(self, TxError::Operation(_))
    }

    /// The operation's error, if that is what failed
    pub fn operation(&self) -> Option<&E> {
        match self {
            TxError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's error, if that is what failed
    pub fn into_operation(self) -> Option<E> {
        match self {
            TxError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Map the operation's error, keeping infrastructure failures as they are
    pub fn map_operation<F, E2>(self, f: F) -> TxError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            TxError::Acquire(e) => TxError::Acquire(e),
            TxError::Setup(e) => TxError::Setup(e),
            TxError::Commit(e) => TxError::Commit(e),
            TxError::Operation(e) => TxError::Operation(f(e)),
        }
    }

    /// The infrastructure error, if the machinery rather than the operation failed
    pub fn resource_error(&self) -> Option<&ResourceError> {
        match self {
            TxError::Acquire(e) | TxError::Setup(e) | TxError::Commit(e) => Some(e),
            TxError::Operation(_) => None,
        }
    }

    /// Check if retrying the call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TxError::Acquire(e) if e.is_retryable())
    }
}
