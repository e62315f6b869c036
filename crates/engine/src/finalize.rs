//! Commit/rollback classification
//!
//! By default a top-level transaction commits when the operation returns
//! `Ok` and rolls back when it returns `Err`. A [`FinalizePolicy`] replaces
//! that rule, for example to roll back when the operation returns an
//! explicit error envelope instead of an `Err`.
//!
//! A policy can be given to one executor through its builder, or installed
//! once for the whole process with [`install_finalize_policy`]. The
//! executor's own policy takes precedence over the process-wide one.
//!
//! Whatever the policy decides, a rollback requested through
//! `ResourceContext::set_rollback_only` always rolls back, and the
//! operation's result is always returned to the caller unchanged.

use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// What the wrapped operation produced
#[derive(Clone, Copy)]
pub enum Outcome<'a> {
    /// The operation returned `Ok` with this value
    Returned(&'a dyn Any),
    /// The operation returned `Err` with this error
    Failed(&'a dyn Any),
}

impl Outcome<'_> {
    /// Check if the operation returned `Ok`
    pub fn is_returned(&self) -> bool {
        matches!(self, Outcome::Returned(_))
    }
}

impl fmt::Debug for Outcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Returned(_) => f.write_str("Returned(..)"),
            Outcome::Failed(_) => f.write_str("Failed(..)"),
        }
    }
}

/// How to finish a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Make the writes durable
    Commit,
    /// Discard the writes
    Rollback,
}

/// Classifies an operation's outcome into commit or rollback
pub trait FinalizePolicy: Send + Sync {
    /// Decide how to finish the transaction
    fn decide(&self, outcome: Outcome<'_>) -> Decision;
}

/// Commit on `Ok`, roll back on `Err`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFinalize;

impl FinalizePolicy for DefaultFinalize {
    fn decide(&self, outcome: Outcome<'_>) -> Decision {
        match outcome {
            Outcome::Returned(_) => Decision::Commit,
            Outcome::Failed(_) => Decision::Rollback,
        }
    }
}

/// Policy inspecting a result envelope of type `V`
///
/// Values of type `V` commit when `is_success` returns `true` and roll back
/// otherwise. Values of any other type, and all errors, follow
/// [`DefaultFinalize`].
pub struct EnvelopePolicy<V, F> {
    is_success: F,
    _envelope: PhantomData<fn(&V)>,
}

/// Build an [`EnvelopePolicy`]
///
/// # Example
///
/// ```
/// use txguard_engine::{envelope_policy, Decision, FinalizePolicy, Outcome};
///
/// struct Reply { ok: bool }
///
/// let policy = envelope_policy(|reply: &Reply| reply.ok);
/// assert_eq!(policy.decide(Outcome::Returned(&Reply { ok: false })), Decision::Rollback);
/// assert_eq!(policy.decide(Outcome::Returned(&42u32)), Decision::Commit);
/// ```
pub fn envelope_policy<V, F>(is_success: F) -> EnvelopePolicy<V, F>
where
    V: 'static,
    F: Fn(&V) -> bool + Send + Sync,
{
    EnvelopePolicy {
        is_success,
        _envelope: PhantomData,
    }
}

impl<V, F> FinalizePolicy for EnvelopePolicy<V, F>
where
    V: 'static,
    F: Fn(&V) -> bool + Send + Sync,
{
    fn decide(&self, outcome: Outcome<'_>) -> Decision {
        match outcome {
            Outcome::Returned(value) => match value.downcast_ref::<V>() {
                Some(envelope) if !(self.is_success)(envelope) => Decision::Rollback,
                _ => Decision::Commit,
            },
            Outcome::Failed(_) => Decision::Rollback,
        }
    }
}

static PROCESS_POLICY: OnceCell<Arc<dyn FinalizePolicy>> = OnceCell::new();

/// Install the process-wide finalize policy
///
/// The slot can be set once. Later calls leave the installed policy in
/// place, log a warning and return `false`.
pub fn install_finalize_policy(policy: Arc<dyn FinalizePolicy>) -> bool {
    match PROCESS_POLICY.set(policy) {
        Ok(()) => {
            tracing::debug!("Installed process-wide finalize policy");
            true
        }
        Err(_) => {
            tracing::warn!("Finalize policy already installed; ignoring the new one");
            false
        }
    }
}

/// The process-wide finalize policy, if one was installed
pub fn installed_finalize_policy() -> Option<Arc<dyn FinalizePolicy>> {
    PROCESS_POLICY.get().cloned()
}
