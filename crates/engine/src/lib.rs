//! Guarded execution for txguard
//!
//! This crate runs data-access calls under two guards:
//! - [`TransactionExecutor`]: join-or-own transactions with guaranteed release
//! - [`CacheAside`]: double-checked cache production, one producer per key
//!
//! Supporting pieces:
//! - [`PropagationPolicy`]: which methods get a transaction
//! - [`FinalizePolicy`]: commit or rollback from the operation's outcome
//! - [`TxError`]: infrastructure failures kept apart from operation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache_aside;
pub mod error;
pub mod executor;
pub mod finalize;
pub mod policy;

pub use cache_aside::CacheAside;
pub use error::TxError;
pub use executor::{ExecutorBuilder, TransactionExecutor, TxContext, TxDescriptor, TxRole};
pub use finalize::{
    envelope_policy, install_finalize_policy, installed_finalize_policy, Decision,
    DefaultFinalize, EnvelopePolicy, FinalizePolicy, Outcome,
};
pub use policy::{
    policy_from_config, AlwaysPolicy, MethodNamePolicy, MethodPatternPolicy, NeverPolicy,
    PropagationPolicy,
};
