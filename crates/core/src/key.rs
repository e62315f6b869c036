//! Cache-key derivation
//!
//! The default key of a cached operation is a content hash of its identity
//! together with its arguments, so operations sharing a namespace never
//! collide. The default namespace is the operation identity. Either can be
//! overridden through [`CacheConfig`]; a configured key is used verbatim.

use crate::cache::DEFAULT_TTL;
use crate::operation::{CacheConfig, OperationId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Fully resolved cache location of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTarget {
    /// Cache namespace
    pub namespace: String,
    /// Key within the namespace
    pub key: String,
    /// Time-to-live for a freshly produced value
    pub ttl: Duration,
}

/// SHA-256 hex digest of the JSON encoding of `args`
///
/// Equal arguments always produce equal keys. Map-typed arguments should use
/// ordered maps so the encoding is stable.
pub fn hash_args<A: Serialize + ?Sized>(args: &A) -> serde_json::Result<String> {
    let encoded = serde_json::to_vec(args)?;
    Ok(format!("{:x}", Sha256::digest(&encoded)))
}

/// Default key of a call to `op` with `args`
pub fn operation_key<A: Serialize + ?Sized>(
    op: &OperationId,
    args: &A,
) -> serde_json::Result<String> {
    hash_args(&(op.qualified(), args))
}

/// Resolve namespace, key and ttl for a call to `op` with `args`
pub fn resolve_target<A: Serialize + ?Sized>(
    op: &OperationId,
    config: Option<&CacheConfig>,
    args: &A,
    default_ttl: Duration,
) -> serde_json::Result<CacheTarget> {
    let namespace = config
        .and_then(|c| c.namespace.clone())
        .unwrap_or_else(|| op.qualified());

    let key = match config.and_then(|c| c.key.clone()) {
        Some(key) => key,
        None => operation_key(op, args)?,
    };

    let ttl = config.and_then(|c| c.ttl).unwrap_or(default_ttl);

    Ok(CacheTarget { namespace, key, ttl })
}

/// [`resolve_target`] with the store-wide default ttl
pub fn resolve_target_default<A: Serialize + ?Sized>(
    op: &OperationId,
    config: Option<&CacheConfig>,
    args: &A,
) -> serde_json::Result<CacheTarget> {
    resolve_target(op, config, args, DEFAULT_TTL)
}
