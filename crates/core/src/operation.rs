//! Operation identity and per-operation settings
//!
//! An [`OperationId`] names a guarded call the way a method is named: the
//! owning type plus the method. Settings that would otherwise be declared on
//! the method or its type are attached as an [`OperationConfig`] or a
//! [`TypeConfig`] at setup time.

use crate::isolation::IsolationLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identity of a guarded operation: owning type and method name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId {
    /// Owning type, e.g. `UserRepository`
    pub owner: String,
    /// Method name, e.g. `find_by_id`
    pub method: String,
}

impl OperationId {
    /// Create an operation id
    pub fn new(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
        }
    }

    /// Parse `Owner.method`. The last `.` separates owner and method, so
    /// owners may themselves be dotted paths.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (owner, method) = qualified.rsplit_once('.')?;
        if owner.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self::new(owner, method))
    }

    /// `Owner.method`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.owner, self.method)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.method)
    }
}

/// Cache settings attached to an operation
///
/// Every field is optional; unset fields fall back to the derived defaults
/// (namespace = operation identity, key = argument hash, ttl = store default).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache namespace override
    pub namespace: Option<String>,
    /// Cache key override
    pub key: Option<String>,
    /// Time-to-live override
    pub ttl: Option<Duration>,
}

/// Settings attached to one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationConfig {
    /// Cache-aside settings; `None` when the operation is not cached
    pub cache: Option<CacheConfig>,
    /// Isolation override for this operation
    pub isolation: Option<IsolationLevel>,
    /// Namespaces evicted after the operation succeeds
    pub evict: Vec<String>,
}

impl OperationConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache results in `namespace`
    pub fn cached_in(mut self, namespace: impl Into<String>) -> Self {
        self.cache_mut().namespace = Some(namespace.into());
        self
    }

    /// Cache results under a fixed key
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_mut().key = Some(key.into());
        self
    }

    /// Cache results for `ttl`
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.cache_mut().ttl = Some(ttl);
        self
    }

    /// Run at `level` (or stronger, when joining a stronger chain)
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Evict `namespaces` after success. Accepts comma-delimited lists.
    pub fn evicts(mut self, namespaces: impl Into<String>) -> Self {
        self.evict.push(namespaces.into());
        self
    }

    fn cache_mut(&mut self) -> &mut CacheConfig {
        self.cache.get_or_insert_with(CacheConfig::default)
    }
}

/// Settings attached to an owning type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeConfig {
    /// Isolation for every operation of the type without its own override
    pub isolation: Option<IsolationLevel>,
}

/// Split comma-delimited namespace lists into individual namespaces
///
/// Whitespace around names is trimmed and empty segments are dropped.
///
/// # Examples
///
/// ```
/// use txguard_core::split_namespaces;
///
/// let names = split_namespaces(["users, profiles", "audit"]);
/// assert_eq!(names, vec!["users", "profiles", "audit"]);
/// ```
pub fn split_namespaces<'a, I>(lists: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lists
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}
