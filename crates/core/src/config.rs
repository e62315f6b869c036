//! File-based configuration
//!
//! A [`GuardConfig`] carries the process defaults plus the per-type and
//! per-operation settings. It is read once at startup and turned into a
//! [`MetadataRegistry`] with [`GuardConfig::into_registry`].
//!
//! ```toml
//! default_isolation = "read_committed"
//! default_ttl_secs = 3600
//! lock_granularity = "entry"
//!
//! [propagation]
//! pattern = "^(save|update|delete)"
//! case_insensitive = true
//!
//! [types.UserRepository]
//! isolation = "repeatable_read"
//!
//! [operations."UserRepository.find_by_id"]
//! cache_namespace = "users"
//! ttl_secs = 60
//!
//! [operations."UserRepository.save"]
//! evict = "users, profiles"
//! ```

use crate::cache::{LockGranularity, DEFAULT_TTL};
use crate::error::ConfigError;
use crate::isolation::IsolationLevel;
use crate::metadata::MetadataRegistry;
use crate::operation::{CacheConfig, OperationConfig, OperationId, TypeConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Isolation used when neither the operation nor its type overrides it
    pub default_isolation: IsolationLevel,
    /// Time-to-live used when an operation does not set one
    pub default_ttl_secs: u64,
    /// Granularity of the cache production locks
    pub lock_granularity: LockGranularity,
    /// Which method names get a transaction
    pub propagation: PropagationConfig,
    /// Settings keyed by owning type
    pub types: BTreeMap<String, TypeEntry>,
    /// Settings keyed by `Owner.method`
    pub operations: BTreeMap<String, OperationEntry>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::default(),
            default_ttl_secs: DEFAULT_TTL.as_secs(),
            lock_granularity: LockGranularity::default(),
            propagation: PropagationConfig::default(),
            types: BTreeMap::new(),
            operations: BTreeMap::new(),
        }
    }
}

/// Method-name selection for transactional wrapping
///
/// At most one of `names` and `pattern` may be set. With neither, every
/// call is wrapped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationConfig {
    /// Exact method names
    pub names: Vec<String>,
    /// Regular expression matched against the method name
    pub pattern: Option<String>,
    /// Match `pattern` ignoring case
    pub case_insensitive: bool,
}

/// Settings of one owning type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeEntry {
    /// Isolation override
    pub isolation: Option<IsolationLevel>,
}

/// Settings of one operation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationEntry {
    /// Mark the operation as cached even without other cache settings
    pub cached: bool,
    /// Cache namespace override
    pub cache_namespace: Option<String>,
    /// Cache key override
    pub cache_key: Option<String>,
    /// Time-to-live override in seconds
    pub ttl_secs: Option<u64>,
    /// Isolation override
    pub isolation: Option<IsolationLevel>,
    /// Namespaces evicted after success
    pub evict: Option<EvictList>,
}

/// Evicted namespaces, either one comma-delimited string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EvictList {
    /// `evict = "a, b"`
    One(String),
    /// `evict = ["a", "b"]`
    Many(Vec<String>),
}

impl EvictList {
    fn into_vec(self) -> Vec<String> {
        match self {
            EvictList::One(list) => vec![list],
            EvictList::Many(lists) => lists,
        }
    }
}

impl GuardConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GuardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            operations = config.operations.len(),
            types = config.types.len(),
            "Loaded guard configuration"
        );
        Ok(config)
    }

    /// Default time-to-live as a duration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.propagation.names.is_empty() && self.propagation.pattern.is_some() {
            return Err(ConfigError::Invalid(
                "propagation: set either `names` or `pattern`, not both".to_string(),
            ));
        }
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "default_ttl_secs must be greater than zero".to_string(),
            ));
        }
        for name in self.operations.keys() {
            if OperationId::parse(name).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "operation `{}` is not of the form Owner.method",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Build the metadata registry described by this configuration
    pub fn into_registry(&self) -> Result<MetadataRegistry, ConfigError> {
        self.validate()?;
        let registry = MetadataRegistry::new();

        for (owner, entry) in &self.types {
            registry.register_type(
                owner.clone(),
                TypeConfig {
                    isolation: entry.isolation,
                },
            );
        }

        for (name, entry) in &self.operations {
            let op = OperationId::parse(name).ok_or_else(|| {
                ConfigError::Invalid(format!("operation `{}` is not of the form Owner.method", name))
            })?;
            registry.register_operation(op, entry.clone().into_operation_config());
        }

        Ok(registry)
    }
}

impl OperationEntry {
    fn into_operation_config(self) -> OperationConfig {
        let has_cache_settings = self.cached
            || self.cache_namespace.is_some()
            || self.cache_key.is_some()
            || self.ttl_secs.is_some();

        let cache = has_cache_settings.then(|| CacheConfig {
            namespace: self.cache_namespace,
            key: self.cache_key,
            ttl: self.ttl_secs.map(Duration::from_secs),
        });

        OperationConfig {
            cache,
            isolation: self.isolation,
            evict: self.evict.map(EvictList::into_vec).unwrap_or_default(),
        }
    }
}
