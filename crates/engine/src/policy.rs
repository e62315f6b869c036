//! Propagation policies
//!
//! A [`PropagationPolicy`] decides, per method name, whether a call is
//! wrapped in a transaction at all. Calls that do not match run unwrapped.
//!
//! | Policy | Matches |
//! |--------|---------|
//! | [`AlwaysPolicy`] | every method |
//! | [`NeverPolicy`] | no method |
//! | [`MethodNamePolicy`] | exact names from a set |
//! | [`MethodPatternPolicy`] | names fully matching a regular expression |
//!
//! Any `Fn(&str) -> bool` closure is also a policy.

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use txguard_core::{ConfigError, PropagationConfig};

/// Decides whether a method gets a transaction
pub trait PropagationPolicy: Send + Sync {
    /// Check if calls to `method` are wrapped
    fn applies_to(&self, method: &str) -> bool;
}

impl<F> PropagationPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn applies_to(&self, method: &str) -> bool {
        self(method)
    }
}

/// Wraps every call
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPolicy;

impl PropagationPolicy for AlwaysPolicy {
    fn applies_to(&self, _method: &str) -> bool {
        true
    }
}

/// Wraps no call
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPolicy;

impl PropagationPolicy for NeverPolicy {
    fn applies_to(&self, _method: &str) -> bool {
        false
    }
}

/// Wraps calls whose method name is in a fixed set
#[derive(Debug, Clone, Default)]
pub struct MethodNamePolicy {
    names: HashSet<String>,
}

impl MethodNamePolicy {
    /// Policy matching exactly `names`
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of names in the set
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PropagationPolicy for MethodNamePolicy {
    fn applies_to(&self, method: &str) -> bool {
        self.names.contains(method)
    }
}

/// Wraps calls whose whole method name matches a regular expression
///
/// The pattern is anchored at both ends: `save.*` matches `saveUser` but
/// `save` does not match `saveUser`.
#[derive(Debug, Clone)]
pub struct MethodPatternPolicy {
    regex: Regex,
}

impl MethodPatternPolicy {
    /// Compile `pattern`, optionally ignoring case
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }

    /// The anchored expression in use
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PropagationPolicy for MethodPatternPolicy {
    fn applies_to(&self, method: &str) -> bool {
        self.regex.is_match(method)
    }
}

/// Build the policy described by a configuration section
///
/// Neither `names` nor `pattern` set means every call is wrapped.
pub fn policy_from_config(
    config: &PropagationConfig,
) -> Result<Arc<dyn PropagationPolicy>, ConfigError> {
    match (&config.pattern, config.names.is_empty()) {
        (Some(_), false) => Err(ConfigError::Invalid(
            "propagation: set either `names` or `pattern`, not both".to_string(),
        )),
        (Some(pattern), true) => Ok(Arc::new(MethodPatternPolicy::new(
            pattern,
            config.case_insensitive,
        )?)),
        (None, false) => Ok(Arc::new(MethodNamePolicy::new(config.names.iter().cloned()))),
        (None, true) => Ok(Arc::new(AlwaysPolicy)),
    }
}
