//! Transaction isolation levels
//!
//! The four levels follow standard SQL isolation semantics and are totally
//! ordered from weakest to strongest. The numeric codes (1/2/4/8) match the
//! values drivers conventionally use for the same levels.

use crate::error::ConfigError;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Isolation level of a transaction
///
/// Ordering is by strength: `ReadUncommitted < ReadCommitted < RepeatableRead < Serializable`.
/// Within one call chain the effective level only ever increases.
///
/// # Examples
///
/// ```
/// use txguard_core::IsolationLevel;
///
/// assert!(IsolationLevel::ReadCommitted < IsolationLevel::Serializable);
/// assert_eq!(IsolationLevel::RepeatableRead.code(), 4);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads allowed
    ReadUncommitted,
    /// Only committed data is visible
    #[default]
    ReadCommitted,
    /// Rows read once stay stable for the transaction
    RepeatableRead,
    /// Full serializability
    Serializable,
}

impl IsolationLevel {
    /// All levels, weakest first
    pub const ALL: [IsolationLevel; 4] = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    /// Numeric code (1, 2, 4 or 8)
    pub fn code(self) -> i32 {
        match self {
            IsolationLevel::ReadUncommitted => 1,
            IsolationLevel::ReadCommitted => 2,
            IsolationLevel::RepeatableRead => 4,
            IsolationLevel::Serializable => 8,
        }
    }

    /// Level for a numeric code, `None` for anything but 1/2/4/8
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(IsolationLevel::ReadUncommitted),
            2 => Some(IsolationLevel::ReadCommitted),
            4 => Some(IsolationLevel::RepeatableRead),
            8 => Some(IsolationLevel::Serializable),
            _ => None,
        }
    }

    /// Name in snake_case, as used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = ConfigError;

    /// Accepts `read_committed`, `READ_COMMITTED`, `read-committed` and
    /// `read committed` spellings, or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        let level = match normalized.as_str() {
            "read_uncommitted" => Some(IsolationLevel::ReadUncommitted),
            "read_committed" => Some(IsolationLevel::ReadCommitted),
            "repeatable_read" => Some(IsolationLevel::RepeatableRead),
            "serializable" => Some(IsolationLevel::Serializable),
            other => other.parse::<i32>().ok().and_then(IsolationLevel::from_code),
        };

        level.ok_or_else(|| ConfigError::InvalidIsolation(s.to_string()))
    }
}

/// Deserializes from any spelling [`FromStr`] accepts, or from the numeric code.
impl<'de> Deserialize<'de> for IsolationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl<'de> Visitor<'de> for LevelVisitor {
            type Value = IsolationLevel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an isolation level name or one of the codes 1, 2, 4, 8")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                i32::try_from(v)
                    .ok()
                    .and_then(IsolationLevel::from_code)
                    .ok_or_else(|| E::custom(format!("invalid isolation code {}", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map_err(|_| E::custom(format!("invalid isolation code {}", v)))
                    .and_then(|v| self.visit_i64(v))
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}
