//! Identity types for cached resources and refresh processes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LiquidError, LiquidResult};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Maximum length of a resource key.
pub const MAX_RESOURCE_KEY_LEN: usize = 64;

// ============================================================================
// RESOURCE KEY
// ============================================================================

/// Logical name of a cached resource (e.g. `market-data`).
///
/// Keys double as URL segments, so they are restricted to lowercase ASCII
/// letters, digits and inner hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> LiquidResult<Self> {
        let key = key.into();
        validate_resource_key(&key)?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_resource_key(key: &str) -> LiquidResult<()> {
    let invalid = |reason: &str| LiquidError::InvalidResourceKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if key.len() > MAX_RESOURCE_KEY_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if key.starts_with('-') || key.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(&format!("unexpected character {:?}", c)));
    }
    Ok(())
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ResourceKey {
    type Err = LiquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = LiquidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PROCESS ID
// ============================================================================

/// Identifier of one upstream fetch run by the cache.
///
/// UUIDv7, so ids sort by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Generate a new time-sortable process id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ProcessId {
    type Err = LiquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| LiquidError::InvalidProcessId {
                value: s.to_string(),
            })
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_generated_keys_validate(key in "[a-z0-9]([a-z0-9-]{0,62}[a-z0-9])?") {
            prop_assert!(ResourceKey::new(key).is_ok());
        }

        #[test]
        fn prop_uppercase_keys_rejected(key in "[a-z]{0,10}[A-Z][a-z]{0,10}") {
            prop_assert!(ResourceKey::new(key).is_err());
        }
    }
}
