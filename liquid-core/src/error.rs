//! Error types for LIQUID operations

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upstream fetch failures.
///
/// Cloneable so a single failure can be handed to every reader that joined
/// the same fetch and kept on the cache entry for later inspection.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Upstream request failed: {reason}")]
    Upstream { reason: String },

    #[error("Upstream responded with status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Upstream timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to decode upstream payload: {reason}")]
    Decode { reason: String },

    #[error("Fetch task panicked: {reason}")]
    Panicked { reason: String },
}

impl FetchError {
    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::Upstream {
            reason: reason.into(),
        }
    }

    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn panicked(reason: impl Into<String>) -> Self {
        Self::Panicked {
            reason: reason.into(),
        }
    }
}

/// Validation errors for identifiers and configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LiquidError {
    #[error("Invalid resource key '{key}': {reason}")]
    InvalidResourceKey { key: String, reason: String },

    #[error("Invalid process id '{value}'")]
    InvalidProcessId { value: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },
}

/// Result type alias for LIQUID validation operations.
pub type LiquidResult<T> = Result<T, LiquidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::status(502, "bad gateway");
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));

        let err = FetchError::timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Upstream timed out after 1500ms");
    }

    #[test]
    fn test_fetch_error_serializes_with_kind_tag() -> Result<(), serde_json::Error> {
        let err = FetchError::upstream("connection refused");
        let json = serde_json::to_value(&err)?;
        assert_eq!(json["kind"], "upstream");
        assert_eq!(json["reason"], "connection refused");
        Ok(())
    }

    #[test]
    fn test_invalid_resource_key_display() {
        let err = LiquidError::InvalidResourceKey {
            key: "Market Data".to_string(),
            reason: "contains whitespace".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Market Data"));
        assert!(msg.contains("whitespace"));
    }
}
