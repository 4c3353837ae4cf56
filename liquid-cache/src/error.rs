//! Error types for cache operations.

use liquid_core::{FetchError, LiquidError, ResourceKey};
use thiserror::Error;

/// Errors surfaced by the refresh cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The upstream fetch failed and there is no cached data to fall back on.
    #[error("Fetch failed for {resource}: {source}")]
    Fetch {
        resource: ResourceKey,
        #[source]
        source: FetchError,
    },

    #[error("Resource already registered: {0}")]
    DuplicateResource(ResourceKey),

    #[error("Resource not registered: {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Invalid(#[from] LiquidError),

    #[error("Cache invariant violated for {resource}: {reason}")]
    Internal {
        resource: ResourceKey,
        reason: String,
    },
}

impl CacheError {
    /// The upstream failure behind this error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_is_exposed() -> Result<(), LiquidError> {
        let err = CacheError::Fetch {
            resource: ResourceKey::new("market-data")?,
            source: FetchError::upstream("connection reset"),
        };
        assert_eq!(err.fetch_error(), Some(&FetchError::upstream("connection reset")));
        assert!(err.to_string().contains("market-data"));
        assert!(err.to_string().contains("connection reset"));

        let err = CacheError::UnknownResource("pools".to_string());
        assert!(err.fetch_error().is_none());
        Ok(())
    }
}
