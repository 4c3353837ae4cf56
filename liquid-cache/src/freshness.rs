//! Freshness states and the read wrapper returned to callers.
//!
//! Reads never hide staleness: every [`CacheRead`] says whether the value was
//! fresh, stale, served during a refresh, or fetched on a miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use liquid_core::{ProcessId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntryState {
    /// Nothing fetched yet and nothing in flight.
    Empty,
    /// Data younger than the refresh interval.
    Fresh,
    /// Data at or past the refresh interval; next read triggers a refresh.
    Stale,
    /// A fetch is in flight.
    Refreshing,
    /// Last fetch failed and there is no data to fall back on.
    Failed,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }

    /// Whether an entry in this state may hold servable data.
    pub fn can_serve(&self) -> bool {
        matches!(self, Self::Fresh | Self::Stale | Self::Refreshing)
    }
}

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    /// Cached data within the refresh interval.
    Fresh,
    /// Cached data past the interval; a background refresh was started.
    Stale,
    /// Cached data served while a refresh was already running.
    Refreshing,
    /// No data was cached; the reader waited on a fetch.
    Miss,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Miss => "miss",
        }
    }

    pub fn was_cache_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}

/// Result of a cache read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: Arc<T>,
    source: ReadSource,
    fetched_at: Timestamp,
    refresh: Option<ProcessId>,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(
        value: Arc<T>,
        source: ReadSource,
        fetched_at: Timestamp,
        refresh: Option<ProcessId>,
    ) -> Self {
        Self {
            value,
            source,
            fetched_at,
            refresh,
        }
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_shared(self) -> Arc<T> {
        self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// When the served value was fetched from upstream.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Fetch in flight for this resource, if any: either the one this read
    /// started or the one it found running.
    pub fn refresh(&self) -> Option<ProcessId> {
        self.refresh
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source.was_cache_hit()
    }

    /// Wall-clock age of the served value.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_state_can_serve() {
        assert!(EntryState::Fresh.can_serve());
        assert!(EntryState::Stale.can_serve());
        assert!(EntryState::Refreshing.can_serve());
        assert!(!EntryState::Empty.can_serve());
        assert!(!EntryState::Failed.can_serve());
    }

    #[test]
    fn test_read_source_hits() {
        assert!(ReadSource::Fresh.was_cache_hit());
        assert!(ReadSource::Stale.was_cache_hit());
        assert!(ReadSource::Refreshing.was_cache_hit());
        assert!(!ReadSource::Miss.was_cache_hit());
        assert_eq!(ReadSource::Refreshing.as_str(), "refreshing");
    }

    #[test]
    fn test_cache_read_accessors() {
        let fetched_at = Utc::now() - chrono::Duration::seconds(5);
        let id = ProcessId::new();
        let read = CacheRead::new(Arc::new(42u32), ReadSource::Stale, fetched_at, Some(id));

        assert_eq!(*read.value(), 42);
        assert_eq!(read.refresh(), Some(id));
        assert_eq!(read.fetched_at(), fetched_at);
        assert!(read.age() >= Duration::from_secs(4));
        assert!(read.was_cache_hit());
        assert_eq!(*read.into_shared(), 42);
    }

    #[test]
    fn test_entry_state_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&EntryState::Refreshing)?, "\"Refreshing\"");
        assert_eq!(serde_json::to_string(&ReadSource::Miss)?, "\"miss\"");
        Ok(())
    }
}
