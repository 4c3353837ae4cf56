//! Per-resource cache entry, counters and snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use liquid_core::{FetchError, ProcessId, ResourceKey, Timestamp};
use serde::Serialize;
use tokio::time::Instant;

use crate::freshness::EntryState;

// ============================================================================
// ENTRY
// ============================================================================

/// Mutable state of one cached resource.
///
/// `data` is only replaced by a successful fetch. `in_flight` is set before
/// the fetch task is spawned and cleared by the task itself.
pub(crate) struct CacheEntry<T> {
    pub(crate) data: Option<Arc<T>>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) fetched_at_wall: Option<Timestamp>,
    pub(crate) last_error: Option<FetchError>,
    pub(crate) in_flight: Option<ProcessId>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            fetched_at: None,
            fetched_at_wall: None,
            last_error: None,
            in_flight: None,
        }
    }
}

impl<T> CacheEntry<T> {
    pub(crate) fn state(&self, now: Instant, refresh_interval: Duration) -> EntryState {
        if self.in_flight.is_some() {
            return EntryState::Refreshing;
        }
        match (&self.data, &self.last_error) {
            (None, None) => EntryState::Empty,
            (None, Some(_)) => EntryState::Failed,
            (Some(_), _) if self.is_stale(now, refresh_interval) => EntryState::Stale,
            (Some(_), _) => EntryState::Fresh,
        }
    }

    pub(crate) fn is_stale(&self, now: Instant, refresh_interval: Duration) -> bool {
        match self.fetched_at {
            Some(fetched_at) => now.saturating_duration_since(fetched_at) >= refresh_interval,
            None => true,
        }
    }

    pub(crate) fn age(&self, now: Instant) -> Option<Duration> {
        self.fetched_at
            .map(|fetched_at| now.saturating_duration_since(fetched_at))
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Read and fetch counters for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheStats {
    /// Total reads.
    pub reads: u64,
    /// Reads served from fresh data.
    pub hits: u64,
    /// Reads served from stale data (each started a refresh).
    pub stale_serves: u64,
    /// Reads served while a refresh was already running.
    pub refreshing_serves: u64,
    /// Reads that had to wait on a fetch.
    pub misses: u64,
    /// Upstream fetches started.
    pub fetches_started: u64,
    /// Upstream fetches that failed.
    pub fetch_failures: u64,
}

impl CacheStats {
    /// Share of reads answered from cached data (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_serves + self.refreshing_serves;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AtomicCacheStats {
    reads: AtomicU64,
    hits: AtomicU64,
    stale_serves: AtomicU64,
    refreshing_serves: AtomicU64,
    misses: AtomicU64,
    fetches_started: AtomicU64,
    fetch_failures: AtomicU64,
}

impl AtomicCacheStats {
    pub(crate) fn read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stale_serve(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn refreshing_serve(&self) {
        self.refreshing_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            refreshing_serves: self.refreshing_serves.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Read-only view of an entry for introspection endpoints.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntrySnapshot {
    pub key: ResourceKey,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub fetched_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
    pub refresh_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<ProcessId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FetchError>,
    pub stats: CacheStats,
}

/// Type-erased access to an entry, held by the registry.
pub(crate) trait EntryView: Send + Sync {
    fn snapshot(&self) -> EntrySnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_entry_state_transitions() {
        let mut entry: CacheEntry<u32> = CacheEntry::default();
        let start = Instant::now();
        assert_eq!(entry.state(start, INTERVAL), EntryState::Empty);

        entry.in_flight = Some(ProcessId::new());
        assert_eq!(entry.state(start, INTERVAL), EntryState::Refreshing);

        entry.in_flight = None;
        entry.last_error = Some(FetchError::upstream("down"));
        assert_eq!(entry.state(start, INTERVAL), EntryState::Failed);

        entry.data = Some(Arc::new(7));
        entry.fetched_at = Some(start);
        assert_eq!(entry.state(start, INTERVAL), EntryState::Fresh);

        tokio::time::advance(INTERVAL).await;
        assert_eq!(entry.state(Instant::now(), INTERVAL), EntryState::Stale);
        assert_eq!(entry.age(Instant::now()), Some(INTERVAL));
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            stale_serves: 1,
            refreshing_serves: 1,
            misses: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_atomic_stats_snapshot() {
        let stats = AtomicCacheStats::default();
        stats.read();
        stats.read();
        stats.hit();
        stats.miss();
        stats.fetch_started();
        stats.fetch_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.reads, 2);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.fetches_started, 1);
        assert_eq!(snapshot.fetch_failures, 1);
    }
}
