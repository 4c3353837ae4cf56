//! Smart refresh controller: serve cached data, refresh in the background.
//!
//! A [`SmartController`] is bound to one resource key and one upstream
//! fetcher. Reads follow these rules:
//!
//! - nothing cached and nothing in flight: start a fetch and wait for it;
//! - nothing cached but a fetch in flight: wait for that same fetch;
//! - fresh data: return it;
//! - stale data: return it and start one background refresh;
//! - data with a refresh in flight: return it, start nothing.
//!
//! The in-flight marker is written under the entry lock before the fetch
//! task is spawned, so no two fetches for the same key ever overlap. Fetches
//! run in their own task and always complete, even if every reader that
//! triggered them has gone away.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use liquid_core::{FetchError, ProcessId, ResourceKey};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::ControllerConfig;
use crate::entry::{AtomicCacheStats, CacheEntry, EntrySnapshot, EntryView};
use crate::error::{CacheError, CacheResult};
use crate::fetcher::DataFetcher;
use crate::freshness::{CacheRead, EntryState, ReadSource};
use crate::process::{wait_finished, ProcessStatus, ProcessTracker};

/// Payloads the cache can hold.
///
/// `Serialize` is required so finished processes can report their data.
pub trait Cacheable: Serialize + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + Send + Sync + 'static {}

struct ControllerInner<T> {
    key: ResourceKey,
    fetcher: Arc<dyn DataFetcher<T>>,
    refresh_interval: Duration,
    entry: Mutex<CacheEntry<T>>,
    stats: AtomicCacheStats,
    tracker: ProcessTracker,
}

enum ReadPlan<T> {
    Serve(CacheRead<T>),
    Wait(ProcessId, watch::Receiver<ProcessStatus>),
}

/// Handle to one cached resource. Cheap to clone.
pub struct SmartController<T> {
    inner: Arc<ControllerInner<T>>,
}

impl<T> Clone for SmartController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Cacheable> SmartController<T> {
    pub(crate) fn new(config: ControllerConfig<T>, tracker: ProcessTracker) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                key: config.resource_key,
                fetcher: config.fetcher,
                refresh_interval: config.refresh_interval,
                entry: Mutex::new(CacheEntry::default()),
                stats: AtomicCacheStats::default(),
                tracker,
            }),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.inner.key
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.inner.tracker
    }

    /// Current lifecycle state of the entry.
    pub fn state(&self) -> EntryState {
        self.inner
            .lock_entry()
            .state(Instant::now(), self.inner.refresh_interval)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        self.inner.snapshot()
    }

    /// Status of a fetch started by this cache (any resource).
    pub fn process_status(&self, id: ProcessId) -> ProcessStatus {
        self.inner.tracker.status(id)
    }

    /// Read the resource.
    ///
    /// Only blocks when there is no data to serve. Fails only when the fetch
    /// it waited on failed.
    pub async fn read(&self) -> CacheResult<CacheRead<T>> {
        self.inner.stats.read();
        match self.plan_read() {
            ReadPlan::Serve(read) => Ok(read),
            ReadPlan::Wait(id, receiver) => {
                let status = wait_finished(receiver).await;
                self.finish_wait(id, status)
            }
        }
    }

    /// Start a background fetch unless one is already running.
    ///
    /// Returns the id of the fetch in flight. Must be called from within a
    /// tokio runtime.
    pub fn refresh(&self) -> ProcessId {
        let mut entry = self.inner.lock_entry();
        if let Some(id) = entry.in_flight {
            tracing::debug!(resource = %self.inner.key, process_id = %id, "Refresh already in flight");
            return id;
        }
        let (id, _) = self.begin_fetch(&mut entry);
        id
    }

    /// Decide how to answer a read. Runs entirely under the entry lock.
    fn plan_read(&self) -> ReadPlan<T> {
        let inner = &self.inner;
        let now = Instant::now();
        let mut entry = inner.lock_entry();

        if let Some(data) = entry.data.clone() {
            let fetched_at = entry.fetched_at_wall.unwrap_or_else(Utc::now);

            if let Some(id) = entry.in_flight {
                inner.stats.refreshing_serve();
                return ReadPlan::Serve(CacheRead::new(
                    data,
                    ReadSource::Refreshing,
                    fetched_at,
                    Some(id),
                ));
            }

            if entry.is_stale(now, inner.refresh_interval) {
                let (id, _) = self.begin_fetch(&mut entry);
                inner.stats.stale_serve();
                tracing::debug!(resource = %inner.key, process_id = %id, "Serving stale data, refresh started");
                return ReadPlan::Serve(CacheRead::new(data, ReadSource::Stale, fetched_at, Some(id)));
            }

            inner.stats.hit();
            return ReadPlan::Serve(CacheRead::new(data, ReadSource::Fresh, fetched_at, None));
        }

        inner.stats.miss();
        if let Some(id) = entry.in_flight {
            if let Some(receiver) = inner.tracker.subscribe(id) {
                tracing::debug!(resource = %inner.key, process_id = %id, "Joining in-flight fetch");
                return ReadPlan::Wait(id, receiver);
            }
        }

        let (id, receiver) = self.begin_fetch(&mut entry);
        ReadPlan::Wait(id, receiver)
    }

    /// Mark the entry as refreshing and spawn the fetch task.
    ///
    /// Caller holds the entry lock; the marker is set before the task can run.
    fn begin_fetch(&self, entry: &mut CacheEntry<T>) -> (ProcessId, watch::Receiver<ProcessStatus>) {
        let id = ProcessId::new();
        let receiver = self.inner.tracker.start(id, self.inner.key.clone());
        entry.in_flight = Some(id);
        self.inner.stats.fetch_started();

        let inner = Arc::clone(&self.inner);
        let span = tracing::info_span!("cache_fetch", resource = %inner.key, process_id = %id);
        tokio::spawn(async move { inner.run_fetch(id).await }.instrument(span));

        (id, receiver)
    }

    fn finish_wait(&self, id: ProcessId, status: ProcessStatus) -> CacheResult<CacheRead<T>> {
        if let ProcessStatus::Failed { error } = status {
            return Err(CacheError::Fetch {
                resource: self.inner.key.clone(),
                source: error,
            });
        }

        let entry = self.inner.lock_entry();
        match (&entry.data, &entry.last_error) {
            (Some(data), _) => Ok(CacheRead::new(
                Arc::clone(data),
                ReadSource::Miss,
                entry.fetched_at_wall.unwrap_or_else(Utc::now),
                Some(id),
            )),
            (None, Some(error)) => Err(CacheError::Fetch {
                resource: self.inner.key.clone(),
                source: error.clone(),
            }),
            (None, None) => Err(CacheError::Internal {
                resource: self.inner.key.clone(),
                reason: format!("process {} finished without data", id),
            }),
        }
    }

    pub(crate) fn view(&self) -> Arc<dyn EntryView> {
        self.inner.clone()
    }
}

impl<T: Cacheable> ControllerInner<T> {
    fn lock_entry(&self) -> MutexGuard<'_, CacheEntry<T>> {
        // Nothing panics while holding the lock; recover the data regardless.
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_fetch(&self, id: ProcessId) {
        let started = Instant::now();
        tracing::debug!("Upstream fetch started");

        let result = match AssertUnwindSafe(self.fetcher.fetch()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(FetchError::panicked(panic_message(payload.as_ref()))),
        };

        self.complete_fetch(id, result, started.elapsed());
    }

    fn complete_fetch(&self, id: ProcessId, result: Result<T, FetchError>, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        let status = match &result {
            Ok(value) => ProcessStatus::Succeeded {
                data: serde_json::to_value(value)
                    .map_err(|e| {
                        tracing::warn!(error = %e, "Fetched payload could not be serialized for status reporting");
                    })
                    .ok(),
            },
            Err(error) => ProcessStatus::Failed {
                error: error.clone(),
            },
        };

        let mut entry = self.lock_entry();
        if entry.in_flight == Some(id) {
            entry.in_flight = None;
        }

        match result {
            Ok(value) => {
                entry.data = Some(Arc::new(value));
                entry.fetched_at = Some(Instant::now());
                entry.fetched_at_wall = Some(Utc::now());
                entry.last_error = None;
                tracing::info!(elapsed_ms, "Upstream fetch succeeded");
            }
            Err(error) => {
                self.stats.fetch_failed();
                tracing::warn!(
                    error = %error,
                    elapsed_ms,
                    serving_previous = entry.data.is_some(),
                    "Upstream fetch failed"
                );
                entry.last_error = Some(error);
            }
        }

        // Still under the entry lock: a reader that saw this id in flight
        // always finds a tracked record.
        self.tracker.complete(id, status);
    }
}

impl<T: Cacheable> EntryView for ControllerInner<T> {
    fn snapshot(&self) -> EntrySnapshot {
        let now = Instant::now();
        let entry = self.lock_entry();
        EntrySnapshot {
            key: self.key.clone(),
            state: entry.state(now, self.refresh_interval),
            fetched_at: entry.fetched_at_wall,
            age_ms: entry.age(now).map(|age| age.as_millis() as u64),
            refresh_interval_ms: self.refresh_interval.as_millis() as u64,
            in_flight: entry.in_flight,
            last_error: entry.last_error.clone(),
            stats: self.stats.snapshot(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::fetcher::from_fn;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    type TestResult = Result<(), Box<dyn Error>>;

    /// Counts fetches; each fetch waits for one gate permit.
    struct GatedCounter {
        calls: AtomicUsize,
        gate: Semaphore,
    }

    impl GatedCounter {
        fn new(permits: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(permits),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn counting_controller(fetches: &Arc<GatedCounter>, interval: Duration) -> Result<SmartController<u64>, Box<dyn Error>> {
        let fetches = Arc::clone(fetches);
        let fetcher: Arc<dyn DataFetcher<u64>> = Arc::new(from_fn(move || {
            let fetches = Arc::clone(&fetches);
            async move {
                let n = fetches.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
                fetches
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| FetchError::upstream(e.to_string()))?
                    .forget();
                Ok(n)
            }
        }));
        let config = ControllerConfig::new(ResourceKey::new("counter")?, fetcher)
            .with_refresh_interval(interval);
        Ok(SmartController::new(config, ProcessTracker::new(&CacheConfig::default())))
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_first_read_fetches_then_fresh_hits() -> TestResult {
        let fetches = GatedCounter::new(1);
        let controller = counting_controller(&fetches, Duration::from_secs(60))?;
        assert_eq!(controller.state(), EntryState::Empty);

        let read = controller.read().await?;
        assert_eq!(*read.value(), 1);
        assert_eq!(read.source(), ReadSource::Miss);
        assert!(read.refresh().is_some());

        let read = controller.read().await?;
        assert_eq!(*read.value(), 1);
        assert_eq!(read.source(), ReadSource::Fresh);
        assert_eq!(read.refresh(), None);
        assert_eq!(fetches.calls(), 1);
        assert_eq!(controller.state(), EntryState::Fresh);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_share_one_fetch() -> TestResult {
        let fetches = GatedCounter::new(0);
        let controller = counting_controller(&fetches, Duration::from_secs(60))?;

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.read().await })
            })
            .collect();
        settle().await;

        assert_eq!(controller.state(), EntryState::Refreshing);
        assert_eq!(fetches.calls(), 1);
        fetches.gate.add_permits(1);

        for reader in readers {
            let read = reader.await??;
            assert_eq!(*read.value(), 1);
        }
        assert_eq!(fetches.calls(), 1);
        assert_eq!(controller.snapshot().stats.misses, 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reads_trigger_single_refresh() -> TestResult {
        let fetches = GatedCounter::new(1);
        let controller = counting_controller(&fetches, Duration::from_secs(60))?;
        controller.read().await?;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(controller.state(), EntryState::Stale);

        let first = controller.read().await?;
        assert_eq!(first.source(), ReadSource::Stale);
        let refresh_id = first.refresh().ok_or("stale read should start a refresh")?;

        for _ in 0..5 {
            let read = controller.read().await?;
            assert_eq!(*read.value(), 1);
            assert_eq!(read.source(), ReadSource::Refreshing);
            assert_eq!(read.refresh(), Some(refresh_id));
        }
        settle().await;
        assert_eq!(fetches.calls(), 2);

        fetches.gate.add_permits(1);
        assert!(controller.tracker().wait(refresh_id).await.is_finished());

        let read = controller.read().await?;
        assert_eq!(*read.value(), 2);
        assert_eq!(read.source(), ReadSource::Fresh);
        assert_eq!(fetches.calls(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stale_reads_share_one_refresh() -> TestResult {
        let fetches = GatedCounter::new(1);
        let controller = counting_controller(&fetches, Duration::from_secs(60))?;
        controller.read().await?;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(controller.state(), EntryState::Stale);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.read().await })
            })
            .collect();
        settle().await;

        let mut stale = 0;
        let mut refresh_ids = Vec::new();
        for reader in readers {
            let read = reader.await??;
            assert_eq!(*read.value(), 1);
            match read.source() {
                ReadSource::Stale => stale += 1,
                ReadSource::Refreshing => {}
                other => return Err(format!("unexpected read source {other:?}").into()),
            }
            refresh_ids.push(read.refresh().ok_or("stale read should carry a refresh id")?);
        }
        assert_eq!(stale, 1);
        assert!(refresh_ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(controller.state(), EntryState::Refreshing);
        assert_eq!(fetches.calls(), 2);

        fetches.gate.add_permits(1);
        assert!(controller.tracker().wait(refresh_ids[0]).await.is_finished());

        let read = controller.read().await?;
        assert_eq!(*read.value(), 2);
        assert_eq!(read.source(), ReadSource::Fresh);
        assert_eq!(fetches.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_returns_in_flight_id() -> TestResult {
        let fetches = GatedCounter::new(0);
        let controller = counting_controller(&fetches, Duration::from_secs(60))?;

        let first = controller.refresh();
        let second = controller.refresh();
        assert_eq!(first, second);
        assert_eq!(controller.process_status(first), ProcessStatus::Pending);

        fetches.gate.add_permits(1);
        let status = controller.tracker().wait(first).await;
        assert_eq!(
            status,
            ProcessStatus::Succeeded {
                data: Some(serde_json::json!(1))
            }
        );

        let third = controller.refresh();
        assert_ne!(first, third);
        fetches.gate.add_permits(1);
        controller.tracker().wait(third).await;
        assert_eq!(*controller.read().await?.value(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_recorded_and_recoverable() -> TestResult {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: Arc<dyn DataFetcher<u64>> = Arc::new(from_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("upstream exploded");
                }
                Ok::<u64, FetchError>(9)
            }
        }));
        let config = ControllerConfig::new(ResourceKey::new("panicky")?, fetcher);
        let controller = SmartController::new(config, ProcessTracker::new(&CacheConfig::default()));

        let err = match controller.read().await {
            Err(err) => err,
            Ok(_) => return Err("first read should fail".into()),
        };
        match err.fetch_error() {
            Some(FetchError::Panicked { reason }) => assert!(reason.contains("upstream exploded")),
            other => return Err(format!("unexpected error: {:?}", other).into()),
        }
        assert_eq!(controller.state(), EntryState::Failed);

        assert_eq!(*controller.read().await?.value(), 9);
        assert_eq!(controller.state(), EntryState::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
