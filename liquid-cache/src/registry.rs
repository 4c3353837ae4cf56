//! The cache service object: one per process, shared by handle.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use liquid_core::{ProcessId, ResourceKey};

use crate::config::{CacheConfig, ControllerConfig};
use crate::controller::{Cacheable, SmartController};
use crate::entry::{EntrySnapshot, EntryView};
use crate::error::{CacheError, CacheResult};
use crate::fetcher::DataFetcher;
use crate::process::{ProcessStatus, ProcessTracker, ProcessView};

struct RegistryInner {
    config: CacheConfig,
    tracker: ProcessTracker,
    entries: DashMap<ResourceKey, Arc<dyn EntryView>>,
}

/// Process-wide refresh cache.
///
/// Construct once at startup and hand clones to whatever needs it. Each
/// resource key can be registered exactly once; the returned
/// [`SmartController`] is the only way to read that resource.
///
/// ```ignore
/// let cache = RefreshCache::new(CacheConfig::default());
/// let market = cache.register(
///     cache.controller_config(ResourceKey::new("market-data")?, fetcher),
/// )?;
/// let read = market.read().await?;
/// ```
#[derive(Clone)]
pub struct RefreshCache {
    inner: Arc<RegistryInner>,
}

impl RefreshCache {
    pub fn new(config: CacheConfig) -> Self {
        let tracker = ProcessTracker::new(&config);
        Self {
            inner: Arc::new(RegistryInner {
                config,
                tracker,
                entries: DashMap::new(),
            }),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.inner.tracker
    }

    /// Controller config using this cache's default refresh interval.
    pub fn controller_config<T>(
        &self,
        resource_key: ResourceKey,
        fetcher: Arc<dyn DataFetcher<T>>,
    ) -> ControllerConfig<T> {
        ControllerConfig::new(resource_key, fetcher)
            .with_refresh_interval(self.inner.config.default_refresh_interval)
    }

    /// Bind a resource key to its fetcher.
    ///
    /// Fails with [`CacheError::DuplicateResource`] if the key is taken.
    pub fn register<T: Cacheable>(&self, config: ControllerConfig<T>) -> CacheResult<SmartController<T>> {
        match self.inner.entries.entry(config.resource_key.clone()) {
            Entry::Occupied(occupied) => Err(CacheError::DuplicateResource(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                let refresh_interval = config.refresh_interval;
                let controller = SmartController::new(config, self.inner.tracker.clone());
                vacant.insert(controller.view());
                tracing::info!(
                    resource = %controller.key(),
                    refresh_interval_ms = refresh_interval.as_millis() as u64,
                    "Registered cached resource"
                );
                Ok(controller)
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Registered keys, sorted.
    pub fn resource_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Snapshot of one resource.
    pub fn snapshot(&self, key: &str) -> CacheResult<EntrySnapshot> {
        self.find(key)
            .map(|view| view.snapshot())
            .ok_or_else(|| CacheError::UnknownResource(key.to_string()))
    }

    /// Snapshots of every resource, sorted by key.
    pub fn snapshots(&self) -> Vec<EntrySnapshot> {
        let views: Vec<Arc<dyn EntryView>> = self
            .inner
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut snapshots: Vec<EntrySnapshot> = views.iter().map(|view| view.snapshot()).collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Status of a fetch by id. Untracked ids report `Unknown`.
    pub fn process_status(&self, id: ProcessId) -> ProcessStatus {
        self.inner.tracker.status(id)
    }

    /// Full process view by raw id string; `None` when unknown.
    pub fn process(&self, raw_id: &str) -> Option<ProcessView> {
        raw_id
            .parse::<ProcessId>()
            .ok()
            .and_then(|id| self.inner.tracker.lookup(id))
    }

    /// Wait for a fetch to finish.
    pub async fn wait_for_process(&self, id: ProcessId) -> ProcessStatus {
        self.inner.tracker.wait(id).await
    }

    pub fn default_refresh_interval(&self) -> Duration {
        self.inner.config.default_refresh_interval
    }

    fn find(&self, key: &str) -> Option<Arc<dyn EntryView>> {
        // Keys that fail validation can never have been registered.
        let key = ResourceKey::new(key).ok()?;
        self.inner
            .entries
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
    }
}

impl std::fmt::Debug for RefreshCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCache")
            .field("config", &self.inner.config)
            .field("resources", &self.resource_keys())
            .field("tracker", &self.inner.tracker)
            .finish()
    }
}
