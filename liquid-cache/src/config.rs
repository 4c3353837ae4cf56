//! Cache-wide and per-resource configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use liquid_core::ResourceKey;

use crate::fetcher::DataFetcher;

/// Default staleness threshold for a resource (15 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default time completed processes stay queryable (10 minutes).
pub const DEFAULT_PROCESS_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Default cap on retained process records.
pub const DEFAULT_MAX_TRACKED_PROCESSES: usize = 1024;

// ============================================================================
// CACHE CONFIG
// ============================================================================

/// Configuration shared by every resource in a [`crate::RefreshCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Refresh interval handed to controllers built via
    /// [`crate::RefreshCache::controller_config`].
    pub default_refresh_interval: Duration,
    /// How long a finished process stays queryable by id.
    pub process_retention: Duration,
    /// Upper bound on retained process records. Pending processes are
    /// never dropped, so the table can briefly exceed this.
    pub max_tracked_processes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            process_retention: DEFAULT_PROCESS_RETENTION,
            max_tracked_processes: DEFAULT_MAX_TRACKED_PROCESSES,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.default_refresh_interval = interval;
        self
    }

    /// Set the process retention window.
    pub fn with_process_retention(mut self, retention: Duration) -> Self {
        self.process_retention = retention;
        self
    }

    /// Set the max number of retained process records.
    pub fn with_max_tracked_processes(mut self, max: usize) -> Self {
        self.max_tracked_processes = max;
        self
    }
}

// ============================================================================
// CONTROLLER CONFIG
// ============================================================================

/// Configuration binding one resource key to its upstream fetcher.
///
/// `resource_key` and `fetcher` are required; `refresh_interval` defaults to
/// [`DEFAULT_REFRESH_INTERVAL`].
pub struct ControllerConfig<T> {
    pub resource_key: ResourceKey,
    pub fetcher: Arc<dyn DataFetcher<T>>,
    pub refresh_interval: Duration,
}

impl<T> ControllerConfig<T> {
    pub fn new(resource_key: ResourceKey, fetcher: Arc<dyn DataFetcher<T>>) -> Self {
        Self {
            resource_key,
            fetcher,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Set the staleness threshold. Zero makes every read after the first
    /// one trigger a background refresh.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

impl<T> Clone for ControllerConfig<T> {
    fn clone(&self) -> Self {
        Self {
            resource_key: self.resource_key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            refresh_interval: self.refresh_interval,
        }
    }
}

impl<T> fmt::Debug for ControllerConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("resource_key", &self.resource_key)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::from_fn;
    use liquid_core::{FetchError, LiquidError};

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_refresh_interval(Duration::from_secs(120))
            .with_process_retention(Duration::from_secs(30))
            .with_max_tracked_processes(16);

        assert_eq!(config.default_refresh_interval, Duration::from_secs(120));
        assert_eq!(config.process_retention, Duration::from_secs(30));
        assert_eq!(config.max_tracked_processes, 16);
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.default_refresh_interval, Duration::from_millis(900_000));
        assert_eq!(config.process_retention, DEFAULT_PROCESS_RETENTION);
        assert_eq!(config.max_tracked_processes, DEFAULT_MAX_TRACKED_PROCESSES);
    }

    #[test]
    fn test_controller_config_defaults_interval() -> Result<(), LiquidError> {
        let fetcher = Arc::new(from_fn(|| async { Ok::<_, FetchError>(1u8) }));
        let config: ControllerConfig<u8> = ControllerConfig::new(ResourceKey::new("tvl")?, fetcher);
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);

        let config = config.with_refresh_interval(Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert!(format!("{:?}", config).contains("tvl"));
        Ok(())
    }
}
