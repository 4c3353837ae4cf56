//! LIQUID Cache - Smart Refresh Cache Controller
//!
//! A demand-driven cache for named upstream resources:
//!
//! - the first read of a resource waits for the upstream fetch;
//! - later reads are served from memory, fresh or stale;
//! - a stale read starts exactly one background refresh, and every read
//!   arriving while it runs is served the cached value without starting
//!   another;
//! - each fetch is tracked as a process that callers can poll by id.
//!
//! Failures never discard data. A failed refresh keeps serving the previous
//! value and records the error; only a resource with nothing cached surfaces
//! the failure to readers. There is no automatic retry: the next read is the
//! retry.
//!
//! The cache is process-local. Separate server instances hold separate
//! caches and run their own fetches.

pub mod config;
pub mod controller;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod process;
pub mod registry;

pub use config::{
    CacheConfig, ControllerConfig, DEFAULT_MAX_TRACKED_PROCESSES, DEFAULT_PROCESS_RETENTION,
    DEFAULT_REFRESH_INTERVAL,
};
pub use controller::{Cacheable, SmartController};
pub use entry::{CacheStats, EntrySnapshot};
pub use error::{CacheError, CacheResult};
pub use fetcher::{from_fn, DataFetcher, FnFetcher};
pub use freshness::{CacheRead, EntryState, ReadSource};
pub use process::{ProcessStatus, ProcessTracker, ProcessView};
pub use registry::RefreshCache;
