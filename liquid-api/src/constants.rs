//! Constants for LIQUID API
//!
//! Default values and fixed names used throughout the API.

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// CACHE
// ============================================================================

/// Market-data staleness interval in milliseconds (15 minutes)
pub const DEFAULT_MARKET_DATA_REFRESH_MS: u64 = 900_000;

/// Retention of finished refresh processes in seconds (10 minutes)
pub const DEFAULT_PROCESS_RETENTION_SECS: u64 = 600;

/// Maximum number of tracked refresh processes
pub const DEFAULT_MAX_TRACKED_PROCESSES: usize = liquid_cache::DEFAULT_MAX_TRACKED_PROCESSES;

/// Resource key of the market-data resource
pub const MARKET_DATA_RESOURCE: &str = "market-data";

// ============================================================================
// UPSTREAM
// ============================================================================

/// Upstream request timeout in milliseconds
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// RESPONSE HEADERS
// ============================================================================

/// How a cached read was satisfied: fresh, stale, refreshing or miss
pub const CACHE_STATE_HEADER: &str = "x-cache-state";

/// Id of the refresh in flight for the resource, if any
pub const REFRESH_PROCESS_HEADER: &str = "x-refresh-process-id";

// ============================================================================
// SERVER URLs
// ============================================================================

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:3000";
