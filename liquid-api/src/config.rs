//! API Configuration Module
//!
//! Configuration for CORS, the cache, and the market-data upstream. Values
//! are loaded from environment variables with defaults suited to local
//! development.

use std::str::FromStr;
use std::time::Duration;

use liquid_cache::CacheConfig;
use thiserror::Error;

use crate::constants::{
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_MARKET_DATA_REFRESH_MS, DEFAULT_MAX_TRACKED_PROCESSES,
    DEFAULT_PROCESS_RETENTION_SECS, DEFAULT_UPSTREAM_TIMEOUT_MS,
};

/// Invalid configuration value read from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set in production")]
    MissingInProduction(&'static str),
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS, caching and upstream access.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Cache Configuration
    // ========================================================================
    /// Staleness interval for the market-data resource.
    pub market_data_refresh: Duration,

    /// How long finished refresh processes stay queryable.
    pub process_retention: Duration,

    /// Upper bound on tracked refresh processes.
    pub max_tracked_processes: usize,

    // ========================================================================
    // Upstream Configuration
    // ========================================================================
    /// Market-data upstream URL. `None` selects the built-in mock upstream.
    pub market_data_url: Option<String>,

    /// Request timeout applied by the HTTP upstream.
    pub upstream_timeout: Duration,

    /// Simulated latency of the mock upstream.
    pub mock_upstream_latency: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,

            market_data_refresh: Duration::from_millis(DEFAULT_MARKET_DATA_REFRESH_MS),
            process_retention: Duration::from_secs(DEFAULT_PROCESS_RETENTION_SECS),
            max_tracked_processes: DEFAULT_MAX_TRACKED_PROCESSES,

            market_data_url: None,
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            mock_upstream_latency: Duration::ZERO,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LIQUID_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LIQUID_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `LIQUID_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LIQUID_MARKET_DATA_REFRESH_MS`: Market-data staleness interval (default: 900000)
    /// - `LIQUID_PROCESS_RETENTION_SECS`: Finished process retention (default: 600)
    /// - `LIQUID_MAX_TRACKED_PROCESSES`: Tracked process cap (default: 1024)
    /// - `LIQUID_MARKET_DATA_URL`: Upstream URL (unset = mock upstream)
    /// - `LIQUID_UPSTREAM_TIMEOUT_MS`: Upstream request timeout (default: 10000)
    /// - `LIQUID_MOCK_UPSTREAM_LATENCY_MS`: Mock upstream delay (default: 0)
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins = std::env::var("LIQUID_CORS_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("LIQUID_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let market_data_url = std::env::var("LIQUID_MARKET_DATA_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let config = Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs: env_parse("LIQUID_CORS_MAX_AGE_SECS", DEFAULT_CORS_MAX_AGE_SECS)?,
            market_data_refresh: Duration::from_millis(env_parse(
                "LIQUID_MARKET_DATA_REFRESH_MS",
                DEFAULT_MARKET_DATA_REFRESH_MS,
            )?),
            process_retention: Duration::from_secs(env_parse(
                "LIQUID_PROCESS_RETENTION_SECS",
                DEFAULT_PROCESS_RETENTION_SECS,
            )?),
            max_tracked_processes: env_parse(
                "LIQUID_MAX_TRACKED_PROCESSES",
                DEFAULT_MAX_TRACKED_PROCESSES,
            )?,
            market_data_url,
            upstream_timeout: Duration::from_millis(env_parse(
                "LIQUID_UPSTREAM_TIMEOUT_MS",
                DEFAULT_UPSTREAM_TIMEOUT_MS,
            )?),
            mock_upstream_latency: Duration::from_millis(env_parse(
                "LIQUID_MOCK_UPSTREAM_LATENCY_MS",
                0u64,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the cache cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market_data_refresh.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "LIQUID_MARKET_DATA_REFRESH_MS",
                value: "0".to_string(),
                reason: "refresh interval must be positive".to_string(),
            });
        }
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "LIQUID_UPSTREAM_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "upstream timeout must be positive".to_string(),
            });
        }
        if self.max_tracked_processes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LIQUID_MAX_TRACKED_PROCESSES",
                value: "0".to_string(),
                reason: "at least one process must be tracked".to_string(),
            });
        }
        if let Some(origin) = self
            .cors_origins
            .iter()
            .find(|o| o.contains('*') && !is_subdomain_pattern(o))
        {
            return Err(ConfigError::InvalidValue {
                key: "LIQUID_CORS_ORIGINS",
                value: origin.clone(),
                reason: "only '*.<domain>' wildcards are supported; leave unset to allow all origins"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate configuration for production use.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.cors_origins.is_empty() {
            return Err(ConfigError::MissingInProduction("LIQUID_CORS_ORIGINS"));
        }
        Ok(())
    }

    /// Cache configuration derived from these settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_refresh_interval(self.market_data_refresh)
            .with_process_retention(self.process_retention)
            .with_max_tracked_processes(self.max_tracked_processes)
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.liquid.finance
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain
                        .strip_suffix(pattern)
                        .map(|prefix| prefix.ends_with('.'))
                        .unwrap_or(false);
                }
            }
            false
        })
    }
}

/// Check if running in a production environment.
pub fn is_production_environment() -> bool {
    std::env::var("LIQUID_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// `*.example.com`: one leading wildcard label, no other `*`.
fn is_subdomain_pattern(origin: &str) -> bool {
    origin
        .strip_prefix("*.")
        .map(|domain| !domain.is_empty() && !domain.contains('*'))
        .unwrap_or(false)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key,
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}
