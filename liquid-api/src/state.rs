//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use liquid_cache::{ControllerConfig, DataFetcher, RefreshCache, SmartController};
use liquid_core::{MarketData, ResourceKey};

use crate::config::ApiConfig;
use crate::constants::MARKET_DATA_RESOURCE;
use crate::error::ApiResult;
use crate::upstream::market_data_fetcher;

/// Application-wide state shared across all routes.
///
/// The cache is built once here and handed to handlers by clone; there is
/// no global cache.
#[derive(Clone)]
pub struct AppState {
    /// Registry of every cached resource and the shared process tracker.
    pub cache: RefreshCache,
    /// Controller for the `market-data` resource.
    pub market: SmartController<MarketData>,
    pub start_time: Instant,
}

impl AppState {
    /// Build state with the upstream selected by `config`.
    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        Self::with_market_fetcher(config, market_data_fetcher(config)?)
    }

    /// Build state around an explicit market-data fetcher.
    pub fn with_market_fetcher(
        config: &ApiConfig,
        fetcher: Arc<dyn DataFetcher<MarketData>>,
    ) -> ApiResult<Self> {
        let cache = RefreshCache::new(config.cache_config());
        let market = cache.register(
            ControllerConfig::new(ResourceKey::new(MARKET_DATA_RESOURCE)?, fetcher)
                .with_refresh_interval(config.market_data_refresh),
        )?;

        Ok(Self {
            cache,
            market,
            start_time: Instant::now(),
        })
    }
}

crate::impl_from_ref!(RefreshCache, cache);
crate::impl_from_ref!(SmartController<MarketData>, market);
crate::impl_from_ref!(Instant, start_time);
