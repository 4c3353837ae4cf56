//! Upstream fetchers for cached resources.
//!
//! - [`MockMarketDataFetcher`]: deterministic in-process market data, the default
//! - [`HttpJsonFetcher`]: JSON over HTTP via reqwest, with a request timeout

pub mod http;
pub mod mock;

use std::sync::Arc;

use liquid_cache::DataFetcher;
use liquid_core::MarketData;

use crate::config::ApiConfig;
use crate::error::ApiResult;

pub use http::HttpJsonFetcher;
pub use mock::MockMarketDataFetcher;

/// Pick the market-data upstream from configuration.
///
/// A configured `LIQUID_MARKET_DATA_URL` selects the HTTP upstream; otherwise
/// the mock upstream serves sample figures.
pub fn market_data_fetcher(config: &ApiConfig) -> ApiResult<Arc<dyn DataFetcher<MarketData>>> {
    match &config.market_data_url {
        Some(url) => {
            tracing::info!(url = %url, timeout_ms = config.upstream_timeout.as_millis() as u64, "Using HTTP market-data upstream");
            let fetcher: Arc<dyn DataFetcher<MarketData>> = Arc::new(
                HttpJsonFetcher::new(url.clone(), config.upstream_timeout)?
                    .with_validator(MarketData::validate),
            );
            Ok(fetcher)
        }
        None => {
            tracing::info!("Using mock market-data upstream");
            let fetcher: Arc<dyn DataFetcher<MarketData>> =
                Arc::new(MockMarketDataFetcher::new(config.mock_upstream_latency));
            Ok(fetcher)
        }
    }
}
