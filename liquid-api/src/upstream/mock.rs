//! Mock market-data upstream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use liquid_cache::DataFetcher;
use liquid_core::{FetchError, MarketData};

/// Base figures shown on the dashboard overview.
const BASE_TVL: u64 = 245_678_900;
const BASE_VOLUME_24H: u64 = 12_345_678;
const BASE_APY: f64 = 8.42;
const BASE_ACTIVE_POSITIONS: u32 = 1_847;
const BASE_UTILIZATION: f64 = 0.73;

/// Deterministic stand-in for the market-data provider.
///
/// Every fetch drifts the figures slightly so successive refreshes are
/// distinguishable. An optional latency simulates a slow upstream.
#[derive(Debug, Default)]
pub struct MockMarketDataFetcher {
    fetches: AtomicU64,
    latency: Duration,
}

impl MockMarketDataFetcher {
    pub fn new(latency: Duration) -> Self {
        Self {
            fetches: AtomicU64::new(0),
            latency,
        }
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Figures for the `n`th fetch (zero-based).
    pub fn sample(n: u64) -> MarketData {
        let wobble = (n % 7) as f64;
        MarketData {
            tvl: BASE_TVL + n * 12_345,
            volume_24h: BASE_VOLUME_24H + (n % 11) * 4_321,
            apy: BASE_APY + wobble * 0.01,
            active_positions: BASE_ACTIVE_POSITIONS + (n % 13) as u32,
            utilization: BASE_UTILIZATION + wobble * 0.002,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl DataFetcher<MarketData> for MockMarketDataFetcher {
    async fn fetch(&self) -> Result<MarketData, FetchError> {
        let n = self.fetches.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(Self::sample(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fetch_matches_dashboard_figures() -> Result<(), FetchError> {
        let fetcher = MockMarketDataFetcher::default();
        let data = fetcher.fetch().await?;
        assert_eq!(data.tvl, 245_678_900);
        assert_eq!(data.volume_24h, 12_345_678);
        assert_eq!(data.active_positions, 1_847);
        assert!((data.apy - 8.42).abs() < f64::EPSILON);
        assert_eq!(fetcher.fetch_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_successive_fetches_drift() -> Result<(), FetchError> {
        let fetcher = MockMarketDataFetcher::default();
        let first = fetcher.fetch().await?;
        let second = fetcher.fetch().await?;
        assert_ne!(first.tvl, second.tvl);
        Ok(())
    }

    #[test]
    fn test_samples_always_validate() {
        for n in 0..100 {
            assert!(MockMarketDataFetcher::sample(n).validate().is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() -> Result<(), FetchError> {
        let fetcher = MockMarketDataFetcher::new(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        fetcher.fetch().await?;
        assert!(start.elapsed() >= Duration::from_millis(250));
        Ok(())
    }
}
