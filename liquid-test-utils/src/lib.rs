//! LIQUID Test Utilities
//!
//! Shared test infrastructure for the LIQUID workspace:
//! - Scripted fetchers with call counting, gating and injected failures
//! - Fixtures for the market-data resource
//! - Proptest generators for resource keys

pub use liquid_cache::{
    CacheConfig, CacheError, CacheRead, ControllerConfig, DataFetcher, EntryState, ProcessStatus,
    ReadSource, RefreshCache, SmartController,
};
pub use liquid_core::{FetchError, MarketData, ProcessId, ResourceKey, Timestamp};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

// ============================================================================
// SCRIPTED FETCHER
// ============================================================================

/// Fetcher whose outcomes are queued up front.
///
/// Each call pops the next scripted result; an exhausted script fails with
/// an upstream error. When gated, every call first waits for a permit from
/// [`ScriptedFetcher::release`], which lets tests hold a fetch in flight.
pub struct ScriptedFetcher<T> {
    script: Mutex<VecDeque<Result<T, FetchError>>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl<T: Send + 'static> ScriptedFetcher<T> {
    pub fn new(script: impl IntoIterator<Item = Result<T, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    /// Scripted fetcher that blocks every call until released.
    pub fn gated(script: impl IntoIterator<Item = Result<T, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            gate: Some(Semaphore::new(0)),
        })
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Let `n` gated fetches proceed. No-op for ungated fetchers.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn as_fetcher(self: &Arc<Self>) -> Arc<dyn DataFetcher<T>>
    where
        T: Sync,
    {
        Arc::clone(self) as Arc<dyn DataFetcher<T>>
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> DataFetcher<T> for ScriptedFetcher<T> {
    async fn fetch(&self) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| FetchError::upstream(e.to_string()))?
                .forget();
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::upstream("script exhausted")))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Market data matching the dashboard sample figures.
    pub fn market_data_fixture() -> MarketData {
        MarketData {
            tvl: 245_678_900,
            volume_24h: 12_345_678,
            apy: 8.42,
            active_positions: 1_847,
            utilization: 0.73,
            updated_at: Utc
                .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    /// Market data fixture with a distinguishable TVL.
    pub fn market_data_with_tvl(tvl: u64) -> MarketData {
        MarketData {
            tvl,
            ..market_data_fixture()
        }
    }

    /// The `market-data` resource key.
    pub fn market_data_key() -> ResourceKey {
        "market-data"
            .parse()
            .unwrap_or_else(|e| panic!("fixture key must be valid: {e}"))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// Strings that are valid resource keys.
    pub fn arb_resource_key() -> impl Strategy<Value = String> {
        "[a-z0-9]([a-z0-9-]{0,62}[a-z0-9])?"
    }

    /// Strings that are never valid resource keys.
    pub fn arb_invalid_resource_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "-[a-z0-9]{0,10}",
            "[a-z0-9]{0,10}-",
            "[a-z]{0,5}[A-Z _/.][a-z]{0,5}",
            "[a-z]{65,80}",
        ]
    }
}

pub use fixtures::*;
pub use generators::*;
