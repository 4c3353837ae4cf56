//! LIQUID API - REST layer over the refresh cache
//!
//! This crate exposes cached resources over HTTP (Axum). Reads are served
//! from the cache immediately; stale entries are refreshed in the background
//! and the refresh can be polled by process id.
//!
//! The upstream for market data is either a JSON endpoint or, when no URL is
//! configured, a deterministic in-process mock.

pub mod config;
pub mod constants;
pub mod error;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used types
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::{create_api_router, ApiRouterBuilder};
pub use state::AppState;
pub use upstream::{market_data_fetcher, HttpJsonFetcher, MockMarketDataFetcher};
