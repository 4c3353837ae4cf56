//! Market Data REST API Routes
//!
//! The dashboard's protocol-wide figures, served through the refresh cache.

use axum::{extract::State, response::Response, routing::get, routing::post, Router};
use liquid_cache::SmartController;
use liquid_core::MarketData;

use crate::error::{ApiError, ApiResult};
use crate::routes::resource::{read_resource, refresh_resource, RefreshAccepted};
use crate::state::AppState;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/market-data - Current market data
///
/// Returns cached data immediately when any exists; a stale read starts a
/// background refresh whose id is returned in `x-refresh-process-id`.
#[utoipa::path(
    get,
    path = "/api/market-data",
    tag = "Market Data",
    responses(
        (status = 200, description = "Market data (possibly stale)", body = MarketData,
            headers(
                ("x-cache-state" = String, description = "fresh, stale, refreshing or miss"),
                ("x-refresh-process-id" = Option<String>, description = "Refresh in flight, if any"),
            )
        ),
        (status = 500, description = "Upstream failed and nothing is cached", body = ApiError),
    ),
)]
pub async fn get_market_data(
    State(market): State<SmartController<MarketData>>,
) -> ApiResult<Response> {
    read_resource(&market).await
}

/// POST /api/market-data/refresh - Force a background refresh
#[utoipa::path(
    post,
    path = "/api/market-data/refresh",
    tag = "Market Data",
    responses(
        (status = 202, description = "Refresh started or already running", body = RefreshAccepted),
    ),
)]
pub async fn refresh_market_data(State(market): State<SmartController<MarketData>>) -> Response {
    refresh_resource(&market)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_market_data))
        .route("/refresh", post(refresh_market_data))
}
