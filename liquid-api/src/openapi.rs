//! OpenAPI Specification for LIQUID API
//!
//! This module defines the OpenAPI document for the LIQUID REST API.
//! It uses utoipa to generate the document from Rust types and route
//! annotations.

use utoipa::openapi::server::ServerBuilder;
use utoipa::{Modify, OpenApi};

use crate::constants::DEV_SERVER_URL;
use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{HealthDetails, HealthResponse, HealthStatus, ResourceHealth};
use crate::routes::resource::RefreshAccepted;

// Import route modules for path references
use crate::routes::{cache, health, market_data, process_status};
use crate::telemetry::metrics;

use liquid_cache::{CacheStats, EntrySnapshot, EntryState, ProcessStatus, ProcessView, ReadSource};
use liquid_core::{FetchError, MarketData, ProcessId, ResourceKey};

/// OpenAPI document for LIQUID API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LIQUID API",
        version = "0.1.0",
        description = "Market data served through a stale-while-revalidate refresh cache",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "https://api.liquid.finance", description = "Production")
    ),
    tags(
        (name = "Market Data", description = "Protocol-wide market figures"),
        (name = "Processes", description = "Background refresh status"),
        (name = "Cache", description = "Cache entry introspection"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        market_data::get_market_data,
        market_data::refresh_market_data,
        process_status::get_process_status,
        cache::list_cache_entries,
        cache::get_cache_entry,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            MarketData, RefreshAccepted,
            ProcessId, ResourceKey, ProcessStatus, ProcessView, FetchError,
            EntrySnapshot, EntryState, CacheStats, ReadSource,
            HealthResponse, HealthStatus, HealthDetails, ResourceHealth
        )
    ),
    modifiers(&DevServerAddon)
)]
pub struct ApiDoc;

/// Appends the local development server.
struct DevServerAddon;

impl Modify for DevServerAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let dev = ServerBuilder::new()
            .url(DEV_SERVER_URL)
            .description(Some("Local Development"))
            .build();
        openapi.servers.get_or_insert_with(Vec::new).push(dev);
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
