//! REST API Routes Module
//!
//! Includes:
//! - Cached resource routes (`/api/market-data`)
//! - Refresh process status (`/api/process-status/:id`)
//! - Cache introspection (`/api/cache`)
//! - Health check endpoints (Kubernetes-compatible)
//! - Metrics and OpenAPI document
//! - CORS support for browser-based clients

pub mod cache;
pub mod health;
pub mod market_data;
pub mod process_status;
pub mod resource;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::{is_production_environment, ApiConfig};
use crate::constants::{CACHE_STATE_HEADER, REFRESH_PROCESS_HEADER};
use crate::error::ApiResult;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use cache::create_router as cache_router;
pub use health::create_router as health_router;
pub use market_data::create_router as market_data_router;
pub use process_status::create_router as process_status_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER BUILDER
// ============================================================================

/// Builder for the complete API router.
///
/// Every route runs behind the observability middleware and the CORS layer.
pub struct ApiRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    metrics_enabled: bool,
}

impl ApiRouterBuilder {
    /// Create a new ApiRouterBuilder.
    ///
    /// In production environments, this validates the API configuration and
    /// returns an error if required settings are missing.
    pub fn new(state: AppState, api_config: ApiConfig) -> ApiResult<Self> {
        api_config.validate()?;
        if is_production_environment() {
            api_config.validate_for_production()?;
        }

        Ok(Self {
            state,
            api_config,
            metrics_enabled: true,
        })
    }

    /// Toggle the `/metrics` endpoint.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Build the resource routes under `/api`.
    fn build_api_routes(&self) -> Router<AppState> {
        Router::new()
            .nest("/market-data", market_data::create_router())
            .nest("/process-status", process_status::create_router())
            .nest("/cache", cache::create_router())
    }

    /// Build the complete router.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS - handles preflight requests
    /// 2. Observability - tracing and metrics
    pub fn build(self) -> ApiResult<Router> {
        let mut router = Router::new()
            .nest("/api", self.build_api_routes())
            .with_state(self.state.clone())
            .nest(
                "/health",
                health::create_router(self.state.cache.clone(), self.state.start_time),
            )
            .route("/openapi.json", get(openapi_json));

        if self.metrics_enabled {
            router = router.route("/metrics", get(metrics_handler));
        }

        let cors = build_cors_layer(&self.api_config);

        Ok(router.layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(from_fn(observability_middleware)),
        ))
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static(CACHE_STATE_HEADER),
            HeaderName::from_static(REFRESH_PROCESS_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        // Exact origins and `*.domain` wildcards share one matcher.
        let matcher = config.clone();
        let origins = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| matcher.is_origin_allowed(origin))
                .unwrap_or(false)
        });

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Cached resources under /api/*
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI document at /openapi.json
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> ApiResult<Router> {
    ApiRouterBuilder::new(state, api_config.clone()).and_then(|builder| builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::ORIGIN, Request};
    use std::error::Error;
    use tower::ServiceExt;

    async fn allowed_origin(config: &ApiConfig, origin: &str) -> Result<Option<String>, Box<dyn Error>> {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_cors_layer(config));
        let request = Request::builder()
            .uri("/ping")
            .header(ORIGIN, origin)
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        Ok(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().map(str::to_string))
            .transpose()?)
    }

    #[tokio::test]
    async fn test_cors_dev_mode_allows_any_origin() -> Result<(), Box<dyn Error>> {
        let config = ApiConfig::default();
        assert_eq!(
            allowed_origin(&config, "https://anything.example").await?.as_deref(),
            Some("*")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_cors_matches_exact_and_wildcard_origins() -> Result<(), Box<dyn Error>> {
        let config = ApiConfig {
            cors_origins: vec![
                "https://liquid.finance".to_string(),
                "*.liquid.finance".to_string(),
            ],
            cors_allow_credentials: true,
            ..ApiConfig::default()
        };

        for origin in ["https://liquid.finance", "https://app.liquid.finance"] {
            assert_eq!(allowed_origin(&config, origin).await?.as_deref(), Some(origin));
        }
        for origin in ["https://evil.com", "https://notliquid.finance"] {
            assert_eq!(allowed_origin(&config, origin).await?, None);
        }
        Ok(())
    }

    #[test]
    fn test_builder_rejects_bare_wildcard_origin() -> Result<(), Box<dyn Error>> {
        let config = ApiConfig {
            cors_origins: vec!["*".to_string()],
            ..ApiConfig::default()
        };
        let state = AppState::from_config(&ApiConfig::default())?;
        let err = ApiRouterBuilder::new(state, config)
            .err()
            .ok_or("bare '*' origin should be rejected")?;
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
        assert!(err.message.contains("LIQUID_CORS_ORIGINS"));
        Ok(())
    }
}
