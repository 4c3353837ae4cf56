//! LIQUID API Server Entry Point
//!
//! Bootstraps telemetry and configuration, builds the refresh cache and
//! starts the Axum HTTP server.

use std::net::SocketAddr;

use axum::Router;
use liquid_api::telemetry::{init_tracing, TelemetryConfig};
use liquid_api::{ApiConfig, ApiError, ApiResult, ApiRouterBuilder, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let state = AppState::from_config(&api_config)?;

    tracing::info!(
        service = %telemetry_config.service_name,
        version = %telemetry_config.service_version,
        environment = %telemetry_config.environment,
        refresh_ms = api_config.market_data_refresh.as_millis() as u64,
        upstream = api_config.market_data_url.as_deref().unwrap_or("mock"),
        "Configuration loaded"
    );

    let app: Router = ApiRouterBuilder::new(state, api_config)?
        .with_metrics(telemetry_config.metrics_enabled)
        .build()?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting LIQUID API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("LIQUID_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("LIQUID_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
