//! Health Check Endpoints
//!
//! Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Cache readiness summary
//!
//! Readiness never fails: an empty cache populates on demand, so
//! resources without data only mark the service `degraded`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use liquid_cache::{EntrySnapshot, EntryState, RefreshCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct HealthDetails {
    pub resources: Vec<ResourceHealth>,
    pub tracked_processes: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ResourceHealth {
    pub key: String,
    pub state: EntryState,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EntrySnapshot> for ResourceHealth {
    fn from(snapshot: &EntrySnapshot) -> Self {
        // Refreshing without data is the initial fetch; it serves nothing yet.
        let can_serve = snapshot.fetched_at.is_some() && snapshot.state != EntryState::Failed;
        Self {
            key: snapshot.key.to_string(),
            state: snapshot.state,
            status: if can_serve {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            age_ms: snapshot.age_ms,
            error: snapshot.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub cache: RefreshCache,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(cache: RefreshCache, start_time: Instant) -> Self {
        Self { cache, start_time }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (cached resources)
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready; degraded while resources have no data", body = HealthResponse),
    ),
)]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let resources: Vec<ResourceHealth> = state
        .cache
        .snapshots()
        .iter()
        .map(ResourceHealth::from)
        .collect();

    let overall_status = overall_status(&resources);
    let message = match overall_status {
        HealthStatus::Healthy => None,
        _ => Some("Some resources have no cached data yet".to_string()),
    };

    let response = HealthResponse {
        status: overall_status,
        message,
        details: Some(HealthDetails {
            resources,
            tracked_processes: state.cache.tracker().len(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    (StatusCode::OK, Json(response))
}

fn overall_status(resources: &[ResourceHealth]) -> HealthStatus {
    if resources.iter().all(|r| r.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router<S>(cache: RefreshCache, start_time: Instant) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = Arc::new(HealthState::new(cache, start_time));

    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}
