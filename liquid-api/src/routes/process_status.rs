//! Process Status REST API Routes
//!
//! Lets a client that triggered a refresh poll for its outcome.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use liquid_cache::{ProcessStatus, RefreshCache};

use crate::state::AppState;

/// GET /api/process-status/{id} - Status of a refresh process
///
/// Never fails: ids that are malformed, expired or were never issued report
/// `Unknown`.
#[utoipa::path(
    get,
    path = "/api/process-status/{id}",
    tag = "Processes",
    params(
        ("id" = String, Path, description = "Process id from a refresh")
    ),
    responses(
        (status = 200, description = "Current process status", body = ProcessStatus),
    ),
)]
pub async fn get_process_status(
    State(cache): State<RefreshCache>,
    Path(id): Path<String>,
) -> Json<ProcessStatus> {
    let status = cache.tracker().status_str(&id);
    tracing::debug!(process_id = %id, status = status.as_str(), "Process status lookup");
    Json(status)
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/:id", get(get_process_status))
}
