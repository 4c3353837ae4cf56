//! Cache Introspection Routes
//!
//! Read-only views of every cached resource: state, age, in-flight refresh,
//! last error and counters.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use liquid_cache::{EntrySnapshot, RefreshCache};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/cache - Snapshots of all cached resources
#[utoipa::path(
    get,
    path = "/api/cache",
    tag = "Cache",
    responses(
        (status = 200, description = "Snapshots sorted by resource key", body = Vec<EntrySnapshot>),
    ),
)]
pub async fn list_cache_entries(State(cache): State<RefreshCache>) -> Json<Vec<EntrySnapshot>> {
    Json(cache.snapshots())
}

/// GET /api/cache/{key} - Snapshot of one cached resource
#[utoipa::path(
    get,
    path = "/api/cache/{key}",
    tag = "Cache",
    params(
        ("key" = String, Path, description = "Resource key, e.g. market-data")
    ),
    responses(
        (status = 200, description = "Resource snapshot", body = EntrySnapshot),
        (status = 404, description = "No such resource", body = ApiError),
    ),
)]
pub async fn get_cache_entry(
    State(cache): State<RefreshCache>,
    Path(key): Path<String>,
) -> ApiResult<Json<EntrySnapshot>> {
    Ok(Json(cache.snapshot(&key)?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cache_entries))
        .route("/:key", get(get_cache_entry))
}
