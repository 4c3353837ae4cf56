//! Shared handlers for cached resources.
//!
//! Every cached resource is served the same way: the payload as JSON, with
//! headers saying how fresh it is and which refresh (if any) is running.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use liquid_cache::{CacheRead, Cacheable, SmartController};
use liquid_core::ProcessId;
use serde::{Deserialize, Serialize};

use crate::constants::{CACHE_STATE_HEADER, REFRESH_PROCESS_HEADER};
use crate::error::ApiResult;
use crate::telemetry::metrics::with_metrics;

/// Body of an accepted refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct RefreshAccepted {
    /// Poll `/api/process-status/{process_id}` for the outcome.
    pub process_id: ProcessId,
}

/// Read a resource and render it.
///
/// Answers from cache whenever any data exists; fails with 500 only when
/// nothing is cached and the fetch this request waited on failed.
pub async fn read_resource<T: Cacheable>(controller: &SmartController<T>) -> ApiResult<Response> {
    let resource = controller.key().as_str();
    match controller.read().await {
        Ok(read) => {
            with_metrics(|m| m.record_cache_read(resource, read.source().as_str()));
            tracing::debug!(
                resource,
                source = read.source().as_str(),
                refresh = ?read.refresh(),
                "Served cached resource"
            );
            Ok(render_read(read))
        }
        Err(err) => {
            with_metrics(|m| m.record_cache_read(resource, "error"));
            Err(err.into())
        }
    }
}

/// Start a refresh, or report the one already running.
pub fn refresh_resource<T: Cacheable>(controller: &SmartController<T>) -> Response {
    let process_id = controller.refresh();
    tracing::info!(resource = %controller.key(), %process_id, "Refresh requested");
    (StatusCode::ACCEPTED, Json(RefreshAccepted { process_id })).into_response()
}

fn render_read<T: Cacheable>(read: CacheRead<T>) -> Response {
    let source = read.source();
    let refresh = read.refresh();
    let mut response = Json(read.value()).into_response();

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(CACHE_STATE_HEADER),
        HeaderValue::from_static(source.as_str()),
    );
    if let Some(id) = refresh {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            headers.insert(HeaderName::from_static(REFRESH_PROCESS_HEADER), value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_cache::{from_fn, ControllerConfig, DataFetcher, RefreshCache};
    use liquid_core::{FetchError, ResourceKey};
    use std::error::Error;
    use std::sync::Arc;

    fn controller(cache: &RefreshCache) -> Result<SmartController<u32>, Box<dyn Error>> {
        let fetcher: Arc<dyn DataFetcher<u32>> =
            Arc::new(from_fn(|| async { Ok::<u32, FetchError>(7) }));
        Ok(cache.register(ControllerConfig::new(ResourceKey::new("numbers")?, fetcher))?)
    }

    #[tokio::test]
    async fn test_read_sets_cache_headers() -> Result<(), Box<dyn Error>> {
        let cache = RefreshCache::with_defaults();
        let controller = controller(&cache)?;

        let response = read_resource(&controller).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_STATE_HEADER], "miss");
        assert!(response.headers().contains_key(REFRESH_PROCESS_HEADER));

        let response = read_resource(&controller).await?;
        assert_eq!(response.headers()[CACHE_STATE_HEADER], "fresh");
        assert!(!response.headers().contains_key(REFRESH_PROCESS_HEADER));
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_is_accepted() -> Result<(), Box<dyn Error>> {
        let cache = RefreshCache::with_defaults();
        let controller = controller(&cache)?;
        let response = refresh_resource(&controller);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        Ok(())
    }
}
