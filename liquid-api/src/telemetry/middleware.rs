//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every HTTP request with a tracing span, a completion log line and
//! Prometheus metrics.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("Invalid UUID regex")
});

static NUMERIC_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("Invalid ID regex"));

const PROCESS_STATUS_PREFIX: &str = "/api/process-status/";

/// Normalize path for metrics/spans (replace ids with placeholders).
///
/// Keeps Prometheus label cardinality bounded.
pub(crate) fn normalize_path(path: &str) -> String {
    // Any process id, well-formed or not, collapses to one label.
    if let Some(rest) = path.strip_prefix(PROCESS_STATUS_PREFIX) {
        if !rest.is_empty() {
            return format!("{}{{id}}", PROCESS_STATUS_PREFIX);
        }
    }

    let result = UUID_PATTERN.replace_all(path, "{id}");
    let result = NUMERIC_ID_PATTERN.replace_all(&result, "/{id}$1");
    result.to_string()
}

/// Observability middleware for Axum.
///
/// 1. Tracing span per request
/// 2. Prometheus metrics recording
/// 3. Request completion logging
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|metrics| {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        )
    });

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/cache/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/cache/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/api/items/12345"), "/api/items/{id}");
    }

    #[test]
    fn test_normalize_path_process_status() {
        assert_eq!(
            normalize_path("/api/process-status/0190a5b2-7c3d-7e4f-8a9b-0c1d2e3f4a5b"),
            "/api/process-status/{id}"
        );
        assert_eq!(
            normalize_path("/api/process-status/not-a-real-id"),
            "/api/process-status/{id}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/market-data"), "/api/market-data");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
