//! HttpJsonFetcher against a local upstream.

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use liquid_api::HttpJsonFetcher;
use liquid_test_utils::*;

type TestResult = Result<(), Box<dyn Error>>;

async fn good() -> impl IntoResponse {
    Json(market_data_fixture())
}

async fn unavailable() -> impl IntoResponse {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn garbage() -> impl IntoResponse {
    "{\"tvl\": \"lots\"}"
}

async fn out_of_range() -> impl IntoResponse {
    let mut data = market_data_fixture();
    data.utilization = 1.5;
    Json(data)
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(market_data_fixture())
}

async fn spawn_upstream() -> Result<SocketAddr, Box<dyn Error>> {
    let app = Router::new()
        .route("/good", get(good))
        .route("/unavailable", get(unavailable))
        .route("/garbage", get(garbage))
        .route("/out-of-range", get(out_of_range))
        .route("/slow", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

fn fetcher(addr: SocketAddr, path: &str) -> Result<HttpJsonFetcher<MarketData>, Box<dyn Error>> {
    Ok(
        HttpJsonFetcher::new(format!("http://{}{}", addr, path), Duration::from_millis(200))?
            .with_validator(MarketData::validate),
    )
}

#[tokio::test]
async fn fetches_and_decodes_market_data() -> TestResult {
    let addr = spawn_upstream().await?;
    let data = fetcher(addr, "/good")?.fetch().await?;
    assert_eq!(data, market_data_fixture());
    Ok(())
}

#[tokio::test]
async fn non_success_status_maps_to_status_error() -> TestResult {
    let addr = spawn_upstream().await?;
    let err = fetcher(addr, "/unavailable")?
        .fetch()
        .await
        .err()
        .ok_or("expected failure")?;
    assert_eq!(err, FetchError::status(503, "Service Unavailable"));
    Ok(())
}

#[tokio::test]
async fn malformed_payload_maps_to_decode_error() -> TestResult {
    let addr = spawn_upstream().await?;
    let err = fetcher(addr, "/garbage")?
        .fetch()
        .await
        .err()
        .ok_or("expected failure")?;
    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn validator_rejects_out_of_range_payload() -> TestResult {
    let addr = spawn_upstream().await?;
    let err = fetcher(addr, "/out-of-range")?
        .fetch()
        .await
        .err()
        .ok_or("expected failure")?;
    assert!(err.to_string().contains("utilization"));
    Ok(())
}

#[tokio::test]
async fn slow_upstream_times_out() -> TestResult {
    let addr = spawn_upstream().await?;
    let err = fetcher(addr, "/slow")?
        .fetch()
        .await
        .err()
        .ok_or("expected failure")?;
    assert_eq!(err, FetchError::timeout(Duration::from_millis(200)));
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_is_upstream_error() -> TestResult {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let err = fetcher(addr, "/good")?
        .fetch()
        .await
        .err()
        .ok_or("expected failure")?;
    assert!(matches!(err, FetchError::Upstream { .. }), "got {err:?}");
    Ok(())
}
