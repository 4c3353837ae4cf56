//! JSON-over-HTTP upstream.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use liquid_cache::DataFetcher;
use liquid_core::FetchError;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// Post-decode check applied to every payload.
pub type Validator<T> = fn(&T) -> Result<(), String>;

/// Fetches `T` by GETting a JSON document.
///
/// The request timeout is owned here; the cache itself never times out a
/// fetch.
pub struct HttpJsonFetcher<T> {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    validator: Option<Validator<T>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpJsonFetcher<T> {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            validator: None,
            _payload: PhantomData,
        })
    }

    /// Reject decoded payloads that fail `validator`.
    pub fn with_validator(mut self, validator: Validator<T>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_request_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::decode(err.to_string())
        } else {
            FetchError::upstream(err.to_string())
        }
    }
}

#[async_trait]
impl<T> DataFetcher<T> for HttpJsonFetcher<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            return Err(FetchError::status(status.as_u16(), reason));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let payload: T =
            serde_json::from_slice(&body).map_err(|e| FetchError::decode(e.to_string()))?;

        if let Some(validate) = self.validator {
            validate(&payload).map_err(FetchError::decode)?;
        }
        Ok(payload)
    }
}

impl<T> std::fmt::Debug for HttpJsonFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonFetcher")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}
