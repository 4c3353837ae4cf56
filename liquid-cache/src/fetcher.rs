//! Upstream fetch abstraction.

use std::future::Future;

use async_trait::async_trait;
use liquid_core::FetchError;

/// Source of fresh data for one cached resource.
///
/// Implementations own their timeout and abort behavior; the cache never
/// cancels a fetch once started.
#[async_trait]
pub trait DataFetcher<T>: Send + Sync {
    /// Fetch a fresh copy of the resource.
    async fn fetch(&self) -> Result<T, FetchError>;
}

/// Adapter turning an async closure into a [`DataFetcher`].
///
/// Built by [`from_fn`].
pub struct FnFetcher<F> {
    f: F,
}

/// Wrap an async closure as a fetcher.
///
/// ```ignore
/// let fetcher = from_fn(|| async { Ok::<_, FetchError>(42u64) });
/// ```
pub fn from_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher { f }
}

#[async_trait]
impl<T, F, Fut> DataFetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        (self.f)().await
    }
}
