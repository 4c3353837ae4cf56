//! LIQUID Core - Shared Types
//!
//! Identifiers, error types and payloads shared by the cache and the API
//! layer. This crate contains no runtime behavior.

pub mod error;
pub mod identity;
pub mod market;

pub use error::{FetchError, LiquidError, LiquidResult};
pub use identity::{ProcessId, ResourceKey, Timestamp, MAX_RESOURCE_KEY_LEN};
pub use market::MarketData;
