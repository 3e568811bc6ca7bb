//! Upstream rate source abstractions

use crate::core::error::FetchError;
use crate::core::rate::{RateBatch, RateMap};
use async_trait::async_trait;

/// A rates-by-base-currency API.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch_latest(&self, base: &str) -> Result<RateBatch, FetchError>;
}

/// The authoritative reference table, keyed by currency code. Rates are
/// quoted as local currency per 1 unit of the keyed currency.
#[async_trait]
pub trait ReferenceRateSource: Send + Sync {
    async fn fetch_reference_rates(&self) -> Result<RateMap, FetchError>;
}
