//! Rate store abstractions

use crate::core::error::StoreError;
use crate::core::rate::{
    CurrencyPair, DifferenceRecord, RateMap, RateRecord, StoredDifference, is_valid_rate,
    normalize_code,
};
use async_trait::async_trait;

/// Persistence consumed by the ingestion and reconciliation loops.
///
/// Every write is append-only: ingesting the same batch twice yields two
/// independent sets of records.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn ingest_rates(&self, base: &str, rates: &RateMap)
    -> Result<Vec<RateRecord>, StoreError>;

    /// All stored rate records, in insertion order.
    async fn list_latest_rates(&self) -> Result<Vec<RateRecord>, StoreError>;

    async fn record_difference(
        &self,
        record: &DifferenceRecord,
    ) -> Result<StoredDifference, StoreError>;
}

/// Local stores also answer queries over the difference log.
#[async_trait]
pub trait RateHistory: RateStore {
    async fn latest_difference(
        &self,
        pair: &CurrencyPair,
    ) -> Result<Option<StoredDifference>, StoreError>;
}

/// Checks an inbound batch and returns it with normalized currency codes.
pub fn validate_batch(base: &str, rates: &RateMap) -> Result<(String, RateMap), StoreError> {
    let base = normalize_code(base);
    if base.is_empty() {
        return Err(StoreError::Validation("base_code is required".to_string()));
    }
    if rates.is_empty() {
        return Err(StoreError::Validation("rates must not be empty".to_string()));
    }

    let mut normalized = RateMap::new();
    for (target, rate) in rates {
        let target = normalize_code(target);
        if target.is_empty() {
            return Err(StoreError::Validation(
                "rates contains an empty currency code".to_string(),
            ));
        }
        if !is_valid_rate(*rate) {
            return Err(StoreError::Validation(format!(
                "rate for {target} must be a positive number, got {rate}"
            )));
        }
        normalized.insert(target, *rate);
    }
    Ok((base, normalized))
}

/// Checks a difference record before it is appended.
pub fn validate_difference(record: &DifferenceRecord) -> Result<(), StoreError> {
    if normalize_code(&record.base_currency).is_empty()
        || normalize_code(&record.target_currency).is_empty()
    {
        return Err(StoreError::Validation(
            "base_currency and target_currency are required".to_string(),
        ));
    }
    if !is_valid_rate(record.rate_api) || !is_valid_rate(record.rate_site) {
        return Err(StoreError::Validation(
            "rate_api and rate_site must be positive numbers".to_string(),
        ));
    }
    if !record.diff_percent.is_finite() || record.diff_percent < 0.0 {
        return Err(StoreError::Validation(
            "diff_percent must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}
