use crate::core::error::StoreError;
use crate::core::rate::{CurrencyPair, DifferenceRecord, RateMap, RateRecord, StoredDifference};
use crate::core::store::{RateHistory, RateStore, validate_batch, validate_difference};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    rates: Vec<RateRecord>,
    differences: Vec<StoredDifference>,
}

/// In-memory rate store; contents are lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryRateStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn ingest_rates(
        &self,
        base: &str,
        rates: &RateMap,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let (base, rates) = validate_batch(base, rates)?;
        let timestamp = Utc::now();

        let mut tables = self.inner.lock().await;
        let mut next_id = tables.rates.len() as u64 + 1;
        let mut created = Vec::with_capacity(rates.len());
        for (target, rate) in rates {
            created.push(RateRecord {
                id: next_id,
                base_currency: base.clone(),
                target_currency: target,
                rate,
                timestamp,
            });
            next_id += 1;
        }
        tables.rates.extend(created.iter().cloned());
        debug!("Stored {} rates for base {}", created.len(), base);
        Ok(created)
    }

    async fn list_latest_rates(&self) -> Result<Vec<RateRecord>, StoreError> {
        Ok(self.inner.lock().await.rates.clone())
    }

    async fn record_difference(
        &self,
        record: &DifferenceRecord,
    ) -> Result<StoredDifference, StoreError> {
        validate_difference(record)?;

        let mut tables = self.inner.lock().await;
        let stored = StoredDifference {
            id: tables.differences.len() as u64 + 1,
            record: record.clone(),
        };
        tables.differences.push(stored.clone());
        debug!("Stored difference {} for {}", stored.id, record.pair());
        Ok(stored)
    }
}

#[async_trait]
impl RateHistory for MemoryRateStore {
    async fn latest_difference(
        &self,
        pair: &CurrencyPair,
    ) -> Result<Option<StoredDifference>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .differences
            .iter()
            .rev()
            .find(|d| &d.record.pair() == pair)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(entries: &[(&str, f64)]) -> RateMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn difference(rate_api: f64) -> DifferenceRecord {
        DifferenceRecord {
            base_currency: "USD".to_string(),
            target_currency: "KZT".to_string(),
            rate_api,
            rate_site: 538.0,
            diff_percent: 0.3717,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ingest_and_list() {
        let store = MemoryRateStore::new();
        assert!(store.list_latest_rates().await.unwrap().is_empty());

        let created = store
            .ingest_rates("USD", &batch(&[("KZT", 540.0), ("EUR", 0.92)]))
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let all = store.list_latest_rates().await.unwrap();
        assert_eq!(all, created);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1].id, 2);
        assert!(all.iter().all(|r| r.base_currency == "USD"));
    }

    #[tokio::test]
    async fn test_same_batch_twice_is_appended() {
        let store = MemoryRateStore::new();
        let rates = batch(&[("KZT", 540.0)]);

        store.ingest_rates("USD", &rates).await.unwrap();
        store.ingest_rates("USD", &rates).await.unwrap();

        let all = store.list_latest_rates().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].id, all[1].id);
    }

    #[tokio::test]
    async fn test_invalid_batch_creates_nothing() {
        let store = MemoryRateStore::new();
        let result = store
            .ingest_rates("USD", &batch(&[("KZT", 540.0), ("EUR", -1.0)]))
            .await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.list_latest_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_difference() {
        let store = MemoryRateStore::new();
        let pair = CurrencyPair::new("USD", "KZT");
        assert!(store.latest_difference(&pair).await.unwrap().is_none());

        store.record_difference(&difference(540.0)).await.unwrap();
        let second = store.record_difference(&difference(541.0)).await.unwrap();

        let latest = store.latest_difference(&pair).await.unwrap().unwrap();
        assert_eq!(latest, second);
        assert!(
            store
                .latest_difference(&pair.inverse())
                .await
                .unwrap()
                .is_none()
        );
    }
}
