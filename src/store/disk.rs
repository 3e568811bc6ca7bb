use crate::core::error::StoreError;
use crate::core::rate::{CurrencyPair, DifferenceRecord, RateMap, RateRecord, StoredDifference};
use crate::core::store::{RateHistory, RateStore, validate_batch, validate_difference};
use async_trait::async_trait;
use chrono::Utc;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const RATES_PARTITION: &str = "rates";
const DIFFERENCES_PARTITION: &str = "differences";

/// Rate store backed by a fjall keyspace.
///
/// Each table is a partition keyed by a big-endian `u64` id so iteration
/// order is insertion order. Values are JSON.
pub struct FjallRateStore {
    keyspace: Arc<Keyspace>,
    rates: PartitionHandle,
    differences: PartitionHandle,
    next_rate_id: AtomicU64,
    next_difference_id: AtomicU64,
}

impl FjallRateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Persistence(e.to_string()))?;

        let keyspace = fjall::Config::new(path).open()?;
        let rates = keyspace.open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        let differences =
            keyspace.open_partition(DIFFERENCES_PARTITION, PartitionCreateOptions::default())?;

        let next_rate_id = AtomicU64::new(last_id(&rates)? + 1);
        let next_difference_id = AtomicU64::new(last_id(&differences)? + 1);
        debug!("Opened rate store at {}", path.display());

        Ok(Self {
            keyspace: Arc::new(keyspace),
            rates,
            differences,
            next_rate_id,
            next_difference_id,
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

fn encode_id(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn decode_id(key: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Persistence(format!("corrupt key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn last_id(partition: &PartitionHandle) -> Result<u64, StoreError> {
    match partition.last_key_value()? {
        Some((key, _)) => decode_id(&key),
        None => Ok(0),
    }
}

fn read_all<T: DeserializeOwned>(partition: &PartitionHandle) -> Result<Vec<T>, StoreError> {
    partition
        .iter()
        .map(|item| {
            let (_, value) = item?;
            Ok(serde_json::from_slice(&value)?)
        })
        .collect()
}

#[async_trait]
impl RateStore for FjallRateStore {
    async fn ingest_rates(
        &self,
        base: &str,
        rates: &RateMap,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let (base, rates) = validate_batch(base, rates)?;
        let timestamp = Utc::now();

        let first_id = self
            .next_rate_id
            .fetch_add(rates.len() as u64, Ordering::SeqCst);
        let created: Vec<RateRecord> = rates
            .into_iter()
            .zip(first_id..)
            .map(|((target, rate), id)| RateRecord {
                id,
                base_currency: base.clone(),
                target_currency: target,
                rate,
                timestamp,
            })
            .collect();

        let mut batch = self.keyspace.batch();
        for record in &created {
            batch.insert(
                &self.rates,
                encode_id(record.id),
                serde_json::to_vec(record)?,
            );
        }
        batch.commit()?;
        self.persist()?;

        debug!("Stored {} rates for base {}", created.len(), base);
        Ok(created)
    }

    async fn list_latest_rates(&self) -> Result<Vec<RateRecord>, StoreError> {
        read_all(&self.rates)
    }

    async fn record_difference(
        &self,
        record: &DifferenceRecord,
    ) -> Result<StoredDifference, StoreError> {
        validate_difference(record)?;

        let stored = StoredDifference {
            id: self.next_difference_id.fetch_add(1, Ordering::SeqCst),
            record: record.clone(),
        };
        self.differences
            .insert(encode_id(stored.id), serde_json::to_vec(&stored)?)?;
        self.persist()?;

        debug!("Stored difference {} for {}", stored.id, record.pair());
        Ok(stored)
    }
}

#[async_trait]
impl RateHistory for FjallRateStore {
    async fn latest_difference(
        &self,
        pair: &CurrencyPair,
    ) -> Result<Option<StoredDifference>, StoreError> {
        for item in self.differences.iter().rev() {
            let (_, value) = item?;
            let stored: StoredDifference = serde_json::from_slice(&value)?;
            if &stored.record.pair() == pair {
                return Ok(Some(stored));
            }
        }
        Ok(None)
    }
}
