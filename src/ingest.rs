//! Periodic ingestion of API rates into the rate store.

use crate::core::config::IngestConfig;
use crate::core::rate::normalize_code;
use crate::core::source::RateFeed;
use crate::core::store::RateStore;
use crate::shutdown::{ShutdownReceiver, sleep_or_shutdown};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    /// Bases whose batch was stored.
    pub stored_bases: Vec<String>,
    pub records: usize,
    /// Bases that failed, with the reason.
    pub failures: Vec<(String, String)>,
}

pub struct RateIngestor {
    feed: Arc<dyn RateFeed>,
    store: Arc<dyn RateStore>,
    config: IngestConfig,
}

impl RateIngestor {
    pub fn new(feed: Arc<dyn RateFeed>, store: Arc<dyn RateStore>, config: IngestConfig) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }

    async fn ingest_base(&self, base: &str) -> Result<usize, String> {
        let batch = self
            .feed
            .fetch_latest(base)
            .await
            .map_err(|e| e.to_string())?;
        let created = self
            .store
            .ingest_rates(&batch.base_code, &batch.rates)
            .await
            .map_err(|e| e.to_string())?;
        Ok(created.len())
    }

    /// Fetches and stores one batch per configured base. A failing base
    /// does not stop the others.
    pub async fn run_once(&self) -> IngestReport {
        let bases: Vec<String> = self.config.bases.iter().map(|b| normalize_code(b)).collect();
        let results = join_all(bases.iter().map(|base| self.ingest_base(base))).await;

        let mut report = IngestReport::default();
        for (base, result) in bases.into_iter().zip(results) {
            match result {
                Ok(count) => {
                    info!(%base, count, "Stored API rates");
                    report.records += count;
                    report.stored_bases.push(base);
                }
                Err(e) => {
                    warn!(%base, error = %e, "Failed to ingest rates");
                    report.failures.push((base, e));
                }
            }
        }
        report
    }

    pub async fn run(&self, mut shutdown: ShutdownReceiver) {
        info!(
            bases = ?self.config.bases,
            interval_secs = self.config.interval_secs,
            "Starting rate ingestion"
        );
        loop {
            let report = self.run_once().await;
            if report.stored_bases.is_empty() && !report.failures.is_empty() {
                error!("Every base failed to ingest this round");
            }

            if !sleep_or_shutdown(self.config.interval(), &mut shutdown).await {
                info!("Rate ingestion stopped");
                return;
            }
        }
    }
}
