//! Reconciliation loop: compares stored API rates with the national bank's
//! published rate and records significant divergences.

use crate::core::config::MonitorConfig;
use crate::core::error::{FetchError, StoreError};
use crate::core::rate::{CurrencyPair, RateMap, RateRecord, is_valid_rate, normalize_code};
use crate::core::source::ReferenceRateSource;
use crate::core::store::RateStore;
use crate::pipeline::{CycleState, evaluate, normalize};
use crate::shutdown::{ShutdownReceiver, sleep_or_shutdown};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Normalizing,
    Evaluating,
    Persisting,
    Sleeping,
}

/// What one reconciliation cycle did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    /// Set when the cycle stopped before comparing anything.
    pub skipped: Option<String>,
    /// API records touching the monitored pair.
    pub candidates: usize,
    pub normalized: usize,
    pub compared: usize,
    /// Significant differences produced by the evaluator.
    pub emitted: usize,
    pub persisted: usize,
    pub dropped: usize,
}

pub struct ReconciliationMonitor {
    store: Arc<dyn RateStore>,
    site: Arc<dyn ReferenceRateSource>,
    config: MonitorConfig,
}

impl ReconciliationMonitor {
    pub fn new(
        store: Arc<dyn RateStore>,
        site: Arc<dyn ReferenceRateSource>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            site,
            config,
        }
    }

    fn pair(&self) -> &CurrencyPair {
        &self.config.pair
    }

    fn enter(&self, phase: CyclePhase) {
        debug!(pair = %self.pair(), ?phase, "Reconciliation phase");
    }

    fn site_rate(&self, fetched: Result<RateMap, FetchError>) -> Result<f64, String> {
        let rates = fetched.map_err(|e| format!("site fetch failed: {e}"))?;
        let code = normalize_code(&self.config.site_currency);
        match rates.get(&code) {
            Some(rate) if is_valid_rate(*rate) => Ok(*rate),
            Some(rate) => Err(format!("site reported invalid rate {rate} for {code}")),
            None => Err(format!("site reported no rate for {code}")),
        }
    }

    fn api_rates(
        fetched: Result<Vec<RateRecord>, StoreError>,
    ) -> Result<Vec<RateRecord>, String> {
        match fetched {
            Ok(rates) if rates.is_empty() => Err("no API rates stored yet".to_string()),
            Ok(rates) => Ok(rates),
            Err(e) => Err(format!("API rates unavailable: {e}")),
        }
    }

    /// Runs one fetch, normalize, evaluate, persist pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let pair = self.pair().clone();

        self.enter(CyclePhase::Idle);
        self.enter(CyclePhase::Fetching);
        let (site, api) = tokio::join!(
            self.site.fetch_reference_rates(),
            self.store.list_latest_rates()
        );
        let site_rate = self.site_rate(site);
        let api_rates = Self::api_rates(api);

        let (site_rate, mut api_rates) = match (site_rate, api_rates) {
            (Ok(site_rate), Ok(api_rates)) => (site_rate, api_rates),
            (site_rate, api_rates) => {
                let reason = [site_rate.err(), api_rates.err()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(%pair, %reason, "Skipping comparison, missing data");
                report.skipped = Some(reason);
                return report;
            }
        };

        self.enter(CyclePhase::Normalizing);
        // Newest first, so the most recent eligible record wins the pair.
        api_rates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        let canonical: Vec<(u64, f64)> = api_rates
            .iter()
            .filter(|r| pair.touches(&r.base_currency, &r.target_currency))
            .inspect(|_| report.candidates += 1)
            .filter_map(|r| {
                normalize(&r.base_currency, &r.target_currency, r.rate, &pair).map(|c| (r.id, c))
            })
            .collect();
        report.normalized = canonical.len();
        debug!(
            "{} of {} candidates normalized for {}",
            report.normalized, report.candidates, pair
        );

        self.enter(CyclePhase::Evaluating);
        let mut state = CycleState::new();
        let mut differences = Vec::new();
        for (record_id, rate_api) in canonical {
            if !state.should_process(&pair) {
                continue;
            }
            report.compared += 1;
            match evaluate(&pair, rate_api, site_rate, self.config.min_significant_percent) {
                Some(difference) => {
                    info!(
                        %pair,
                        record_id,
                        rate_api = difference.rate_api,
                        rate_site = difference.rate_site,
                        diff_percent = difference.diff_percent,
                        "Significant divergence"
                    );
                    differences.push(difference);
                }
                None => debug!(%pair, record_id, rate_api, site_rate, "Divergence below threshold"),
            }
            state.mark_processed(&pair);
        }
        report.emitted = differences.len();

        self.enter(CyclePhase::Persisting);
        for difference in differences {
            match self.store.record_difference(&difference).await {
                Ok(stored) => {
                    report.persisted += 1;
                    debug!("Recorded difference {}", stored.id);
                }
                Err(e) => {
                    report.dropped += 1;
                    error!(%pair, error = %e, "Failed to record difference, dropping it");
                }
            }
        }

        report
    }

    /// Runs cycles until shutdown is requested.
    pub async fn run(&self, mut shutdown: ShutdownReceiver) {
        info!(
            pair = %self.pair(),
            interval_secs = self.config.interval_secs,
            "Starting rate monitor"
        );
        loop {
            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(report) => info!(?report, "Reconciliation cycle finished"),
                Err(_) => error!("Reconciliation cycle panicked, continuing with the next cycle"),
            }

            self.enter(CyclePhase::Sleeping);
            if !sleep_or_shutdown(self.config.interval(), &mut shutdown).await {
                info!("Rate monitor stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::{DifferenceRecord, StoredDifference};
    use crate::store::MemoryRateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSite(Result<RateMap, String>);

    #[async_trait]
    impl ReferenceRateSource for FixedSite {
        async fn fetch_reference_rates(&self) -> Result<RateMap, FetchError> {
            self.0.clone().map_err(|msg| FetchError::Request {
                source_name: "test".to_string(),
                message: msg,
            })
        }
    }

    fn site(rate: f64) -> Arc<FixedSite> {
        Arc::new(FixedSite(Ok(RateMap::from([("USD".to_string(), rate)]))))
    }

    fn monitor(store: Arc<dyn RateStore>, site: Arc<dyn ReferenceRateSource>) -> ReconciliationMonitor {
        ReconciliationMonitor::new(store, site, MonitorConfig::default())
    }

    async fn seeded(entries: &[(&str, &str, f64)]) -> Arc<MemoryRateStore> {
        let store = Arc::new(MemoryRateStore::new());
        for (base, target, rate) in entries {
            store
                .ingest_rates(base, &RateMap::from([(target.to_string(), *rate)]))
                .await
                .unwrap();
        }
        store
    }

    async fn differences(store: &MemoryRateStore) -> Option<StoredDifference> {
        use crate::core::store::RateHistory;
        store
            .latest_difference(&CurrencyPair::new("USD", "KZT"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_quote_divergence_is_recorded() {
        let store = seeded(&[("USD", "KZT", 540.0)]).await;
        let report = monitor(store.clone(), site(538.0)).run_cycle().await;

        assert_eq!(report.skipped, None);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.persisted, 1);

        let stored = differences(&store).await.unwrap();
        assert_eq!(stored.record.rate_api, 540.0);
        assert_eq!(stored.record.rate_site, 538.0);
        assert_eq!(stored.record.diff_percent, 0.3717);
    }

    #[tokio::test]
    async fn test_inverse_quote_within_threshold_is_not_recorded() {
        let store = seeded(&[("KZT", "USD", 0.00185)]).await;
        let report = monitor(store.clone(), site(540.5405)).run_cycle().await;

        assert_eq!(report.normalized, 1);
        assert_eq!(report.compared, 1);
        assert_eq!(report.emitted, 0);
        assert!(differences(&store).await.is_none());
    }

    #[tokio::test]
    async fn test_one_difference_per_pair_per_cycle() {
        let store = seeded(&[
            ("USD", "KZT", 545.0),
            ("KZT", "USD", 0.0018),
            ("USD", "EUR", 0.92),
            ("USD", "KZT", 540.0),
        ])
        .await;
        let report = monitor(store.clone(), site(538.0)).run_cycle().await;

        assert_eq!(report.candidates, 3);
        assert_eq!(report.normalized, 3);
        assert_eq!(report.compared, 1);
        assert_eq!(report.persisted, 1);
        // The newest record (id 4) wins.
        assert_eq!(differences(&store).await.unwrap().record.rate_api, 540.0);
    }

    #[tokio::test]
    async fn test_each_cycle_is_independent() {
        let store = seeded(&[("USD", "KZT", 540.0)]).await;
        let monitor = monitor(store.clone(), site(538.0));

        assert_eq!(monitor.run_cycle().await.persisted, 1);
        assert_eq!(monitor.run_cycle().await.persisted, 1);
        assert_eq!(differences(&store).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_site_failure_skips_cycle() {
        let store = seeded(&[("USD", "KZT", 540.0)]).await;
        let failing = Arc::new(FixedSite(Err("connection reset".to_string())));
        let report = monitor(store.clone(), failing).run_cycle().await;

        let reason = report.skipped.unwrap();
        assert!(reason.contains("site fetch failed"), "{reason}");
        assert!(differences(&store).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_site_currency_skips_cycle() {
        let store = seeded(&[("USD", "KZT", 540.0)]).await;
        let other = Arc::new(FixedSite(Ok(RateMap::from([("EUR".to_string(), 580.0)]))));
        let report = monitor(store, other).run_cycle().await;

        assert!(report.skipped.unwrap().contains("no rate for USD"));
    }

    #[tokio::test]
    async fn test_empty_store_skips_cycle() {
        let store = Arc::new(MemoryRateStore::new());
        let report = monitor(store, site(538.0)).run_cycle().await;

        assert_eq!(report.skipped.as_deref(), Some("no API rates stored yet"));
    }

    struct FailingWrites {
        inner: MemoryRateStore,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl RateStore for FailingWrites {
        async fn ingest_rates(
            &self,
            base: &str,
            rates: &RateMap,
        ) -> Result<Vec<RateRecord>, StoreError> {
            self.inner.ingest_rates(base, rates).await
        }

        async fn list_latest_rates(&self) -> Result<Vec<RateRecord>, StoreError> {
            self.inner.list_latest_rates().await
        }

        async fn record_difference(
            &self,
            _record: &DifferenceRecord,
        ) -> Result<StoredDifference, StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Persistence("store unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_drops_record() {
        let store = Arc::new(FailingWrites {
            inner: MemoryRateStore::new(),
            attempts: AtomicUsize::new(0),
        });
        store
            .ingest_rates("USD", &RateMap::from([("KZT".to_string(), 540.0)]))
            .await
            .unwrap();

        let report = monitor(store.clone(), site(538.0)).run_cycle().await;
        assert_eq!(report.emitted, 1);
        assert_eq!(report.persisted, 0);
        assert_eq!(report.dropped, 1);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    }

    struct PanickingSite;

    #[async_trait]
    impl ReferenceRateSource for PanickingSite {
        async fn fetch_reference_rates(&self) -> Result<RateMap, FetchError> {
            panic!("parser blew up");
        }
    }

    #[tokio::test]
    async fn test_run_survives_panicking_cycle_and_stops_on_shutdown() {
        let store = Arc::new(MemoryRateStore::new());
        let config = MonitorConfig {
            interval_secs: 3600,
            ..MonitorConfig::default()
        };
        let monitor = ReconciliationMonitor::new(store, Arc::new(PanickingSite), config);

        let (tx, rx) = crate::shutdown::channel();
        let handle = tokio::spawn(async move { monitor.run(rx).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .expect("monitor task panicked");
    }
}
