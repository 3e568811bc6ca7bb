pub mod cli;
pub mod core;
pub mod ingest;
pub mod monitor;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod shutdown;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::source::{RateFeed, ReferenceRateSource};
use crate::core::store::{RateHistory, RateStore};
use crate::ingest::RateIngestor;
use crate::monitor::ReconciliationMonitor;
use crate::providers::{NationalBankProvider, OpenErApiProvider};
use crate::server::AppState;
use crate::store::HttpRateStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// HTTP service over the on-disk store
    Serve,
    /// Ingestion loop against a remote rate service
    Ingest,
    /// Reconciliation loop against a remote rate service
    Monitor,
    /// Service and both loops in one process
    Run,
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

fn rate_feed(config: &AppConfig) -> Result<Arc<dyn RateFeed>> {
    let provider = OpenErApiProvider::new(
        &config.providers.open_er_api.base_url,
        config.ingest.fetch_timeout(),
    )
    .context("Failed to create rates API client")?;
    Ok(Arc::new(provider))
}

fn reference_source(config: &AppConfig) -> Result<Arc<dyn ReferenceRateSource>> {
    let national_bank = &config.providers.national_bank;
    let provider = NationalBankProvider::new(
        &national_bank.report_url,
        national_bank.window_days,
        &config.monitor.site_currency,
        config.monitor.fetch_timeout(),
    )
    .context("Failed to create national bank client")?;
    Ok(Arc::new(provider))
}

fn remote_store(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    let store = HttpRateStore::new(config.store_url(), config.ingest.fetch_timeout())
        .context("Failed to create rate service client")?;
    info!("Using rate service at {}", config.store_url());
    Ok(Arc::new(store))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    let (sender, receiver) = shutdown::channel();
    tokio::spawn(shutdown::trigger_on_ctrl_c(sender));

    match command {
        AppCommand::Serve => {
            let store: Arc<dyn RateHistory> = store::open_local_store(&config)?;
            server::serve(&config.server.bind, Arc::new(AppState::new(store)), receiver).await
        }
        AppCommand::Ingest => {
            let ingestor =
                RateIngestor::new(rate_feed(&config)?, remote_store(&config)?, config.ingest);
            ingestor.run(receiver).await;
            Ok(())
        }
        AppCommand::Monitor => {
            let monitor = ReconciliationMonitor::new(
                remote_store(&config)?,
                reference_source(&config)?,
                config.monitor,
            );
            monitor.run(receiver).await;
            Ok(())
        }
        AppCommand::Run => {
            let local = store::open_local_store(&config)?;
            let history: Arc<dyn RateHistory> = local.clone();
            let store: Arc<dyn RateStore> = local;

            let ingestor =
                RateIngestor::new(rate_feed(&config)?, Arc::clone(&store), config.ingest.clone());
            let monitor = ReconciliationMonitor::new(
                store,
                reference_source(&config)?,
                config.monitor.clone(),
            );

            let ingest_rx = receiver.clone();
            let monitor_rx = receiver.clone();
            let ingest_task = tokio::spawn(async move { ingestor.run(ingest_rx).await });
            let monitor_task = tokio::spawn(async move { monitor.run(monitor_rx).await });

            let served =
                server::serve(&config.server.bind, Arc::new(AppState::new(history)), receiver)
                    .await;
            if served.is_err() {
                // The loops are cancelled when the runtime shuts down.
                return served;
            }
            let (ingested, monitored) = tokio::join!(ingest_task, monitor_task);
            ingested.context("Ingestion task failed")?;
            monitored.context("Monitor task failed")?;
            served
        }
    }
}
