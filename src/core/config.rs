use crate::core::rate::CurrencyPair;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_OPEN_ER_API_URL: &str = "https://open.er-api.com";
pub const DEFAULT_NATIONAL_BANK_URL: &str = "https://nationalbank.kz/en/exchangerates/ezhednevnye-oficialnye-rynochnye-kursy-valyut/report?beginDate={begin_date}&endDate={end_date}&search-exchanges=&rates%5B%5D=5";
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenErApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NationalBankConfig {
    /// Report URL; `{begin_date}` and `{end_date}` are replaced with the
    /// report window in `dd.mm.YYYY`.
    pub report_url: String,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_open_er_api")]
    pub open_er_api: OpenErApiConfig,
    #[serde(default = "default_national_bank")]
    pub national_bank: NationalBankConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            open_er_api: default_open_er_api(),
            national_bank: default_national_bank(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_bases")]
    pub bases: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bases: default_bases(),
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_pair")]
    pub pair: CurrencyPair,
    /// Currency code under which the site publishes the pair's rate.
    #[serde(default = "default_site_currency")]
    pub site_currency: String,
    #[serde(default = "default_min_significant_percent")]
    pub min_significant_percent: f64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            site_currency: default_site_currency(),
            min_significant_percent: default_min_significant_percent(),
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Rate store service used by stand-alone `ingest` and `monitor`.
    pub store_url: Option<String>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratewatch", "ratewatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratewatch", "ratewatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn store_url(&self) -> &str {
        self.store_url.as_deref().unwrap_or(DEFAULT_STORE_URL)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.monitor.pair.base == self.monitor.pair.quote {
            anyhow::bail!("monitor.pair must name two different currencies");
        }
        if !self.monitor.min_significant_percent.is_finite()
            || self.monitor.min_significant_percent < 0.0
        {
            anyhow::bail!("monitor.min_significant_percent must be a non-negative number");
        }
        if self.ingest.interval_secs == 0 || self.monitor.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than zero");
        }
        Ok(())
    }
}

fn default_open_er_api() -> OpenErApiConfig {
    OpenErApiConfig {
        base_url: DEFAULT_OPEN_ER_API_URL.to_string(),
    }
}

fn default_national_bank() -> NationalBankConfig {
    NationalBankConfig {
        report_url: DEFAULT_NATIONAL_BANK_URL.to_string(),
        window_days: default_window_days(),
    }
}

fn default_window_days() -> i64 {
    7
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_bases() -> Vec<String> {
    vec!["KZT".to_string(), "USD".to_string()]
}

fn default_interval_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_pair() -> CurrencyPair {
    CurrencyPair::new("USD", "KZT")
}

fn default_site_currency() -> String {
    "USD".to_string()
}

fn default_min_significant_percent() -> f64 {
    0.01
}
