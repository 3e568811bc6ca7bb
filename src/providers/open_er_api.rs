use crate::core::error::FetchError;
use crate::core::rate::{RateBatch, RateMap, is_valid_rate, normalize_code};
use crate::core::source::RateFeed;
use crate::providers::util::{http_client, with_retry};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const SOURCE: &str = "open.er-api";

/// Rates-by-base-currency JSON API (`/v6/latest/{BASE}`).
pub struct OpenErApiProvider {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl OpenErApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(OpenErApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            retries: 2,
            retry_delay_ms: 500,
        })
    }

    pub fn with_retries(mut self, retries: usize, retry_delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    base_code: Option<String>,
    #[serde(default)]
    rates: RateMap,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

#[async_trait]
impl RateFeed for OpenErApiProvider {
    #[instrument(name = "OpenErApiFetch", skip(self), fields(base = %base))]
    async fn fetch_latest(&self, base: &str) -> Result<RateBatch, FetchError> {
        let url = format!("{}/v6/latest/{}", self.base_url, normalize_code(base));
        debug!("Requesting latest rates from {}", url);

        let response = with_retry(
            || async { self.client.get(&url).send().await },
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| FetchError::request(SOURCE, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                source_name: SOURCE.to_string(),
                status: response.status().as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::request(SOURCE, e))?;
        let data: LatestRatesResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::parse(SOURCE, e))?;

        if data.result.as_deref() == Some("error") {
            return Err(FetchError::Upstream {
                source_name: SOURCE.to_string(),
                message: data.error_type.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let base_code = data
            .base_code
            .map(|code| normalize_code(&code))
            .filter(|code| !code.is_empty())
            .ok_or_else(|| FetchError::parse(SOURCE, "missing base_code"))?;

        let total = data.rates.len();
        let rates: RateMap = data
            .rates
            .into_iter()
            .filter(|(_, rate)| is_valid_rate(*rate))
            .collect();
        if rates.len() < total {
            debug!(
                "Dropped {} invalid rates for base {}",
                total - rates.len(),
                base_code
            );
        }
        if rates.is_empty() {
            return Err(FetchError::empty(SOURCE));
        }

        debug!("Fetched {} rates for base {}", rates.len(), base_code);
        Ok(RateBatch { base_code, rates })
    }
}
