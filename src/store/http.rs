use crate::core::error::StoreError;
use crate::core::rate::{DifferenceRecord, RateMap, RateRecord, StoredDifference};
use crate::core::store::{RateStore, validate_batch, validate_difference};
use crate::providers::util::http_client;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for a remote `serve` process.
pub struct HttpRateStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct IngestBody<'a> {
    base_code: &'a str,
    rates: &'a RateMap,
}

#[derive(Deserialize)]
struct IngestReply {
    records: Vec<RateRecord>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

impl HttpRateStore {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorReply>()
            .await
            .map(|reply| reply.error)
            .unwrap_or_else(|_| status.to_string());
        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                StoreError::Validation(detail)
            }
            StatusCode::NOT_FOUND => StoreError::NotFound(detail),
            _ => StoreError::Persistence(format!("{status}: {detail}")),
        })
    }
}

#[async_trait]
impl RateStore for HttpRateStore {
    async fn ingest_rates(
        &self,
        base: &str,
        rates: &RateMap,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let (base, rates) = validate_batch(base, rates)?;
        let url = format!("{}/rates", self.base_url);
        debug!("Posting {} rates for {} to {}", rates.len(), base, url);

        let response = self
            .client
            .post(&url)
            .json(&IngestBody {
                base_code: &base,
                rates: &rates,
            })
            .send()
            .await?;
        let reply: IngestReply = Self::check(response).await?.json().await?;
        Ok(reply.records)
    }

    async fn list_latest_rates(&self) -> Result<Vec<RateRecord>, StoreError> {
        let url = format!("{}/rates", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn record_difference(
        &self,
        record: &DifferenceRecord,
    ) -> Result<StoredDifference, StoreError> {
        validate_difference(record)?;
        let url = format!("{}/differences", self.base_url);

        let response = self.client.post(&url).json(record).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
