use super::AppState;
use super::error::ApiError;
use crate::core::rate::{CurrencyPair, DifferenceRecord, StoredDifference, normalize_code};
use crate::pipeline::{divergence_percent, normalize};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub base_currency: Option<String>,
    pub target_currency: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PairDifference {
    pub base_currency: String,
    pub target_currency: String,
    pub api_rate: f64,
    pub site_rate: f64,
    pub diff_percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecordDifferenceRequest {
    pub base_currency: Option<String>,
    pub target_currency: Option<String>,
    pub rate_api: Option<f64>,
    pub rate_site: Option<f64>,
    pub diff_percent: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RecordDifferenceResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub stored: StoredDifference,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

fn required_code(value: Option<String>, field: &str) -> Result<String, ApiError> {
    let code = normalize_code(&required(value, field)?);
    if code.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(code)
}

impl RecordDifferenceRequest {
    fn into_record(self) -> Result<DifferenceRecord, ApiError> {
        Ok(DifferenceRecord {
            base_currency: required_code(self.base_currency, "base_currency")?,
            target_currency: required_code(self.target_currency, "target_currency")?,
            rate_api: required(self.rate_api, "rate_api")?,
            rate_site: required(self.rate_site, "rate_site")?,
            diff_percent: required(self.diff_percent, "diff_percent")?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Latest API rate for the pair next to the site rate of the latest
/// recorded difference, with the divergence recomputed.
pub(crate) async fn pair_difference(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PairQuery>, QueryRejection>,
) -> Result<Json<PairDifference>, ApiError> {
    let Query(query) = query?;
    let pair = CurrencyPair::new(
        &required_code(query.base_currency, "base_currency")?,
        &required_code(query.target_currency, "target_currency")?,
    );

    let api_rate = state
        .store
        .list_latest_rates()
        .await?
        .into_iter()
        .filter_map(|r| {
            normalize(&r.base_currency, &r.target_currency, r.rate, &pair)
                .map(|rate| ((r.timestamp, r.id), rate))
        })
        .max_by_key(|(order, _)| *order)
        .map(|(_, rate)| rate);
    let latest = state.store.latest_difference(&pair).await?;

    let (Some(api_rate), Some(latest)) = (api_rate, latest) else {
        return Err(ApiError::NotFound("Rates not found".to_string()));
    };
    let site_rate = latest.record.rate_site;

    Ok(Json(PairDifference {
        base_currency: pair.base,
        target_currency: pair.quote,
        api_rate,
        site_rate,
        diff_percent: divergence_percent(api_rate, site_rate),
    }))
}

pub(crate) async fn record_difference(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecordDifferenceRequest>, JsonRejection>,
) -> Result<Json<RecordDifferenceResponse>, ApiError> {
    let Json(request) = payload?;
    let record = request.into_record()?;
    let stored = state.store.record_difference(&record).await?;

    Ok(Json(RecordDifferenceResponse {
        message: "Difference added",
        stored,
    }))
}
