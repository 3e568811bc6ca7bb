use super::AppState;
use super::error::ApiError;
use crate::core::rate::{RateMap, RateRecord};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct IngestRatesRequest {
    pub base_code: Option<String>,
    pub rates: Option<RateMap>,
}

#[derive(Debug, Serialize)]
pub struct IngestRatesResponse {
    pub message: String,
    pub count: usize,
    pub records: Vec<RateRecord>,
}

pub(crate) async fn ingest_rates(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRatesRequest>, JsonRejection>,
) -> Result<Json<IngestRatesResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(base_code), Some(rates)) = (request.base_code, request.rates) else {
        return Err(ApiError::BadRequest("Missing base_code or rates".to_string()));
    };

    let records = state.store.ingest_rates(&base_code, &rates).await?;
    let base = records
        .first()
        .map_or(base_code.as_str(), |r| r.base_currency.as_str())
        .to_string();
    info!(%base, count = records.len(), "Ingested rates");

    Ok(Json(IngestRatesResponse {
        message: format!("Rates for {base} added successfully."),
        count: records.len(),
        records,
    }))
}

pub(crate) async fn list_rates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RateRecord>>, ApiError> {
    Ok(Json(state.store.list_latest_rates().await?))
}
