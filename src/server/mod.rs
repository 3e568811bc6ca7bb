//! HTTP service exposing the rate store.
//!
//! `build_router` is the single entry point so tests can drive the bare
//! router in-process; `serve` binds it and drains on shutdown.

pub mod differences;
pub mod error;
pub mod rates;

use crate::core::store::RateHistory;
use crate::shutdown::{ShutdownReceiver, requested};
use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::routing::get;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub use error::ApiError;

pub struct AppState {
    pub store: Arc<dyn RateHistory>,
}

impl AppState {
    pub fn new(store: Arc<dyn RateHistory>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rates", get(rates::list_rates).post(rates::ingest_rates))
        .route(
            "/differences",
            get(differences::pair_difference).post(differences::record_difference),
        )
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Serves the router on `bind` until shutdown is requested.
pub async fn serve(bind: &str, state: Arc<AppState>, mut shutdown: ShutdownReceiver) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Rate service listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { requested(&mut shutdown).await })
        .await
        .context("Rate service failed")?;

    info!("Rate service stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::{DifferenceRecord, RateMap};
    use crate::core::store::RateStore;
    use crate::store::MemoryRateStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn router(store: &MemoryRateStore) -> Router {
        build_router(Arc::new(AppState::new(Arc::new(store.clone()))))
    }

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.expect("oneshot failed");
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("body collect failed")
            .to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn difference(rate_api: f64, rate_site: f64) -> DifferenceRecord {
        DifferenceRecord {
            base_currency: "USD".to_string(),
            target_currency: "KZT".to_string(),
            rate_api,
            rate_site,
            diff_percent: 0.3717,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(router(&MemoryRateStore::new()), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["service"], "ratewatch");
    }

    #[tokio::test]
    async fn test_post_rates_stores_batch() {
        let store = MemoryRateStore::new();
        let (status, body) = call(
            router(&store),
            post("/rates", r#"{"base_code": "usd", "rates": {"KZT": 540.0, "EUR": 0.92}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Rates for USD added successfully.");
        assert_eq!(body["count"], 2);
        assert_eq!(store.list_latest_rates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_post_rates_without_rates_is_rejected() {
        let store = MemoryRateStore::new();
        let (status, body) = call(router(&store), post("/rates", r#"{"base_code": "USD"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing base_code or rates");
        assert!(store.list_latest_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_rates_rejects_bad_input() {
        let store = MemoryRateStore::new();
        for body in [
            r#"{"base_code": "USD", "rates": {}}"#,
            r#"{"base_code": "USD", "rates": {"KZT": -1.0}}"#,
            r#"{"base_code": "", "rates": {"KZT": 540.0}}"#,
            "not json",
        ] {
            let (status, _) = call(router(&store), post("/rates", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
        assert!(store.list_latest_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_rates_lists_records() {
        let store = MemoryRateStore::new();
        store
            .ingest_rates("USD", &RateMap::from([("KZT".to_string(), 540.0)]))
            .await
            .unwrap();

        let (status, body) = call(router(&store), get("/rates")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["base_currency"], "USD");
        assert_eq!(body[0]["rate"], 540.0);
    }

    #[tokio::test]
    async fn test_get_differences_without_api_rate_is_not_found() {
        let store = MemoryRateStore::new();
        store.record_difference(&difference(540.0, 538.0)).await.unwrap();

        let (status, body) = call(
            router(&store),
            get("/differences?base_currency=USD&target_currency=KZT"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Rates not found");
    }

    #[tokio::test]
    async fn test_get_differences_without_difference_is_not_found() {
        let store = MemoryRateStore::new();
        store
            .ingest_rates("USD", &RateMap::from([("KZT".to_string(), 540.0)]))
            .await
            .unwrap();

        let (status, _) = call(
            router(&store),
            get("/differences?base_currency=USD&target_currency=KZT"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_differences_recomputes_against_site_rate() {
        let store = MemoryRateStore::new();
        store
            .ingest_rates("KZT", &RateMap::from([("USD".to_string(), 0.002)]))
            .await
            .unwrap();
        store.record_difference(&difference(540.0, 538.0)).await.unwrap();

        let (status, body) = call(
            router(&store),
            get("/differences?base_currency=usd&target_currency=kzt"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["base_currency"], "USD");
        assert_eq!(body["target_currency"], "KZT");
        assert_eq!(body["api_rate"], 500.0);
        assert_eq!(body["site_rate"], 538.0);
        assert_eq!(body["diff_percent"], 7.0632);
    }

    #[tokio::test]
    async fn test_get_differences_requires_both_currencies() {
        let (status, body) = call(
            router(&MemoryRateStore::new()),
            get("/differences?base_currency=USD"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "target_currency is required");
    }

    #[tokio::test]
    async fn test_post_difference_defaults_timestamp() {
        let store = MemoryRateStore::new();
        let payload = json!({
            "base_currency": "USD",
            "target_currency": "KZT",
            "rate_api": 540.0,
            "rate_site": 538.0,
            "diff_percent": 0.3717,
        });
        let (status, body) = call(router(&store), post("/differences", &payload.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Difference added");
        assert_eq!(body["id"], 1);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_post_difference_missing_field_is_rejected() {
        let store = MemoryRateStore::new();
        let payload = json!({
            "base_currency": "USD",
            "target_currency": "KZT",
            "rate_api": 540.0,
            "diff_percent": 0.3717,
        });
        let (status, body) = call(router(&store), post("/differences", &payload.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "rate_site is required");
    }
}
