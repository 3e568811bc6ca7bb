use crate::core::rate::{CurrencyPair, DifferenceRecord, is_valid_rate};
use chrono::Utc;

pub const DEFAULT_MIN_SIGNIFICANT_PERCENT: f64 = 0.01;

const DIFF_PERCENT_PLACES: i32 = 4;
const RATE_PLACES: i32 = 6;

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Absolute difference as a percentage of the site rate, rounded to 4 places.
pub fn divergence_percent(rate_api: f64, rate_site: f64) -> f64 {
    round_to(
        (rate_api - rate_site).abs() / rate_site * 100.0,
        DIFF_PERCENT_PLACES,
    )
}

/// Compares two canonical rates for `pair`.
///
/// Returns a record only when the divergence reaches `min_significant_percent`.
pub fn evaluate(
    pair: &CurrencyPair,
    rate_api: f64,
    rate_site: f64,
    min_significant_percent: f64,
) -> Option<DifferenceRecord> {
    if !is_valid_rate(rate_api) || !is_valid_rate(rate_site) {
        return None;
    }

    let diff_percent = divergence_percent(rate_api, rate_site);
    if diff_percent < min_significant_percent {
        return None;
    }

    Some(DifferenceRecord {
        base_currency: pair.base.clone(),
        target_currency: pair.quote.clone(),
        rate_api: round_to(rate_api, RATE_PLACES),
        rate_site,
        diff_percent,
        timestamp: Utc::now(),
    })
}
