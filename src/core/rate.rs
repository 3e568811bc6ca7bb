//! Exchange-rate records and currency pairs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Target currency code to rate, all quoted against a single base currency.
pub type RateMap = BTreeMap<String, f64>;

/// Ordered currency pair. The canonical rate of a pair is "units of `quote`
/// per 1 unit of `base`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: normalize_code(base),
            quote: normalize_code(quote),
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// True when `(base, target)` is this pair in either direction.
    pub fn touches(&self, base: &str, target: &str) -> bool {
        let (base, target) = (normalize_code(base), normalize_code(target));
        (base == self.base && target == self.quote) || (base == self.quote && target == self.base)
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Ok(CurrencyPair::new(base, quote))
            }
            _ => Err(anyhow::anyhow!("Invalid currency pair: {}", s)),
        }
    }
}

/// Upper-cased, trimmed currency code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// True for rates that may enter the pipeline.
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// One observed rate from the API source, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: u64,
    pub base_currency: String,
    pub target_currency: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// Rates for a single base currency as returned by the rates API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBatch {
    pub base_code: String,
    pub rates: RateMap,
}

/// One rate scraped from the national bank page. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRateObservation {
    pub currency_code: String,
    pub rate: f64,
}

/// A significant divergence between the API and the site for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceRecord {
    pub base_currency: String,
    pub target_currency: String,
    pub rate_api: f64,
    pub rate_site: f64,
    pub diff_percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl DifferenceRecord {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(&self.base_currency, &self.target_currency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDifference {
    pub id: u64,
    #[serde(flatten)]
    pub record: DifferenceRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parsing_and_display() {
        let pair: CurrencyPair = " usd / kzt".parse().unwrap();
        assert_eq!(pair, CurrencyPair::new("USD", "KZT"));
        assert_eq!(pair.to_string(), "USD/KZT");
        assert_eq!(pair.inverse().to_string(), "KZT/USD");

        assert!("USDKZT".parse::<CurrencyPair>().is_err());
        assert!("USD/".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn test_pair_touches_both_directions() {
        let pair = CurrencyPair::new("USD", "KZT");
        assert!(pair.touches("USD", "KZT"));
        assert!(pair.touches("kzt", "usd"));
        assert!(!pair.touches("USD", "EUR"));
        assert!(!pair.touches("KZT", "KZT"));
    }

    #[test]
    fn test_stored_difference_flattens_record() {
        let stored = StoredDifference {
            id: 7,
            record: DifferenceRecord {
                base_currency: "USD".to_string(),
                target_currency: "KZT".to_string(),
                rate_api: 540.0,
                rate_site: 538.0,
                diff_percent: 0.3717,
                timestamp: Utc::now(),
            },
        };

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["base_currency"], "USD");
        assert_eq!(json["diff_percent"], 0.3717);

        let back: StoredDifference = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}
