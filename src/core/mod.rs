//! Core types and abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod rate;
pub mod source;
pub mod store;

// Re-export main types for cleaner imports
pub use error::{FetchError, StoreError};
pub use rate::{
    CurrencyPair, DifferenceRecord, RateBatch, RateMap, RateRecord, SiteRateObservation,
    StoredDifference,
};
pub use source::{RateFeed, ReferenceRateSource};
pub use store::{RateHistory, RateStore};
