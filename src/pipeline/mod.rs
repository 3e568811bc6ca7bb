//! Rate reconciliation pipeline: normalize, deduplicate, evaluate.

pub mod dedup;
pub mod divergence;
pub mod normalize;

pub use dedup::CycleState;
pub use divergence::{DEFAULT_MIN_SIGNIFICANT_PERCENT, divergence_percent, evaluate, round_to};
pub use normalize::normalize;
