use crate::core::rate::CurrencyPair;
use std::collections::HashSet;

/// Pairs already compared during the current reconciliation cycle.
///
/// A fresh value is created for every cycle; nothing carries over.
#[derive(Debug, Default)]
pub struct CycleState {
    processed: HashSet<CurrencyPair>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_process(&self, pair: &CurrencyPair) -> bool {
        !self.processed.contains(pair)
    }

    /// Must be called right after a comparison for `pair` is emitted.
    pub fn mark_processed(&mut self, pair: &CurrencyPair) {
        self.processed.insert(pair.clone());
    }

    pub fn reset(&mut self) {
        self.processed.clear();
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}
