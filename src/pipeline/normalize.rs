use crate::core::rate::{CurrencyPair, is_valid_rate, normalize_code};

/// Converts a directional quote `base -> target = rate` into the canonical
/// rate of `pair` (units of `pair.quote` per 1 unit of `pair.base`).
///
/// Returns `None` for quotes of any other pair and for rates that are not
/// finite and positive.
pub fn normalize(base: &str, target: &str, rate: f64, pair: &CurrencyPair) -> Option<f64> {
    if !is_valid_rate(rate) {
        return None;
    }

    let (base, target) = (normalize_code(base), normalize_code(target));
    if base == pair.base && target == pair.quote {
        Some(rate)
    } else if base == pair.quote && target == pair.base {
        Some(1.0 / rate)
    } else {
        None
    }
}
