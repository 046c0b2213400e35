//! Rebalance drift detection.

use std::collections::BTreeMap;

/// True when any asset in `target` has drifted past `threshold`.
///
/// The test is per-asset and strict: drift exactly equal to the threshold
/// does not trigger. Assets absent from `current` count as weight 0. One
/// triggering asset rebalances the whole portfolio, not just itself.
pub fn needs_rebalance(
    target: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
    threshold: f64,
) -> bool {
    target.iter().any(|(asset, target_weight)| {
        let current_weight = current.get(asset).copied().unwrap_or(0.0);
        (current_weight - target_weight).abs() > threshold
    })
}
