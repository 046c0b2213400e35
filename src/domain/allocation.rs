//! Target weight allocation policies.
//!
//! Two policy families share the [`AllocationPolicy`] trait: a constant
//! fixed-weight table and a signal-driven ("dynamic") policy that damps
//! each sleeve by its valuation or yield percentile. Both return the signal
//! readings they used so the simulator can capture them in the rebalance
//! log.
//!
//! Percentile failures propagate unchanged out of `target_weights`, so a
//! misconfigured data pipeline fails loudly here. The only equal-weight
//! fallback lives in [`DegradedEqualWeights`], which an operator must
//! switch on explicitly.

use chrono::NaiveDate;
use log::warn;
use std::collections::BTreeMap;

use super::error::GlidepathError;
use super::market::MarketData;
use super::percentile::signal_percentile;

/// A computed target: asset → weight plus the signal readings that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAllocation {
    pub weights: BTreeMap<String, f64>,
    pub signals: BTreeMap<String, f64>,
}

pub trait AllocationPolicy {
    fn name(&self) -> &str;

    fn target_weights(
        &self,
        market: &MarketData,
        date: NaiveDate,
    ) -> Result<TargetAllocation, GlidepathError>;

    /// Assets this policy may ever allocate to.
    fn assets(&self) -> Vec<String>;
}

/// Constant pre-declared weight table.
///
/// Validated once at construction: entries naming assets absent from the
/// loaded feeds are dropped with a warning, not an error. The surviving
/// table is returned unchanged on every call.
pub struct FixedWeightPolicy {
    weights: BTreeMap<String, f64>,
}

impl FixedWeightPolicy {
    pub fn new(
        table: Vec<(String, f64)>,
        market: &MarketData,
    ) -> Result<Self, GlidepathError> {
        let mut weights = BTreeMap::new();
        for (asset, weight) in table {
            if weight < 0.0 {
                return Err(GlidepathError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "weights".into(),
                    reason: format!("negative weight {weight} for {asset}"),
                });
            }
            if !market.has_asset(&asset) {
                warn!("dropping {asset} from fixed weight table: no price feed loaded");
                continue;
            }
            weights.insert(asset, weight);
        }
        if weights.is_empty() {
            return Err(GlidepathError::ConfigInvalid {
                section: "strategy".into(),
                key: "weights".into(),
                reason: "no weight table entry matches a loaded price feed".into(),
            });
        }
        Ok(FixedWeightPolicy { weights })
    }
}

impl AllocationPolicy for FixedWeightPolicy {
    fn name(&self) -> &str {
        "fixed-weight"
    }

    fn target_weights(
        &self,
        _market: &MarketData,
        _date: NaiveDate,
    ) -> Result<TargetAllocation, GlidepathError> {
        Ok(TargetAllocation {
            weights: self.weights.clone(),
            signals: BTreeMap::new(),
        })
    }

    fn assets(&self) -> Vec<String> {
        self.weights.keys().cloned().collect()
    }
}

/// One equity-like sleeve of the dynamic policy: damped by its own
/// valuation percentile.
#[derive(Debug, Clone)]
pub struct EquitySleeve {
    pub asset: String,
    pub base_allocation: f64,
    pub signal: String,
}

/// Rate-sensitive sleeve: scaled by the square of its yield percentile.
#[derive(Debug, Clone)]
pub struct BondSleeve {
    pub asset: String,
    pub base_allocation: f64,
    pub signal: String,
}

/// Cash-like sleeve: funded from the current yield level only when the
/// yield clears the configured threshold.
#[derive(Debug, Clone)]
pub struct CashSleeve {
    pub asset: String,
    pub signal: String,
}

/// Hedge/commodity sleeve: fixed base allocation, signal-independent.
#[derive(Debug, Clone)]
pub struct HedgeSleeve {
    pub asset: String,
    pub base_allocation: f64,
}

/// Signal-driven allocation.
pub struct DynamicPolicy {
    equities: Vec<EquitySleeve>,
    bond: Option<BondSleeve>,
    cash: Option<CashSleeve>,
    hedge: Option<HedgeSleeve>,
    cash_yield_threshold: f64,
    reserved_fraction: f64,
    lookback_years: f64,
}

impl DynamicPolicy {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        equities: Vec<EquitySleeve>,
        bond: Option<BondSleeve>,
        cash: Option<CashSleeve>,
        hedge: Option<HedgeSleeve>,
        cash_yield_threshold: f64,
        reserved_fraction: f64,
        lookback_years: f64,
        market: &MarketData,
    ) -> Result<Self, GlidepathError> {
        let equities: Vec<EquitySleeve> = equities
            .into_iter()
            .filter(|s| keep_sleeve(&s.asset, market))
            .collect();
        let bond = bond.filter(|s| keep_sleeve(&s.asset, market));
        let cash = cash.filter(|s| keep_sleeve(&s.asset, market));
        let hedge = hedge.filter(|s| keep_sleeve(&s.asset, market));

        if equities.is_empty() && bond.is_none() && cash.is_none() && hedge.is_none() {
            return Err(GlidepathError::ConfigInvalid {
                section: "strategy".into(),
                key: "sleeves".into(),
                reason: "no configured sleeve matches a loaded price feed".into(),
            });
        }
        if !(0.0..1.0).contains(&reserved_fraction) {
            return Err(GlidepathError::ConfigInvalid {
                section: "strategy".into(),
                key: "reserved_fraction".into(),
                reason: "must be in [0, 1)".into(),
            });
        }

        Ok(DynamicPolicy {
            equities,
            bond,
            cash,
            hedge,
            cash_yield_threshold,
            reserved_fraction,
            lookback_years,
        })
    }

    /// Raw, pre-normalization sleeve terms and the signal readings used.
    ///
    /// Kept separate from the rescale so the two steps stay in the required
    /// order: every term (including cash and hedge) is computed here, and
    /// [`normalize_to_invested`] runs exactly once on the full vector.
    pub fn raw_weights(
        &self,
        market: &MarketData,
        date: NaiveDate,
    ) -> Result<(BTreeMap<String, f64>, BTreeMap<String, f64>), GlidepathError> {
        let mut raw: BTreeMap<String, f64> = BTreeMap::new();
        let mut signals: BTreeMap<String, f64> = BTreeMap::new();

        for sleeve in &self.equities {
            let (kind, series) = market.signal_series(&sleeve.signal)?;
            let pct =
                signal_percentile(&sleeve.signal, series, *kind, date, self.lookback_years)?;
            signals.insert(sleeve.signal.clone(), pct);
            raw.insert(sleeve.asset.clone(), sleeve.base_allocation * (1.0 - pct));
        }

        if let Some(sleeve) = &self.bond {
            let (kind, series) = market.signal_series(&sleeve.signal)?;
            let pct =
                signal_percentile(&sleeve.signal, series, *kind, date, self.lookback_years)?;
            signals.insert(sleeve.signal.clone(), pct);
            raw.insert(sleeve.asset.clone(), sleeve.base_allocation * pct * pct);
        }

        if let Some(sleeve) = &self.cash {
            let (_, series) = market.signal_series(&sleeve.signal)?;
            let yield_level = series.latest_at(date).map(|o| o.value).ok_or_else(|| {
                GlidepathError::data_unavailable(
                    &sleeve.signal,
                    format!("no yield observation at or before {date}"),
                )
            })?;
            signals.insert(sleeve.signal.clone(), yield_level);
            let weight = if yield_level >= self.cash_yield_threshold {
                yield_level / 100.0
            } else {
                0.0
            };
            raw.insert(sleeve.asset.clone(), weight);
        }

        if let Some(sleeve) = &self.hedge {
            raw.insert(sleeve.asset.clone(), sleeve.base_allocation);
        }

        Ok((raw, signals))
    }
}

fn keep_sleeve(asset: &str, market: &MarketData) -> bool {
    if market.has_asset(asset) {
        true
    } else {
        warn!("dropping sleeve {asset}: no price feed loaded");
        false
    }
}

impl AllocationPolicy for DynamicPolicy {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn target_weights(
        &self,
        market: &MarketData,
        date: NaiveDate,
    ) -> Result<TargetAllocation, GlidepathError> {
        let (raw, signals) = self.raw_weights(market, date)?;
        let weights = normalize_to_invested(raw, self.reserved_fraction);
        Ok(TargetAllocation { weights, signals })
    }

    fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> =
            self.equities.iter().map(|s| s.asset.clone()).collect();
        assets.extend(self.bond.iter().map(|s| s.asset.clone()));
        assets.extend(self.cash.iter().map(|s| s.asset.clone()));
        assets.extend(self.hedge.iter().map(|s| s.asset.clone()));
        assets
    }
}

/// Rescale a raw weight vector so its sum equals `1 − reserved_fraction`.
///
/// The operation order is a correctness requirement, not a style choice:
/// every sleeve term, including the cash and hedge terms, must be present
/// in `raw` BEFORE the single multiplicative rescale. Normalizing the
/// signal-damped sleeves first and adding cash/hedge afterwards
/// double-counts the added terms and yields a different, wrong vector.
///
/// A raw vector summing to zero (every sleeve damped to nothing) is
/// returned unchanged: the run stays in cash rather than dividing by zero.
pub fn normalize_to_invested(
    raw: BTreeMap<String, f64>,
    reserved_fraction: f64,
) -> BTreeMap<String, f64> {
    let sum: f64 = raw.values().sum();
    if sum <= f64::EPSILON {
        return raw;
    }
    let factor = (1.0 - reserved_fraction) / sum;
    raw.into_iter().map(|(k, w)| (k, w * factor)).collect()
}

/// Equal weights across `assets`. This is the degraded-mode vector only;
/// production policies never fall back to it implicitly.
pub fn equal_weights(assets: &[String]) -> TargetAllocation {
    let n = assets.len();
    let mut weights = BTreeMap::new();
    if n > 0 {
        let w = 1.0 / n as f64;
        for asset in assets {
            weights.insert(asset.clone(), w);
        }
    }
    TargetAllocation {
        weights,
        signals: BTreeMap::new(),
    }
}

/// Explicit degraded mode: wraps a policy and substitutes equal weights
/// when the inner policy reports `DataUnavailable`, logging the
/// substitution. Every other error still propagates.
pub struct DegradedEqualWeights<P> {
    inner: P,
}

impl<P: AllocationPolicy> DegradedEqualWeights<P> {
    pub fn new(inner: P) -> Self {
        DegradedEqualWeights { inner }
    }
}

impl<P: AllocationPolicy> AllocationPolicy for DegradedEqualWeights<P> {
    fn name(&self) -> &str {
        "degraded-equal-weights"
    }

    fn target_weights(
        &self,
        market: &MarketData,
        date: NaiveDate,
    ) -> Result<TargetAllocation, GlidepathError> {
        match self.inner.target_weights(market, date) {
            Ok(allocation) => Ok(allocation),
            Err(GlidepathError::DataUnavailable { series, reason }) => {
                warn!(
                    "degraded mode: {} unavailable ({reason}), substituting equal weights on {date}",
                    series
                );
                Ok(equal_weights(&self.inner.assets()))
            }
            Err(other) => Err(other),
        }
    }

    fn assets(&self) -> Vec<String> {
        self.inner.assets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{Series, SignalKind};
    use approx::assert_relative_eq;
    use chrono::Duration;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flat_prices(value: f64, end: NaiveDate) -> Series {
        Series::from_pairs((0..5).map(|i| (end - Duration::days(i), value)).collect())
    }

    /// Signal history whose latest reading ranks at exactly `pct`: nine
    /// historical observations at 10, 20, .., 90 plus a current value that
    /// lands `pct * 10` of the 10 observations at or below it.
    fn signal_with_percentile(pct: f64, end: NaiveDate) -> Series {
        let rank = (pct * 10.0).round() as i64;
        let mut pairs: Vec<(NaiveDate, f64)> = (1..=9)
            .map(|i| (end - Duration::days(20 * i as i64), i as f64 * 10.0))
            .collect();
        pairs.push((end, rank as f64 * 10.0 - 9.0));
        Series::from_pairs(pairs)
    }

    fn market_with_assets(assets: &[&str], end: NaiveDate) -> MarketData {
        let mut market = MarketData::new();
        for asset in assets {
            market.add_prices(asset, flat_prices(100.0, end));
        }
        market
    }

    #[test]
    fn fixed_policy_returns_declared_table() {
        let end = d(2024, 6, 1);
        let market = market_with_assets(&["SPY", "AGG"], end);
        let policy = FixedWeightPolicy::new(
            vec![("SPY".into(), 0.6), ("AGG".into(), 0.4)],
            &market,
        )
        .unwrap();

        let allocation = policy.target_weights(&market, end).unwrap();
        assert_eq!(allocation.weights["SPY"], 0.6);
        assert_eq!(allocation.weights["AGG"], 0.4);
        assert!(allocation.signals.is_empty());
    }

    #[test]
    fn fixed_policy_drops_unknown_assets() {
        let end = d(2024, 6, 1);
        let market = market_with_assets(&["SPY"], end);
        let policy = FixedWeightPolicy::new(
            vec![("SPY".into(), 0.6), ("GHOST".into(), 0.4)],
            &market,
        )
        .unwrap();

        let allocation = policy.target_weights(&market, end).unwrap();
        assert_eq!(allocation.weights.len(), 1);
        assert!(!allocation.weights.contains_key("GHOST"));
    }

    #[test]
    fn fixed_policy_all_unknown_is_config_error() {
        let end = d(2024, 6, 1);
        let market = market_with_assets(&["SPY"], end);
        let result = FixedWeightPolicy::new(vec![("GHOST".into(), 1.0)], &market);
        assert!(matches!(
            result,
            Err(GlidepathError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn fixed_policy_rejects_negative_weight() {
        let end = d(2024, 6, 1);
        let market = market_with_assets(&["SPY"], end);
        let result = FixedWeightPolicy::new(vec![("SPY".into(), -0.1)], &market);
        assert!(matches!(
            result,
            Err(GlidepathError::ConfigInvalid { .. })
        ));
    }

    fn dynamic_market(end: NaiveDate, yield_level: f64) -> MarketData {
        let mut market = market_with_assets(&["SPY", "TLT", "SHV", "GLD"], end);
        market.add_signal(
            "SPY_CAPE",
            SignalKind::ValuationRatio,
            signal_with_percentile(0.5, end),
        );
        market.add_signal(
            "TLT_YIELD",
            SignalKind::Yield,
            signal_with_percentile(0.5, end),
        );
        market.add_signal(
            "TBILL_YIELD",
            SignalKind::Yield,
            Series::from_pairs(vec![(end, yield_level)]),
        );
        market
    }

    fn dynamic_policy(market: &MarketData, reserved: f64) -> DynamicPolicy {
        DynamicPolicy::new(
            vec![EquitySleeve {
                asset: "SPY".into(),
                base_allocation: 0.6,
                signal: "SPY_CAPE".into(),
            }],
            Some(BondSleeve {
                asset: "TLT".into(),
                base_allocation: 0.3,
                signal: "TLT_YIELD".into(),
            }),
            Some(CashSleeve {
                asset: "SHV".into(),
                signal: "TBILL_YIELD".into(),
            }),
            Some(HedgeSleeve {
                asset: "GLD".into(),
                base_allocation: 0.05,
            }),
            4.0,
            reserved,
            30.0,
            market,
        )
        .unwrap()
    }

    #[test]
    fn equity_and_bond_terms_follow_formulas() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 3.5);
        let policy = dynamic_policy(&market, 0.0);

        let (raw, signals) = policy.raw_weights(&market, end).unwrap();
        assert_relative_eq!(signals["SPY_CAPE"], 0.5, epsilon = 1e-9);
        assert_relative_eq!(signals["TLT_YIELD"], 0.5, epsilon = 1e-9);
        // equity: base * (1 - pct); bond: base * pct^2
        assert_relative_eq!(raw["SPY"], 0.6 * 0.5, epsilon = 1e-9);
        assert_relative_eq!(raw["TLT"], 0.3 * 0.25, epsilon = 1e-9);
        // hedge term ignores signals entirely
        assert_relative_eq!(raw["GLD"], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn dynamic_weights_sum_to_invested_fraction() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 4.5);
        let policy = dynamic_policy(&market, 0.05);

        let allocation = policy.target_weights(&market, end).unwrap();
        let sum: f64 = allocation.weights.values().sum();
        assert_relative_eq!(sum, 0.95, epsilon = 1e-9);
    }

    #[test]
    fn dynamic_no_reserve_sums_to_one() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 4.5);
        let policy = dynamic_policy(&market, 0.0);

        let allocation = policy.target_weights(&market, end).unwrap();
        let sum: f64 = allocation.weights.values().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn cash_sleeve_zero_below_threshold() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 3.5);
        let policy = dynamic_policy(&market, 0.0);

        let allocation = policy.target_weights(&market, end).unwrap();
        assert_eq!(allocation.weights["SHV"], 0.0);
        assert_eq!(allocation.signals["TBILL_YIELD"], 3.5);
    }

    #[test]
    fn cash_sleeve_raw_term_is_yield_over_hundred() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 4.5);
        let policy = dynamic_policy(&market, 0.0);

        let (raw, signals) = policy.raw_weights(&market, end).unwrap();
        assert_relative_eq!(raw["SHV"], 0.045, epsilon = 1e-12);
        assert_eq!(signals["TBILL_YIELD"], 4.5);
    }

    #[test]
    fn cash_sleeve_raw_term_zero_below_threshold() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 3.5);
        let policy = dynamic_policy(&market, 0.0);

        let (raw, _) = policy.raw_weights(&market, end).unwrap();
        assert_eq!(raw["SHV"], 0.0);
    }

    #[test]
    fn missing_signal_propagates_data_unavailable() {
        let end = d(2024, 6, 1);
        let mut market = market_with_assets(&["SPY"], end);
        // Price feed exists but the valuation series was never loaded.
        market.add_signal(
            "OTHER",
            SignalKind::ValuationRatio,
            signal_with_percentile(0.5, end),
        );

        let policy = DynamicPolicy::new(
            vec![EquitySleeve {
                asset: "SPY".into(),
                base_allocation: 0.6,
                signal: "SPY_CAPE".into(),
            }],
            None,
            None,
            None,
            4.0,
            0.0,
            30.0,
            &market,
        )
        .unwrap();

        let err = policy.target_weights(&market, end).unwrap_err();
        assert!(matches!(
            err,
            GlidepathError::DataUnavailable { ref series, .. } if series == "SPY_CAPE"
        ));
    }

    #[test]
    fn sleeves_without_feeds_are_dropped() {
        let end = d(2024, 6, 1);
        let market = dynamic_market(end, 4.5);

        let policy = DynamicPolicy::new(
            vec![
                EquitySleeve {
                    asset: "SPY".into(),
                    base_allocation: 0.6,
                    signal: "SPY_CAPE".into(),
                },
                EquitySleeve {
                    asset: "GHOST".into(),
                    base_allocation: 0.2,
                    signal: "GHOST_CAPE".into(),
                },
            ],
            None,
            None,
            None,
            4.0,
            0.0,
            30.0,
            &market,
        )
        .unwrap();

        assert_eq!(policy.assets(), vec!["SPY".to_string()]);
    }

    #[test]
    fn normalize_order_matters() {
        // The required order: compute all terms, then rescale once.
        let raw = BTreeMap::from([
            ("SPY".to_string(), 0.30),
            ("SHV".to_string(), 0.045),
            ("GLD".to_string(), 0.05),
        ]);
        let correct = normalize_to_invested(raw, 0.05);

        // The wrong order: rescale the equity term alone, then add the
        // cash/hedge terms afterwards.
        let mut wrong = normalize_to_invested(BTreeMap::from([("SPY".to_string(), 0.30)]), 0.05);
        wrong.insert("SHV".to_string(), 0.045);
        wrong.insert("GLD".to_string(), 0.05);

        let wrong_sum: f64 = wrong.values().sum();
        assert!((wrong_sum - 0.95).abs() > 1e-3, "orders must not be equivalent");
        assert!((correct["SPY"] - wrong["SPY"]).abs() > 1e-3);
        let correct_sum: f64 = correct.values().sum();
        assert_relative_eq!(correct_sum, 0.95, epsilon = 1e-9);
    }

    #[test]
    fn normalize_zero_sum_stays_uninvested() {
        let raw = BTreeMap::from([("SHV".to_string(), 0.0)]);
        let out = normalize_to_invested(raw, 0.0);
        assert_eq!(out["SHV"], 0.0);
    }

    #[test]
    fn equal_weights_splits_evenly() {
        let allocation = equal_weights(&["A".to_string(), "B".to_string()]);
        assert_eq!(allocation.weights["A"], 0.5);
        assert_eq!(allocation.weights["B"], 0.5);
    }

    #[test]
    fn degraded_wrapper_substitutes_on_data_unavailable() {
        let end = d(2024, 6, 1);
        let mut market = market_with_assets(&["SPY", "TLT"], end);
        // Valuation series present but empty: percentile fails.
        market.add_signal(
            "SPY_CAPE",
            SignalKind::ValuationRatio,
            Series::from_pairs(vec![]),
        );

        let inner = DynamicPolicy::new(
            vec![EquitySleeve {
                asset: "SPY".into(),
                base_allocation: 0.6,
                signal: "SPY_CAPE".into(),
            }],
            None,
            None,
            Some(HedgeSleeve {
                asset: "TLT".into(),
                base_allocation: 0.1,
            }),
            4.0,
            0.0,
            30.0,
            &market,
        )
        .unwrap();

        let wrapped = DegradedEqualWeights::new(inner);
        let allocation = wrapped.target_weights(&market, end).unwrap();
        assert_eq!(allocation.weights["SPY"], 0.5);
        assert_eq!(allocation.weights["TLT"], 0.5);
    }

    proptest! {
        #[test]
        fn normalized_sum_equals_invested_fraction(
            weights in proptest::collection::btree_map(
                "[A-Z]{1,4}",
                0.001f64..1.0,
                1..8,
            ),
            reserved in 0.0f64..0.5,
        ) {
            let out = normalize_to_invested(weights, reserved);
            let sum: f64 = out.values().sum();
            prop_assert!((sum - (1.0 - reserved)).abs() < 1e-9);
            prop_assert!(out.values().all(|w| *w >= 0.0));
        }
    }
}
