//! Portfolio state, equity curve, and the rebalance event log.
//!
//! `PortfolioState` is mutated only by the simulator, lives for one run,
//! and is discarded once the analyzer has extracted its metrics. The
//! equity curve and rebalance log are the artifacts that survive the run.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::market::MarketData;

/// One mark of total portfolio value.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Immutable record of one executed rebalance: the inputs the decision
/// used, captured at decision time. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceEvent {
    pub date: NaiveDate,
    pub total_value: f64,
    pub target_weights: BTreeMap<String, f64>,
    pub signals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub initial_cash: f64,
    /// Asset → held quantity. Fractional quantities; entries are removed
    /// when a position closes to zero.
    pub holdings: BTreeMap<String, f64>,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        PortfolioState {
            cash: initial_cash,
            initial_cash,
            holdings: BTreeMap::new(),
        }
    }

    pub fn quantity(&self, asset: &str) -> f64 {
        self.holdings.get(asset).copied().unwrap_or(0.0)
    }

    pub fn set_quantity(&mut self, asset: &str, quantity: f64) {
        if quantity.abs() < 1e-12 {
            self.holdings.remove(asset);
        } else {
            self.holdings.insert(asset.to_string(), quantity);
        }
    }

    /// Cash plus mark-to-market value of every held asset at `date`,
    /// carry-forward pricing for absent bars.
    pub fn total_value(&self, market: &MarketData, date: NaiveDate) -> f64 {
        let positions: f64 = self
            .holdings
            .iter()
            .filter_map(|(asset, qty)| market.close_at(asset, date).map(|price| qty * price))
            .sum();
        self.cash + positions
    }

    /// Value-weighted current weights at `date`. Empty when total value is
    /// non-positive.
    pub fn current_weights(
        &self,
        market: &MarketData,
        date: NaiveDate,
    ) -> BTreeMap<String, f64> {
        let total = self.total_value(market, date);
        if total <= 0.0 {
            return BTreeMap::new();
        }
        self.holdings
            .iter()
            .filter_map(|(asset, qty)| {
                market
                    .close_at(asset, date)
                    .map(|price| (asset.clone(), qty * price / total))
            })
            .collect()
    }
}
