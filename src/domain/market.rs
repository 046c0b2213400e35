//! Run-scoped market data context.
//!
//! All series a backtest run may read are loaded once at setup into explicit
//! maps keyed by asset or signal name, then treated as read-only for the
//! run's duration. Nothing here is cached at module level; a fresh
//! [`MarketData`] is built per run.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::error::GlidepathError;
use super::series::{Series, SignalKind};

#[derive(Debug, Clone)]
pub struct MarketData {
    prices: BTreeMap<String, Series>,
    signals: BTreeMap<String, (SignalKind, Series)>,
}

impl MarketData {
    pub fn new() -> Self {
        MarketData {
            prices: BTreeMap::new(),
            signals: BTreeMap::new(),
        }
    }

    pub fn add_prices(&mut self, asset: &str, series: Series) {
        self.prices.insert(asset.to_string(), series);
    }

    pub fn add_signal(&mut self, name: &str, kind: SignalKind, series: Series) {
        self.signals.insert(name.to_string(), (kind, series));
    }

    pub fn assets(&self) -> Vec<&str> {
        self.prices.keys().map(String::as_str).collect()
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.prices.contains_key(asset)
    }

    pub fn price_series(&self, asset: &str) -> Option<&Series> {
        self.prices.get(asset)
    }

    pub fn signal_series(&self, name: &str) -> Result<(&SignalKind, &Series), GlidepathError> {
        self.signals
            .get(name)
            .map(|(kind, series)| (kind, series))
            .ok_or_else(|| GlidepathError::data_unavailable(name, "signal series not loaded"))
    }

    /// Close price at or before `date` for `asset` (carry-forward for absent
    /// bars). `None` when the asset has no bar at or before `date`.
    pub fn close_at(&self, asset: &str, date: NaiveDate) -> Option<f64> {
        self.prices
            .get(asset)?
            .latest_at(date)
            .map(|o| o.value)
    }

    /// Union of all price bar dates across feeds, sorted ascending. This is
    /// the calendar the simulator walks.
    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .prices
            .values()
            .flat_map(|s| s.observations().iter().map(|o| o.date))
            .collect();
        dates.into_iter().collect()
    }
}

impl Default for MarketData {
    fn default() -> Self {
        Self::new()
    }
}
