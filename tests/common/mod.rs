#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use glidepath::domain::error::GlidepathError;
use glidepath::domain::market::MarketData;
use glidepath::domain::series::{Series, SignalKind};
use glidepath::domain::simulator::SimulatorConfig;
use glidepath::ports::data_port::MarketDataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub prices: HashMap<String, Vec<(NaiveDate, f64)>>,
    pub signals: HashMap<String, Vec<(NaiveDate, f64)>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            signals: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, asset: &str, pairs: Vec<(NaiveDate, f64)>) -> Self {
        self.prices.insert(asset.to_string(), pairs);
        self
    }

    pub fn with_signal(mut self, name: &str, pairs: Vec<(NaiveDate, f64)>) -> Self {
        self.signals.insert(name.to_string(), pairs);
        self
    }

    pub fn with_error(mut self, key: &str, reason: &str) -> Self {
        self.errors.insert(key.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_prices(&self, asset: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(GlidepathError::Feed {
                reason: reason.clone(),
            });
        }
        self.prices
            .get(asset)
            .cloned()
            .ok_or_else(|| GlidepathError::Feed {
                reason: format!("no prices for {asset}"),
            })
    }

    fn fetch_signal(&self, name: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError> {
        if let Some(reason) = self.errors.get(name) {
            return Err(GlidepathError::Feed {
                reason: reason.clone(),
            });
        }
        self.signals
            .get(name)
            .cloned()
            .ok_or_else(|| GlidepathError::Feed {
                reason: format!("no signal {name}"),
            })
    }

    fn list_assets(&self) -> Result<Vec<String>, GlidepathError> {
        let mut assets: Vec<String> = self.prices.keys().cloned().collect();
        assets.sort();
        Ok(assets)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` consecutive daily closes at a constant price.
pub fn flat_prices(price: f64, start: NaiveDate, count: usize) -> Vec<(NaiveDate, f64)> {
    (0..count)
        .map(|i| (start + Duration::days(i as i64), price))
        .collect()
}

/// `count` consecutive daily closes drifting by `step` per day.
pub fn trending_prices(
    start_price: f64,
    step: f64,
    start: NaiveDate,
    count: usize,
) -> Vec<(NaiveDate, f64)> {
    (0..count)
        .map(|i| (start + Duration::days(i as i64), start_price + step * i as f64))
        .collect()
}

/// Monthly signal observations ending at `end`, oldest first.
pub fn monthly_signal(values: &[f64], end: NaiveDate) -> Vec<(NaiveDate, f64)> {
    values
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &v)| (end - Duration::days(30 * i as i64), v))
        .collect()
}

pub fn market_from_port(
    port: &dyn MarketDataPort,
    assets: &[&str],
    signals: &[(&str, SignalKind)],
) -> MarketData {
    let mut market = MarketData::new();
    for asset in assets {
        if let Ok(pairs) = port.fetch_prices(asset) {
            market.add_prices(asset, Series::from_pairs(pairs));
        }
    }
    for (name, kind) in signals {
        if let Ok(pairs) = port.fetch_signal(name) {
            market.add_signal(name, *kind, Series::from_pairs(pairs));
        }
    }
    market
}

pub fn daily_config() -> SimulatorConfig {
    SimulatorConfig {
        start_date: None,
        end_date: None,
        initial_cash: 1_000_000.0,
        commission_pct: 0.0,
        rebalance_days: 1,
        drift_threshold: 0.05,
    }
}
