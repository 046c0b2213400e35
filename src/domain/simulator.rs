//! The day-stepped rebalancing backtest loop.
//!
//! Strictly sequential: each trading day is marked, then (when a decision
//! point is due) a target allocation is computed, drift-checked, and traded
//! at that day's close. Position and cash state carry forward, so days are
//! never processed out of order.

use chrono::NaiveDate;
use log::error;

use super::allocation::AllocationPolicy;
use super::drift::needs_rebalance;
use super::error::GlidepathError;
use super::market::MarketData;
use super::portfolio::{EquityPoint, PortfolioState, RebalanceEvent};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Clip the trading calendar to this range when set.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_cash: f64,
    /// Proportional commission on traded notional (0.001 = 10 bps).
    pub commission_pct: f64,
    /// Minimum number of simulated trading days between rebalance decision
    /// points. Not a fixed calendar: a decision that declines to trade does
    /// not restart the interval.
    pub rebalance_days: usize,
    /// Per-asset drift that must be exceeded before a due decision trades.
    pub drift_threshold: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            start_date: None,
            end_date: None,
            initial_cash: 1_000_000.0,
            commission_pct: 0.0,
            rebalance_days: 21,
            drift_threshold: 0.05,
        }
    }
}

/// Artifacts of one completed run. The equity curve and rebalance log are
/// the surviving outputs; the final portfolio state is kept only so
/// callers can inspect the end-of-run book before discarding it.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub rebalance_events: Vec<RebalanceEvent>,
    pub final_portfolio: PortfolioState,
}

/// Run one backtest to completion.
///
/// Refuses to start when no price feeds are loaded. Signal or price gaps
/// hit during a rebalance decision abort the run with the offending series
/// named; a non-positive close for one asset skips only that asset's order.
pub fn run_backtest(
    market: &MarketData,
    policy: &dyn AllocationPolicy,
    config: &SimulatorConfig,
) -> Result<BacktestResult, GlidepathError> {
    if market.assets().is_empty() {
        return Err(GlidepathError::NoFeeds);
    }

    let timeline: Vec<NaiveDate> = market
        .trading_days()
        .into_iter()
        .filter(|d| config.start_date.is_none_or(|s| *d >= s))
        .filter(|d| config.end_date.is_none_or(|e| *d <= e))
        .collect();

    let mut portfolio = PortfolioState::new(config.initial_cash);
    let mut equity_curve = Vec::with_capacity(timeline.len());
    let mut rebalance_events = Vec::new();
    let mut last_rebalance: Option<usize> = None;

    for (i, &day) in timeline.iter().enumerate() {
        // Mark first: exactly one equity point per simulated day.
        let total_value = portfolio.total_value(market, day);
        equity_curve.push(EquityPoint {
            date: day,
            value: total_value,
        });

        let due = match last_rebalance {
            None => true,
            Some(last) => i - last >= config.rebalance_days,
        };
        if !due {
            continue;
        }

        let allocation = policy.target_weights(market, day)?;
        let current = portfolio.current_weights(market, day);

        // Bootstrap rule: the first day trades regardless of drift.
        let first_day = last_rebalance.is_none();
        if !first_day
            && !needs_rebalance(&allocation.weights, &current, config.drift_threshold)
        {
            continue;
        }

        for (asset, weight) in &allocation.weights {
            let price = match market.close_at(asset, day) {
                Some(p) if p > 0.0 => p,
                Some(p) => {
                    error!("skipping {asset} order on {day}: non-positive price {p}");
                    continue;
                }
                None => {
                    return Err(GlidepathError::data_unavailable(
                        asset,
                        format!("no price at or before rebalance day {day}"),
                    ));
                }
            };

            let desired_value = weight * total_value;
            let traded_notional = desired_value - portfolio.quantity(asset) * price;
            if traded_notional.abs() < 1e-9 {
                continue;
            }
            let commission = traded_notional.abs() * config.commission_pct;
            portfolio.cash -= traded_notional + commission;
            portfolio.set_quantity(asset, desired_value / price);
        }

        rebalance_events.push(RebalanceEvent {
            date: day,
            total_value,
            target_weights: allocation.weights,
            signals: allocation.signals,
        });
        last_rebalance = Some(i);
    }

    Ok(BacktestResult {
        equity_curve,
        rebalance_events,
        final_portfolio: portfolio,
    })
}
