//! Configuration parsing and validation.
//!
//! Every config field is checked before a run starts, so a bad file fails
//! at the boundary instead of mid-simulation. Asset and signal identifiers
//! are normalized to uppercase here.

use chrono::NaiveDate;

use super::allocation::{BondSleeve, CashSleeve, EquitySleeve, HedgeSleeve};
use super::error::GlidepathError;
use crate::ports::config_port::ConfigPort;

fn invalid(key: &str, reason: impl Into<String>) -> GlidepathError {
    GlidepathError::ConfigInvalid {
        section: "strategy".to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse `ASSET:WEIGHT,ASSET:WEIGHT,...` into a fixed weight table.
pub fn parse_weight_table(input: &str) -> Result<Vec<(String, f64)>, GlidepathError> {
    let mut table = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid("weights", "empty entry in weight table"));
        }
        let (asset, weight) = token
            .split_once(':')
            .ok_or_else(|| invalid("weights", format!("expected ASSET:WEIGHT, got {token:?}")))?;
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|_| invalid("weights", format!("non-numeric weight in {token:?}")))?;
        table.push((asset.trim().to_uppercase(), weight));
    }
    Ok(table)
}

/// Parse `ASSET:BASE:SIGNAL,...` into equity sleeves.
pub fn parse_equity_sleeves(input: &str) -> Result<Vec<EquitySleeve>, GlidepathError> {
    let mut sleeves = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid("equity_sleeves", "empty sleeve entry"));
        }
        let parts: Vec<&str> = token.split(':').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(invalid(
                "equity_sleeves",
                format!("expected ASSET:BASE:SIGNAL, got {token:?}"),
            ));
        }
        let base_allocation: f64 = parts[1].parse().map_err(|_| {
            invalid("equity_sleeves", format!("non-numeric base in {token:?}"))
        })?;
        sleeves.push(EquitySleeve {
            asset: parts[0].to_uppercase(),
            base_allocation,
            signal: parts[2].to_uppercase(),
        });
    }
    Ok(sleeves)
}

/// Parse `ASSET:BASE:SIGNAL` into the bond sleeve.
pub fn parse_bond_sleeve(input: &str) -> Result<BondSleeve, GlidepathError> {
    let parts: Vec<&str> = input.trim().split(':').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(invalid(
            "bond_sleeve",
            format!("expected ASSET:BASE:SIGNAL, got {input:?}"),
        ));
    }
    let base_allocation: f64 = parts[1]
        .parse()
        .map_err(|_| invalid("bond_sleeve", format!("non-numeric base in {input:?}")))?;
    Ok(BondSleeve {
        asset: parts[0].to_uppercase(),
        base_allocation,
        signal: parts[2].to_uppercase(),
    })
}

/// Parse `ASSET:SIGNAL` into the cash sleeve.
pub fn parse_cash_sleeve(input: &str) -> Result<CashSleeve, GlidepathError> {
    let parts: Vec<&str> = input.trim().split(':').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(invalid(
            "cash_sleeve",
            format!("expected ASSET:SIGNAL, got {input:?}"),
        ));
    }
    Ok(CashSleeve {
        asset: parts[0].to_uppercase(),
        signal: parts[1].to_uppercase(),
    })
}

/// Parse `ASSET:BASE` into the hedge sleeve.
pub fn parse_hedge_sleeve(input: &str) -> Result<HedgeSleeve, GlidepathError> {
    let parts: Vec<&str> = input.trim().split(':').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(invalid(
            "hedge_sleeve",
            format!("expected ASSET:BASE, got {input:?}"),
        ));
    }
    let base_allocation: f64 = parts[1]
        .parse()
        .map_err(|_| invalid("hedge_sleeve", format!("non-numeric base in {input:?}")))?;
    Ok(HedgeSleeve {
        asset: parts[0].to_uppercase(),
        base_allocation,
    })
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    match config.get_str("backtest", "data_dir") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(GlidepathError::ConfigMissing {
                section: "backtest".into(),
                key: "data_dir".into(),
            });
        }
    }

    let initial_cash = config.get_f64("backtest", "initial_cash", 0.0);
    if initial_cash <= 0.0 {
        return Err(GlidepathError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_cash".into(),
            reason: "must be positive".into(),
        });
    }

    let commission = config.get_f64("backtest", "commission_pct", 0.0);
    if !(0.0..1.0).contains(&commission) {
        return Err(GlidepathError::ConfigInvalid {
            section: "backtest".into(),
            key: "commission_pct".into(),
            reason: "must be a fraction in [0, 1)".into(),
        });
    }

    let rebalance_days = config.get_i64("backtest", "rebalance_days", 21);
    if rebalance_days < 1 {
        return Err(GlidepathError::ConfigInvalid {
            section: "backtest".into(),
            key: "rebalance_days".into(),
            reason: "must be at least 1".into(),
        });
    }

    let drift = config.get_f64("backtest", "drift_threshold", 0.05);
    if drift < 0.0 {
        return Err(GlidepathError::ConfigInvalid {
            section: "backtest".into(),
            key: "drift_threshold".into(),
            reason: "must be non-negative".into(),
        });
    }

    let start = parse_optional_date(config, "start_date")?;
    let end = parse_optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(GlidepathError::ConfigInvalid {
                section: "backtest".into(),
                key: "start_date".into(),
                reason: "start_date must be before end_date".into(),
            });
        }
    }

    Ok(())
}

pub fn parse_optional_date(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveDate>, GlidepathError> {
    match config.get_str("backtest", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| GlidepathError::ConfigInvalid {
                section: "backtest".into(),
                key: key.into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            }),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), GlidepathError> {
    let mode = config
        .get_str("strategy", "mode")
        .ok_or_else(|| GlidepathError::ConfigMissing {
            section: "strategy".into(),
            key: "mode".into(),
        })?;

    match mode.trim() {
        "fixed" => {
            let weights =
                config
                    .get_str("strategy", "weights")
                    .ok_or_else(|| GlidepathError::ConfigMissing {
                        section: "strategy".into(),
                        key: "weights".into(),
                    })?;
            let table = parse_weight_table(&weights)?;
            let sum: f64 = table.iter().map(|(_, w)| w).sum();
            if table.iter().any(|(_, w)| *w < 0.0) {
                return Err(invalid("weights", "weights must be non-negative"));
            }
            if sum > 1.0 + 1e-6 {
                return Err(invalid("weights", format!("weights sum to {sum}, above 1")));
            }
        }
        "dynamic" => {
            let lookback = config.get_f64("strategy", "lookback_years", 30.0);
            if lookback <= 0.0 {
                return Err(invalid("lookback_years", "must be positive"));
            }
            let reserved = config.get_f64("strategy", "reserved_fraction", 0.0);
            if !(0.0..1.0).contains(&reserved) {
                return Err(invalid("reserved_fraction", "must be in [0, 1)"));
            }
            let threshold = config.get_f64("strategy", "cash_yield_threshold", 4.0);
            if threshold < 0.0 {
                return Err(invalid("cash_yield_threshold", "must be non-negative"));
            }

            let mut any_sleeve = false;
            if let Some(s) = config.get_str("strategy", "equity_sleeves") {
                any_sleeve |= !parse_equity_sleeves(&s)?.is_empty();
            }
            if let Some(s) = config.get_str("strategy", "bond_sleeve") {
                parse_bond_sleeve(&s)?;
                any_sleeve = true;
            }
            if let Some(s) = config.get_str("strategy", "cash_sleeve") {
                parse_cash_sleeve(&s)?;
                any_sleeve = true;
            }
            if let Some(s) = config.get_str("strategy", "hedge_sleeve") {
                parse_hedge_sleeve(&s)?;
                any_sleeve = true;
            }
            if !any_sleeve {
                return Err(invalid("mode", "dynamic mode requires at least one sleeve"));
            }
        }
        other => {
            return Err(invalid(
                "mode",
                format!("unknown mode {other:?} (expected fixed or dynamic)"),
            ));
        }
    }

    Ok(())
}
