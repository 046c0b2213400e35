//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::warn;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::{
    AllocationPolicy, DegradedEqualWeights, DynamicPolicy, FixedWeightPolicy,
};
use crate::domain::config_validation::{
    parse_bond_sleeve, parse_cash_sleeve, parse_equity_sleeves, parse_hedge_sleeve,
    parse_optional_date, parse_weight_table, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::GlidepathError;
use crate::domain::market::MarketData;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::series::{Series, SignalKind};
use crate::domain::simulator::{run_backtest, SimulatorConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "glidepath", about = "Portfolio allocation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for loaded price and signal feeds
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, dry_run } => {
            if dry_run {
                run_validate(&config)
            } else {
                run_backtest_command(&config)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = GlidepathError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// The asset and signal identifiers a strategy needs, resolved from config.
pub struct StrategySpec {
    pub mode: String,
    pub assets: Vec<String>,
    /// signal name → kind, implied by the sleeve that uses it.
    pub signals: Vec<(String, SignalKind)>,
}

pub fn resolve_strategy_spec(config: &dyn ConfigPort) -> Result<StrategySpec, GlidepathError> {
    let mode = config.get_str("strategy", "mode").unwrap_or_default();
    let mut assets = Vec::new();
    let mut signals = Vec::new();

    match mode.trim() {
        "fixed" => {
            let table = parse_weight_table(&config.get_str("strategy", "weights").unwrap_or_default())?;
            assets.extend(table.into_iter().map(|(asset, _)| asset));
        }
        _ => {
            if let Some(s) = config.get_str("strategy", "equity_sleeves") {
                for sleeve in parse_equity_sleeves(&s)? {
                    assets.push(sleeve.asset);
                    signals.push((sleeve.signal, SignalKind::ValuationRatio));
                }
            }
            if let Some(s) = config.get_str("strategy", "bond_sleeve") {
                let sleeve = parse_bond_sleeve(&s)?;
                assets.push(sleeve.asset);
                signals.push((sleeve.signal, SignalKind::Yield));
            }
            if let Some(s) = config.get_str("strategy", "cash_sleeve") {
                let sleeve = parse_cash_sleeve(&s)?;
                assets.push(sleeve.asset);
                signals.push((sleeve.signal, SignalKind::Yield));
            }
            if let Some(s) = config.get_str("strategy", "hedge_sleeve") {
                assets.push(parse_hedge_sleeve(&s)?.asset);
            }
        }
    }

    Ok(StrategySpec {
        mode: mode.trim().to_string(),
        assets,
        signals,
    })
}

/// Load every series the strategy needs into a run-scoped context.
///
/// A price feed that fails to load drops its asset with a warning; the
/// policy constructor drops the matching sleeve the same way. A signal
/// feed that fails to load is skipped here so the allocator can fail
/// loudly, naming the series, at the first rebalance decision.
pub fn load_market_data(
    port: &dyn MarketDataPort,
    spec: &StrategySpec,
) -> Result<MarketData, GlidepathError> {
    let mut market = MarketData::new();

    for asset in &spec.assets {
        match port.fetch_prices(asset) {
            Ok(pairs) if !pairs.is_empty() => {
                market.add_prices(asset, Series::from_pairs(pairs));
            }
            Ok(_) => warn!("price feed for {asset} is empty, dropping asset"),
            Err(e) => warn!("failed to load price feed for {asset}: {e}"),
        }
    }

    for (name, kind) in &spec.signals {
        match port.fetch_signal(name) {
            Ok(pairs) => market.add_signal(name, *kind, Series::from_pairs(pairs)),
            Err(e) => warn!("failed to load signal {name}: {e}"),
        }
    }

    if market.assets().is_empty() {
        return Err(GlidepathError::NoFeeds);
    }
    Ok(market)
}

pub fn build_policy(
    config: &dyn ConfigPort,
    spec: &StrategySpec,
    market: &MarketData,
) -> Result<Box<dyn AllocationPolicy>, GlidepathError> {
    let degraded = config.get_bool("strategy", "degraded_equal_weights", false);

    match spec.mode.as_str() {
        "fixed" => {
            let table =
                parse_weight_table(&config.get_str("strategy", "weights").unwrap_or_default())?;
            let policy = FixedWeightPolicy::new(table, market)?;
            if degraded {
                Ok(Box::new(DegradedEqualWeights::new(policy)))
            } else {
                Ok(Box::new(policy))
            }
        }
        _ => {
            let equities = match config.get_str("strategy", "equity_sleeves") {
                Some(s) => parse_equity_sleeves(&s)?,
                None => Vec::new(),
            };
            let bond = config
                .get_str("strategy", "bond_sleeve")
                .map(|s| parse_bond_sleeve(&s))
                .transpose()?;
            let cash = config
                .get_str("strategy", "cash_sleeve")
                .map(|s| parse_cash_sleeve(&s))
                .transpose()?;
            let hedge = config
                .get_str("strategy", "hedge_sleeve")
                .map(|s| parse_hedge_sleeve(&s))
                .transpose()?;

            let policy = DynamicPolicy::new(
                equities,
                bond,
                cash,
                hedge,
                config.get_f64("strategy", "cash_yield_threshold", 4.0),
                config.get_f64("strategy", "reserved_fraction", 0.0),
                config.get_f64("strategy", "lookback_years", 30.0),
                market,
            )?;
            if degraded {
                Ok(Box::new(DegradedEqualWeights::new(policy)))
            } else {
                Ok(Box::new(policy))
            }
        }
    }
}

pub fn build_simulator_config(config: &dyn ConfigPort) -> Result<SimulatorConfig, GlidepathError> {
    Ok(SimulatorConfig {
        start_date: parse_optional_date(config, "start_date")?,
        end_date: parse_optional_date(config, "end_date")?,
        initial_cash: config.get_f64("backtest", "initial_cash", 1_000_000.0),
        commission_pct: config.get_f64("backtest", "commission_pct", 0.0),
        rebalance_days: config.get_i64("backtest", "rebalance_days", 21) as usize,
        drift_threshold: config.get_f64("backtest", "drift_threshold", 0.05),
    })
}

fn run_backtest_command(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let result = (|| {
        let spec = resolve_strategy_spec(&adapter)?;
        let data_dir = adapter.get_str("backtest", "data_dir").unwrap_or_default();
        let port = CsvMarketData::new(PathBuf::from(data_dir));
        let market = load_market_data(&port, &spec)?;
        let policy = build_policy(&adapter, &spec, &market)?;
        let sim_config = build_simulator_config(&adapter)?;

        eprintln!(
            "Running backtest: {} policy, {} assets, {} trading days",
            policy.name(),
            market.assets().len(),
            market.trading_days().len(),
        );
        run_backtest(&market, policy.as_ref(), &sim_config)
    })();

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let summary = PerformanceSummary::compute(&result.equity_curve);

    eprintln!("\n=== Results ===");
    eprintln!("Final Value:      {:.2}", summary.final_value);
    eprintln!("Total Return:     {:.2}%", summary.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", summary.annualized_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", summary.sharpe_ratio);
    eprintln!("Rebalances:       {}", result.rebalance_events.len());

    // The rebalance log goes to stdout, one row per event, for downstream
    // tabular consumers.
    for event in &result.rebalance_events {
        let weights: Vec<String> = event
            .target_weights
            .iter()
            .map(|(asset, w)| format!("{asset}:{w:.4}"))
            .collect();
        println!("{}\t{:.2}\t{}", event.date, event.total_value, weights.join(","));
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let spec = match resolve_strategy_spec(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nStrategy: {} mode", spec.mode);
    eprintln!("  assets:  {}", spec.assets.join(", "));
    if !spec.signals.is_empty() {
        let names: Vec<&str> = spec.signals.iter().map(|(n, _)| n.as_str()).collect();
        eprintln!("  signals: {}", names.join(", "));
    }
    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let data_dir = match adapter.get_str("backtest", "data_dir") {
        Some(d) if !d.trim().is_empty() => d,
        _ => {
            eprintln!("error: data_dir is required");
            return ExitCode::from(2);
        }
    };

    let port = CsvMarketData::new(PathBuf::from(data_dir));
    let assets = match port.list_assets() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for asset in &assets {
        match port.fetch_prices(asset) {
            Ok(pairs) if !pairs.is_empty() => {
                let min = pairs.iter().map(|(d, _)| *d).min().unwrap();
                let max = pairs.iter().map(|(d, _)| *d).max().unwrap();
                println!("{asset}: {} bars, {min} to {max}", pairs.len());
            }
            Ok(_) => eprintln!("{asset}: no data"),
            Err(e) => eprintln!("error reading {asset}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
