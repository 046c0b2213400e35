//! Performance metrics over a completed equity curve.

use super::portfolio::EquityPoint;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Metrics bundle handed to downstream consumers once a run completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub final_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

impl PerformanceSummary {
    /// Pure function of the equity curve. Curves of length 0 or 1 produce
    /// neutral zero metrics rather than an error: there is nothing to
    /// annualize or draw down yet.
    pub fn compute(equity_curve: &[EquityPoint]) -> Self {
        let initial = equity_curve.first().map(|p| p.value).unwrap_or(0.0);
        let final_value = equity_curve.last().map(|p| p.value).unwrap_or(0.0);

        let total_return = if initial > 0.0 {
            final_value / initial - 1.0
        } else {
            0.0
        };

        // Annualize over the actual elapsed calendar span, not a bar count.
        let span_days = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days(),
            _ => 0,
        };
        let annualized_return = if span_days > 0 && initial > 0.0 && final_value > 0.0 {
            (final_value / initial).powf(365.25 / span_days as f64) - 1.0
        } else {
            total_return
        };

        PerformanceSummary {
            final_value,
            total_return,
            annualized_return,
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: sharpe_ratio(equity_curve),
        }
    }
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.value > peak {
            peak = point.value;
        } else if peak > 0.0 {
            let dd = (peak - point.value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Mean over volatility of daily returns, annualized by √252. Zero when
/// the curve is too short or volatility vanishes.
fn sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].value > 0.0)
        .map(|w| w[1].value / w[0].value - 1.0)
        .collect();
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        (mean / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
