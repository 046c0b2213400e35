//! Signal percentile calculation.
//!
//! A percentile rank answers "how does today's reading compare to its own
//! history": the fraction of observations inside the lookback window that
//! are at or below the most recent observation. The result is clamped to
//! [0.10, 0.90] by contract, a damping bound that keeps any single signal
//! from pushing an allocation to an extreme.

use chrono::{Duration, NaiveDate};
use log::info;

use super::error::GlidepathError;
use super::series::{Observation, Series, SignalKind};

/// Lower clamp bound on every computed percentile.
pub const PERCENTILE_FLOOR: f64 = 0.10;
/// Upper clamp bound on every computed percentile.
pub const PERCENTILE_CEILING: f64 = 0.90;

/// Valuation ratios at or above this are treated as data errors and
/// excluded before ranking.
const RATIO_OUTLIER_CUTOFF: f64 = 200.0;

fn plausible(value: f64, kind: SignalKind) -> bool {
    if value <= 0.0 {
        return false;
    }
    match kind {
        SignalKind::ValuationRatio => value < RATIO_OUTLIER_CUTOFF,
        SignalKind::Yield => true,
    }
}

/// Percentile rank of `series`' latest reading at `reference_date` within
/// a `lookback_years` window ending there.
///
/// Fails with `DataUnavailable` when the series is empty, when no plausible
/// observation exists at or before `reference_date`, or when the lookback
/// window holds no plausible observations. Pure apart from an informational
/// log line callers must not depend on.
pub fn signal_percentile(
    name: &str,
    series: &Series,
    kind: SignalKind,
    reference_date: NaiveDate,
    lookback_years: f64,
) -> Result<f64, GlidepathError> {
    if series.is_empty() {
        return Err(GlidepathError::data_unavailable(name, "series is empty"));
    }

    let current = series
        .observations()
        .iter()
        .rev()
        .filter(|o| o.date <= reference_date)
        .find(|o| plausible(o.value, kind))
        .copied()
        .ok_or_else(|| {
            GlidepathError::data_unavailable(
                name,
                format!("no observation at or before {reference_date}"),
            )
        })?;

    let window_start = reference_date - Duration::days((lookback_years * 365.25) as i64);
    let window: Vec<&Observation> = series
        .window(window_start, reference_date)
        .iter()
        .filter(|o| plausible(o.value, kind))
        .collect();

    if window.is_empty() {
        return Err(GlidepathError::data_unavailable(
            name,
            format!("no observations in the {lookback_years}y window ending {reference_date}"),
        ));
    }

    let at_or_below = window.iter().filter(|o| o.value <= current.value).count();
    let raw = at_or_below as f64 / window.len() as f64;
    let percentile = raw.clamp(PERCENTILE_FLOOR, PERCENTILE_CEILING);

    info!(
        "{name}: percentile {percentile:.3} (raw {raw:.3}, value {:.2} as of {})",
        current.value, current.date
    );

    Ok(percentile)
}
