//! Time-indexed series primitives.
//!
//! Both price and signal series are sparse date/value sequences: missing
//! dates are simply absent observations, never pre-filled. A [`Series`] is
//! sorted by date once at construction and read-only afterwards.

use chrono::NaiveDate;

/// One (date, value) observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// What a signal series measures. Drives outlier filtering in the
/// percentile calculator: valuation ratios above 200 are treated as data
/// errors, yield levels are not bounded that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    ValuationRatio,
    Yield,
}

/// A sorted, read-only sequence of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    /// Build a series from unordered (date, value) pairs. Duplicate dates
    /// keep the last value given.
    pub fn from_pairs(pairs: Vec<(NaiveDate, f64)>) -> Self {
        let mut observations: Vec<Observation> = pairs
            .into_iter()
            .map(|(date, value)| Observation { date, value })
            .collect();
        observations.sort_by_key(|o| o.date);
        observations.dedup_by(|b, a| {
            if a.date == b.date {
                a.value = b.value;
                true
            } else {
                false
            }
        });
        Series { observations }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Most recent observation at or before `date` (carry-forward lookup).
    pub fn latest_at(&self, date: NaiveDate) -> Option<Observation> {
        let idx = self.observations.partition_point(|o| o.date <= date);
        if idx == 0 {
            None
        } else {
            Some(self.observations[idx - 1])
        }
    }

    /// All observations with `start <= date <= end`, in date order.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> &[Observation] {
        let lo = self.observations.partition_point(|o| o.date < start);
        let hi = self.observations.partition_point(|o| o.date <= end);
        &self.observations[lo..hi]
    }
}
