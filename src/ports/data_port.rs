//! Market data access port trait.
//!
//! The engine consumes sparse (date, value) pairs; providers owe no gap
//! filling. How series are acquired (local files, a database, a remote
//! feed) is an adapter concern behind this trait.

use chrono::NaiveDate;

use crate::domain::error::GlidepathError;

pub trait MarketDataPort {
    /// Daily close series for one asset.
    fn fetch_prices(&self, asset: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError>;

    /// Valuation-ratio or yield series by signal name. Frequency may be
    /// daily or monthly; the engine does carry-forward lookups either way.
    fn fetch_signal(&self, name: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError>;

    /// Assets this provider can serve prices for.
    fn list_assets(&self) -> Result<Vec<String>, GlidepathError>;
}
