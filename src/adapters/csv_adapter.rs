//! CSV file market data adapter.
//!
//! Serves series from a directory laid out as
//! `<base>/prices/<ASSET>.csv` (header `date,close`) and
//! `<base>/signals/<NAME>.csv` (header `date,value`), dates formatted
//! `YYYY-MM-DD`. Rows are returned unsorted and sparse; the domain sorts.

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::GlidepathError;
use crate::ports::data_port::MarketDataPort;

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn read_pairs(&self, path: PathBuf) -> Result<Vec<(NaiveDate, f64)>, GlidepathError> {
        let content = fs::read_to_string(&path).map_err(|e| GlidepathError::Feed {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut pairs = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| GlidepathError::Feed {
                reason: format!("CSV parse error in {}: {e}", path.display()),
            })?;

            let date_str = record.get(0).ok_or_else(|| GlidepathError::Feed {
                reason: format!("missing date column in {}", path.display()),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                GlidepathError::Feed {
                    reason: format!("invalid date {date_str:?} in {}: {e}", path.display()),
                }
            })?;

            let value: f64 = record
                .get(1)
                .ok_or_else(|| GlidepathError::Feed {
                    reason: format!("missing value column in {}", path.display()),
                })?
                .parse()
                .map_err(|e| GlidepathError::Feed {
                    reason: format!("invalid value in {}: {e}", path.display()),
                })?;

            pairs.push((date, value));
        }

        Ok(pairs)
    }
}

impl MarketDataPort for CsvMarketData {
    fn fetch_prices(&self, asset: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError> {
        self.read_pairs(self.base_path.join("prices").join(format!("{asset}.csv")))
    }

    fn fetch_signal(&self, name: &str) -> Result<Vec<(NaiveDate, f64)>, GlidepathError> {
        self.read_pairs(self.base_path.join("signals").join(format!("{name}.csv")))
    }

    fn list_assets(&self) -> Result<Vec<String>, GlidepathError> {
        let dir = self.base_path.join("prices");
        let entries = fs::read_dir(&dir).map_err(|e| GlidepathError::Feed {
            reason: format!("failed to read directory {}: {e}", dir.display()),
        })?;

        let mut assets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GlidepathError::Feed {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(asset) = name_str.strip_suffix(".csv") {
                assets.push(asset.to_string());
            }
        }

        assets.sort();
        Ok(assets)
    }
}
