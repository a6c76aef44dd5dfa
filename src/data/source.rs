//! Market data source abstraction
//!
//! Brokerage connectivity is a collaborator, not part of the core: the
//! pipeline only needs something that yields raw rate records for a symbol
//! and timeframe. `CsvRateSource` is the offline implementation used by the
//! CLI and in tests; a live terminal adapter would implement the same trait.

use crate::config::Timeframe;
use crate::data::types::RawRate;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// Source of raw rate records for one instrument
pub trait MarketDataSource {
    /// Fetch all records in `[start, end)`; fails with
    /// [`PipelineError::DataUnavailable`] when the range yields nothing.
    fn fetch_historical(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRate>>;

    /// Fetch the most recent `count` records; fails with
    /// [`PipelineError::DataUnavailable`] when nothing is available.
    fn fetch_recent(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<RawRate>>;
}

/// Offline rate source backed by a CSV file of raw records
pub struct CsvRateSource {
    path: PathBuf,
}

impl CsvRateSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn load_all(&self) -> Result<Vec<RawRate>> {
        let mut rates = crate::data::loader::DataLoader::load_rates(&self.path)
            .map_err(|e| PipelineError::DataUnavailable(format!("{e:#}")))?;
        rates.sort_by_key(|r| r.time);
        Ok(rates)
    }
}

impl MarketDataSource for CsvRateSource {
    fn fetch_historical(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRate>> {
        info!(%symbol, %timeframe, %start, %end, "fetching historical rates");
        let rates: Vec<RawRate> = self
            .load_all()?
            .into_iter()
            .filter(|r| r.time >= start.timestamp() && r.time < end.timestamp())
            .collect();

        if rates.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "no {symbol} records between {start} and {end}"
            )));
        }
        Ok(rates)
    }

    fn fetch_recent(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<RawRate>> {
        info!(%symbol, %timeframe, count, "fetching recent rates");
        let rates = self.load_all()?;
        if rates.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "no {symbol} records in source"
            )));
        }
        let start = rates.len().saturating_sub(count);
        Ok(rates[start..].to_vec())
    }
}
