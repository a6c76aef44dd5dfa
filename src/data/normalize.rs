//! Bar normalization
//!
//! Converts raw terminal rate records into canonical, time-ordered OHLCV
//! bars. Spread and real volume are discarded; tick volume becomes the
//! canonical volume. Pure function of its input.

use crate::data::types::{Bar, RawRate};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Normalize raw rate records into time-ordered bars.
///
/// Fails with [`PipelineError::EmptyInput`] for zero records. Records with
/// non-finite required fields or an unrepresentable timestamp are removed,
/// and duplicate timestamps keep their first record.
pub fn normalize_rates(rates: &[RawRate]) -> Result<Vec<Bar>> {
    if rates.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut bars: Vec<Bar> = rates
        .iter()
        .filter_map(|r| {
            let timestamp: DateTime<Utc> = DateTime::from_timestamp(r.time, 0)?;
            let bar = Bar {
                timestamp,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.tick_volume,
            };
            bar.is_well_formed().then_some(bar)
        })
        .collect();

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    if bars.len() < rates.len() {
        debug!(
            dropped = rates.len() - bars.len(),
            "removed malformed rate records during normalization"
        );
    }

    Ok(bars)
}
