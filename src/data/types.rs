//! Core market data types
//!
//! Raw terminal records and the canonical OHLCV bar used by the rest of
//! the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw rate record as delivered by the terminal history API.
///
/// Fixed-width numeric tuple; `spread` and `real_volume` are dropped during
/// normalization, `tick_volume` becomes the canonical volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRate {
    /// Bar open time, seconds since the Unix epoch
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: f64,
    pub spread: f64,
    pub real_volume: f64,
}

/// Canonical OHLCV bar for one timeframe interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Tick volume
    pub volume: f64,
}

impl Bar {
    /// True when every field is finite and prices are positive
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_well_formed_bar() {
        let bar = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            open: 1.10,
            high: 1.11,
            low: 1.09,
            close: 1.105,
            volume: 250.0,
        };
        assert!(bar.is_well_formed());
    }

    #[test]
    fn test_malformed_bar_rejected() {
        let nan_high = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            open: 1.10,
            high: f64::NAN,
            low: 1.09,
            close: 1.105,
            volume: 250.0,
        };
        assert!(!nan_high.is_well_formed());

        let negative_open = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            open: -1.0,
            high: 1.11,
            low: 1.09,
            close: 1.105,
            volume: 250.0,
        };
        assert!(!negative_open.is_well_formed());
    }
}
