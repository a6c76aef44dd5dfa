//! Pipeline settings
//!
//! A static settings object with full defaults, optionally loaded from a
//! JSON file. The amount of history to train on scales with the selected
//! timeframe the same way for every symbol: five base years of hourly data,
//! multiplied by the timeframe-to-hour ratio, floored at 0.2 years.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Bar timeframe supported by the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Minutes per bar
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(name)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

/// Static pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Instrument symbol
    pub symbol: String,
    /// Bar timeframe for direction prediction
    pub timeframe: Timeframe,
    /// Years of hourly history the base timeframe trains on
    pub base_train_years: f64,
    /// Bars fetched when transforming live data
    pub entry_history_bars: usize,
    /// Significance level for the stationarity test
    pub adf_alpha: f64,
    /// Minimum observations before a column is tested for stationarity
    pub adf_min_obs: usize,
    /// Cumulative explained-variance fraction retained by the reducer
    pub pca_variance: f64,
    /// Walk-forward fold count
    pub n_splits: usize,
    /// Hyperparameter candidates per search
    pub n_iter: usize,
    /// Label horizon in bars
    pub horizon: usize,
    /// Seed for candidate sampling and row subsampling
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            base_train_years: 5.0,
            entry_history_bars: 50,
            adf_alpha: 0.05,
            adf_min_obs: 30,
            pca_variance: 0.8,
            n_splits: 5,
            n_iter: 50,
            horizon: 1,
            seed: 69,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; absent fields fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file {:?}", path.as_ref()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings file {:?}", path.as_ref()))
    }

    /// Years of history to fetch for the configured timeframe
    pub fn train_years(&self) -> f64 {
        let multiplier = self.timeframe.minutes() as f64 / Timeframe::H1.minutes() as f64;
        (self.base_train_years * multiplier).max(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_train_years_scales_with_timeframe() {
        let mut settings = Settings::default();
        assert!((settings.train_years() - 5.0).abs() < 1e-12);

        settings.timeframe = Timeframe::H4;
        assert!((settings.train_years() - 20.0).abs() < 1e-12);

        // Floor keeps at least a couple of months of minute data
        settings.timeframe = Timeframe::M1;
        assert!((settings.train_years() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_partial_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"symbol": "GBPUSD", "n_splits": 3}}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.symbol, "GBPUSD");
        assert_eq!(settings.n_splits, 3);
        assert_eq!(settings.timeframe, Timeframe::H1);
        assert_eq!(settings.n_iter, 50);
    }

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("h4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert!("H7".parse::<Timeframe>().is_err());
    }
}
