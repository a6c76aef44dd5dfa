//! Trained artifact bundle
//!
//! Everything inference needs travels together: the feature column order,
//! the frozen stationarity decisions, the reducer state and the fitted
//! classifier. Loading the bundle reproduces training-time transforms
//! exactly, so live windows go through the same pipeline as the training
//! window did.

use crate::config::{Settings, Timeframe};
use crate::data::frame::Frame;
use crate::data::types::Bar;
use crate::error::Result;
use crate::features::engineering::{add_all_features, feature_columns};
use crate::features::labeling::{make_label, split_xy};
use crate::model::gbm::{GbmClassifier, GbmParams};
use crate::preprocess::reduce::{Reducer, ReducerState};
use crate::preprocess::stationarity::{FittedStationarity, StationarityFilter};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Fitted pipeline state for one symbol and timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifacts {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub feature_columns: Vec<String>,
    pub stationarity: FittedStationarity,
    pub reducer: ReducerState,
    pub params: GbmParams,
    pub model: GbmClassifier,
}

impl TrainedArtifacts {
    /// Fit the whole pipeline on all available bars with the given
    /// hyperparameters, typically the winner of a search
    pub fn train(settings: &Settings, bars: &[Bar], params: &GbmParams) -> Result<Self> {
        let features = add_all_features(bars)?;
        let labeled = make_label(&features, settings.horizon)?;
        let (x, y) = split_xy(&labeled)?;

        let filter = StationarityFilter::new(settings.adf_alpha, settings.adf_min_obs);
        let stationarity = filter.fit(&x)?;
        let x = stationarity.transform(&x)?;

        let mut reducer = Reducer::new(settings.pca_variance);
        let x = reducer.fit_transform(&x)?;
        let y_aligned = y.align_to(x.index())?;

        let positives = y_aligned.iter().filter(|&&v| v == 1.0).count();
        let negatives = y_aligned.len() - positives;
        let full_params = GbmParams {
            scale_pos_weight: if positives > 0 {
                negatives as f64 / positives as f64
            } else {
                1.0
            },
            ..params.clone()
        };

        let rows: Vec<Vec<f64>> = x.rows().to_vec();
        let mut model = GbmClassifier::new(full_params.clone());
        model.fit(&rows, &y_aligned, None)?;

        info!(
            symbol = %settings.symbol,
            train_rows = rows.len(),
            n_components = x.n_cols(),
            "trained full model"
        );

        let reducer_state = reducer
            .state()
            .cloned()
            .ok_or(crate::error::PipelineError::NotFitted("Reducer"))?;
        Ok(Self {
            symbol: settings.symbol.clone(),
            timeframe: settings.timeframe,
            feature_columns: feature_columns(),
            stationarity,
            reducer: reducer_state,
            params: full_params,
            model,
        })
    }

    /// Up-probability per usable bar of a fresh window
    pub fn predict(&self, bars: &[Bar]) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let features = add_all_features(bars)?;
        let features = features.select(&self.feature_columns)?;
        let transformed = self.stationarity.transform(&features)?;
        let reduced = Reducer::from_state(self.reducer.clone()).transform(&transformed)?;

        let probs = self.model.predict_proba(reduced.rows());
        Ok(reduced.index().iter().copied().zip(probs).collect())
    }

    /// Reduced feature table for a fresh window, for inspection
    pub fn transform_only(&self, bars: &[Bar]) -> Result<Frame> {
        let features = add_all_features(bars)?.select(&self.feature_columns)?;
        let transformed = self.stationarity.transform(&features)?;
        Reducer::from_state(self.reducer.clone()).transform(&transformed)
    }

    /// Persist the bundle as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write artifact {:?}", path.as_ref()))
    }

    /// Load a bundle written by [`TrainedArtifacts::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read artifact {:?}", path.as_ref()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse artifact {:?}", path.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn hourly_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 1.10 + (i as f64 * 0.45).sin() * 0.01 + i as f64 * 0.0002;
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: base,
                    high: base + 0.004,
                    low: base - 0.004,
                    close: base + 0.001 * (i as f64 * 0.9).cos(),
                    volume: 150.0 + (i as f64 * 0.7).sin().abs() * 80.0,
                }
            })
            .collect()
    }

    fn quick_params() -> GbmParams {
        GbmParams {
            n_rounds: 8,
            min_samples_leaf: 2,
            ..GbmParams::default()
        }
    }

    #[test]
    fn test_train_predict_probabilities_are_valid() {
        let bars = hourly_bars(160);
        let artifacts =
            TrainedArtifacts::train(&Settings::default(), &bars, &quick_params()).unwrap();

        let predictions = artifacts.predict(&bars[100..]).unwrap();
        assert!(!predictions.is_empty());
        for (_, p) in &predictions {
            assert!(*p >= 0.0 && *p <= 1.0);
        }
    }

    #[test]
    fn test_reload_reproduces_predictions() {
        let bars = hourly_bars(160);
        let artifacts =
            TrainedArtifacts::train(&Settings::default(), &bars, &quick_params()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        artifacts.save(&path).unwrap();
        let reloaded = TrainedArtifacts::load(&path).unwrap();

        let window = &bars[80..];
        assert_eq!(reloaded.predict(window).unwrap(), artifacts.predict(window).unwrap());
    }

    #[test]
    fn test_artifact_keeps_column_contract() {
        let bars = hourly_bars(160);
        let artifacts =
            TrainedArtifacts::train(&Settings::default(), &bars, &quick_params()).unwrap();

        assert_eq!(artifacts.feature_columns, feature_columns());
        let reduced = artifacts.transform_only(&bars[100..]).unwrap();
        assert_eq!(reduced.n_cols(), artifacts.reducer.n_components());
    }
}
