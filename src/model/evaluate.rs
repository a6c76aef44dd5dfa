//! Walk-forward evaluation
//!
//! Expanding-window cross-validation over a time-ordered feature table.
//! Every fold rebuilds the whole preprocessing chain on its own training
//! window, so nothing fitted ever sees test rows. Labels are re-aligned by
//! timestamp after each stage because preprocessing drops rows.

use crate::data::frame::Frame;
use crate::error::{PipelineError, Result};
use crate::features::labeling::TargetSeries;
use crate::model::gbm::{GbmClassifier, GbmParams};
use crate::model::metrics::average_precision;
use crate::preprocess::reduce::Reducer;
use crate::preprocess::stationarity::StationarityFilter;
use tracing::info;

/// One expanding-window fold, as row ranges into the full table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSplit {
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// Expanding-window splits: fold `i` trains on the first `(i+1)` blocks and
/// tests on the next one, with block size `n_rows / (n_splits + 1)`
pub fn time_series_split(n_rows: usize, n_splits: usize) -> Result<Vec<FoldSplit>> {
    let test_size = n_rows / (n_splits + 1);
    if test_size == 0 {
        return Err(PipelineError::InsufficientData {
            actual: n_rows,
            required: n_splits + 1,
        });
    }

    Ok((0..n_splits)
        .map(|i| FoldSplit {
            train_end: (i + 1) * test_size,
            test_start: (i + 1) * test_size,
            test_end: (i + 2) * test_size,
        })
        .collect())
}

/// Fresh preprocessing chain for one fold
pub struct FoldPipeline {
    pub stationarity: StationarityFilter,
    pub reducer: Reducer,
}

/// Cross-validation result
#[derive(Debug, Clone)]
pub struct CvOutcome {
    /// Average precision per fold, in fold order
    pub fold_scores: Vec<f64>,
    /// Mean of the fold scores
    pub mean_score: f64,
}

/// Expanding-window evaluator for one hyperparameter candidate
#[derive(Debug, Clone)]
pub struct WalkForwardEvaluator {
    pub n_splits: usize,
    pub adf_alpha: f64,
    pub adf_min_obs: usize,
    pub pca_variance: f64,
}

impl Default for WalkForwardEvaluator {
    fn default() -> Self {
        Self {
            n_splits: 5,
            adf_alpha: 0.05,
            adf_min_obs: 30,
            pca_variance: 0.8,
        }
    }
}

impl WalkForwardEvaluator {
    /// Score a candidate with the evaluator's own preprocessing chain
    pub fn cross_validate(
        &self,
        x: &Frame,
        y: &TargetSeries,
        params: &GbmParams,
    ) -> Result<CvOutcome> {
        let alpha = self.adf_alpha;
        let min_obs = self.adf_min_obs;
        let variance = self.pca_variance;
        self.cross_validate_with(x, y, params, || FoldPipeline {
            stationarity: StationarityFilter::new(alpha, min_obs),
            reducer: Reducer::new(variance),
        })
    }

    /// Score a candidate, drawing a fresh preprocessing chain per fold from
    /// the given factory
    pub fn cross_validate_with<F>(
        &self,
        x: &Frame,
        y: &TargetSeries,
        params: &GbmParams,
        mut fold_pipeline: F,
    ) -> Result<CvOutcome>
    where
        F: FnMut() -> FoldPipeline,
    {
        if x.len() != y.len() {
            return Err(PipelineError::Misaligned(format!(
                "{} feature rows against {} labels",
                x.len(),
                y.len()
            )));
        }

        let splits = time_series_split(x.len(), self.n_splits)?;
        let mut fold_scores = Vec::with_capacity(splits.len());

        for (fold, split) in splits.iter().enumerate() {
            let mut pipeline = fold_pipeline();

            let train = x.slice_rows(0, split.train_end);
            let test = x.slice_rows(split.test_start, split.test_end);

            let fitted = pipeline.stationarity.fit(&train)?;
            let train = fitted.transform(&train)?;
            let test = fitted.transform(&test)?;

            let train = pipeline.reducer.fit_transform(&train)?;
            let test = pipeline.reducer.transform(&test)?;

            let y_train = y.align_to(train.index())?;
            let y_test = y.align_to(test.index())?;

            let positives = y_train.iter().filter(|&&v| v == 1.0).count();
            let negatives = y_train.len() - positives;
            let scale_pos_weight = if positives > 0 {
                negatives as f64 / positives as f64
            } else {
                1.0
            };

            let fold_params = GbmParams {
                scale_pos_weight,
                ..params.clone()
            };
            let train_rows: Vec<Vec<f64>> = train.rows().to_vec();
            let test_rows: Vec<Vec<f64>> = test.rows().to_vec();

            let mut model = GbmClassifier::new(fold_params);
            model.fit(&train_rows, &y_train, Some((&test_rows, &y_test)))?;

            let probs = model.predict_proba(&test_rows);
            let score = average_precision(&y_test, &probs);
            info!(fold, score, train_rows = train.len(), test_rows = test.len(), "scored fold");
            fold_scores.push(score);
        }

        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        Ok(CvOutcome {
            fold_scores,
            mean_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::cell::Cell;

    fn noise(i: usize, salt: f64) -> f64 {
        let x = (i as f64 * 12.9898 + salt).sin() * 43758.5453;
        x.fract() - 0.5
    }

    fn sample_data(n: usize) -> (Frame, TargetSeries) {
        let mut walk = 0.0;
        let mut frame = Frame::new(vec!["walk", "a", "b"]);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            walk += noise(i, 78.233);
            frame.push_row(
                Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                vec![walk, noise(i, 11.135), noise(i, 45.164)],
            );
            labels.push(if noise(i, 11.135) > 0.0 { 1.0 } else { 0.0 });
        }
        let y = TargetSeries::new(frame.index().to_vec(), labels);
        (frame, y)
    }

    #[test]
    fn test_split_shapes() {
        let splits = time_series_split(60, 3).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(
            splits[0],
            FoldSplit {
                train_end: 15,
                test_start: 15,
                test_end: 30
            }
        );
        assert_eq!(splits[2].test_end, 60);

        // Training windows expand, test windows never overlap
        for pair in splits.windows(2) {
            assert!(pair[1].train_end > pair[0].train_end);
            assert_eq!(pair[1].test_start, pair[0].test_end);
        }
    }

    #[test]
    fn test_too_few_rows_for_split() {
        assert!(matches!(
            time_series_split(3, 5),
            Err(PipelineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_fresh_pipeline_per_fold() {
        let (x, y) = sample_data(60);
        let evaluator = WalkForwardEvaluator {
            n_splits: 3,
            ..WalkForwardEvaluator::default()
        };
        let params = GbmParams {
            n_rounds: 10,
            min_samples_leaf: 2,
            ..GbmParams::default()
        };

        let built = Cell::new(0);
        let outcome = evaluator
            .cross_validate_with(&x, &y, &params, || {
                built.set(built.get() + 1);
                FoldPipeline {
                    stationarity: StationarityFilter::new(0.05, 30),
                    reducer: Reducer::new(0.8),
                }
            })
            .unwrap();

        assert_eq!(built.get(), 3);
        assert_eq!(outcome.fold_scores.len(), 3);
        for score in &outcome.fold_scores {
            assert!(*score >= 0.0 && *score <= 1.0);
        }
        let mean = outcome.fold_scores.iter().sum::<f64>() / 3.0;
        assert!((outcome.mean_score - mean).abs() < 1e-12);
    }

    #[test]
    fn test_misaligned_labels_rejected() {
        let (x, y) = sample_data(40);
        let short = TargetSeries::new(y.index()[..20].to_vec(), y.values()[..20].to_vec());
        let evaluator = WalkForwardEvaluator::default();
        assert!(matches!(
            evaluator.cross_validate(&x, &short, &GbmParams::default()),
            Err(PipelineError::Misaligned(_))
        ));
    }
}
