//! Random hyperparameter search
//!
//! Samples boosting hyperparameters from fixed grids, scores each candidate
//! with walk-forward cross-validation and records every run. The best
//! candidate is the one with the highest mean average precision; on a tie
//! the earliest candidate wins.

use crate::data::frame::Frame;
use crate::features::labeling::TargetSeries;
use crate::model::evaluate::WalkForwardEvaluator;
use crate::model::gbm::GbmParams;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Candidate grids for the random sampler
#[derive(Debug, Clone)]
pub struct ParamSpace {
    pub n_rounds: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub min_samples_leaf: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl Default for ParamSpace {
    fn default() -> Self {
        Self {
            n_rounds: vec![100, 200, 300, 500],
            max_depth: vec![2, 3, 4, 5],
            learning_rate: vec![0.01, 0.05, 0.1, 0.2],
            min_samples_leaf: vec![1, 5, 10, 20],
            subsample: vec![0.6, 0.8, 1.0],
        }
    }
}

impl ParamSpace {
    /// Draw one candidate; fields outside the grids come from `base`
    pub fn sample(&self, rng: &mut ChaCha8Rng, base: &GbmParams) -> GbmParams {
        GbmParams {
            n_rounds: *self.n_rounds.choose(rng).unwrap_or(&base.n_rounds),
            max_depth: *self.max_depth.choose(rng).unwrap_or(&base.max_depth),
            learning_rate: *self
                .learning_rate
                .choose(rng)
                .unwrap_or(&base.learning_rate),
            min_samples_leaf: *self
                .min_samples_leaf
                .choose(rng)
                .unwrap_or(&base.min_samples_leaf),
            subsample: *self.subsample.choose(rng).unwrap_or(&base.subsample),
            ..base.clone()
        }
    }
}

/// One recorded run: the parent experiment or a single candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub name: String,
    /// Name of the enclosing experiment run, absent for the parent itself
    pub parent: Option<String>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Sink for experiment runs
pub trait RunRecorder {
    fn log_run(&mut self, record: &RunRecord) -> anyhow::Result<()>;
}

/// In-memory recorder, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    pub runs: Vec<RunRecord>,
}

impl RunRecorder for MemoryRecorder {
    fn log_run(&mut self, record: &RunRecord) -> anyhow::Result<()> {
        self.runs.push(record.clone());
        Ok(())
    }
}

/// Recorder appending one JSON object per line
pub struct JsonlRecorder {
    writer: BufWriter<File>,
}

impl JsonlRecorder {
    pub fn create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RunRecorder for JsonlRecorder {
    fn log_run(&mut self, record: &RunRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Outcome of one search experiment
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: GbmParams,
    pub best_score: f64,
    pub n_candidates: usize,
}

/// Random-search driver
pub struct SearchRunner {
    pub evaluator: WalkForwardEvaluator,
    pub space: ParamSpace,
    pub n_iter: usize,
    pub seed: u64,
    pub base: GbmParams,
}

impl SearchRunner {
    /// Evaluate `n_iter` sampled candidates and return the best.
    ///
    /// Records one parent run for the experiment and one child run per
    /// candidate, with the candidate's mean and per-fold scores.
    pub fn run_experiment(
        &self,
        experiment: &str,
        x: &Frame,
        y: &TargetSeries,
        recorder: &mut dyn RunRecorder,
    ) -> anyhow::Result<SearchOutcome> {
        let mut parent_params = BTreeMap::new();
        parent_params.insert("n_iter".to_string(), self.n_iter.to_string());
        parent_params.insert("n_splits".to_string(), self.evaluator.n_splits.to_string());
        recorder.log_run(&RunRecord {
            name: experiment.to_string(),
            parent: None,
            params: parent_params,
            metrics: BTreeMap::new(),
        })?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<(GbmParams, f64)> = None;

        for i in 0..self.n_iter {
            let candidate = self.space.sample(&mut rng, &self.base);
            let outcome = self.evaluator.cross_validate(x, y, &candidate)?;

            let mut metrics = BTreeMap::new();
            metrics.insert("mean_aucpr".to_string(), outcome.mean_score);
            for (fold, score) in outcome.fold_scores.iter().enumerate() {
                metrics.insert(format!("fold{fold}_aucpr"), *score);
            }
            recorder.log_run(&RunRecord {
                name: format!("candidate_{i:03}"),
                parent: Some(experiment.to_string()),
                params: candidate.to_map(),
                metrics,
            })?;

            info!(candidate = i, mean_aucpr = outcome.mean_score, "evaluated candidate");

            // Strict comparison keeps the earliest candidate on ties
            if best.as_ref().map_or(true, |(_, s)| outcome.mean_score > *s) {
                best = Some((candidate, outcome.mean_score));
            }
        }

        let (best_params, best_score) =
            best.ok_or_else(|| anyhow::anyhow!("search ran zero candidates"))?;
        Ok(SearchOutcome {
            best_params,
            best_score,
            n_candidates: self.n_iter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn noise(i: usize, salt: f64) -> f64 {
        let x = (i as f64 * 12.9898 + salt).sin() * 43758.5453;
        x.fract() - 0.5
    }

    fn sample_data(n: usize) -> (Frame, TargetSeries) {
        let mut frame = Frame::new(vec!["a", "b"]);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            frame.push_row(
                Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                vec![noise(i, 11.135), noise(i, 45.164)],
            );
            labels.push(if noise(i, 11.135) > 0.0 { 1.0 } else { 0.0 });
        }
        let y = TargetSeries::new(frame.index().to_vec(), labels);
        (frame, y)
    }

    fn runner(n_iter: usize) -> SearchRunner {
        SearchRunner {
            evaluator: WalkForwardEvaluator {
                n_splits: 3,
                ..WalkForwardEvaluator::default()
            },
            space: ParamSpace {
                n_rounds: vec![5, 10],
                max_depth: vec![2, 3],
                learning_rate: vec![0.1, 0.2],
                min_samples_leaf: vec![2],
                subsample: vec![1.0],
            },
            n_iter,
            seed: 7,
            base: GbmParams::default(),
        }
    }

    #[test]
    fn test_records_parent_and_children() {
        let (x, y) = sample_data(60);
        let mut recorder = MemoryRecorder::default();
        let outcome = runner(3)
            .run_experiment("search", &x, &y, &mut recorder)
            .unwrap();

        assert_eq!(recorder.runs.len(), 4);
        assert_eq!(recorder.runs[0].name, "search");
        assert_eq!(recorder.runs[0].parent, None);
        for child in &recorder.runs[1..] {
            assert_eq!(child.parent.as_deref(), Some("search"));
            assert!(child.metrics.contains_key("mean_aucpr"));
            assert_eq!(child.metrics.len(), 1 + 3);
        }
        assert_eq!(outcome.n_candidates, 3);
    }

    #[test]
    fn test_best_is_first_candidate_reaching_max() {
        let (x, y) = sample_data(60);
        let mut recorder = MemoryRecorder::default();
        let outcome = runner(4)
            .run_experiment("search", &x, &y, &mut recorder)
            .unwrap();

        let children = &recorder.runs[1..];
        let max = children
            .iter()
            .map(|r| r.metrics["mean_aucpr"])
            .fold(f64::NEG_INFINITY, f64::max);
        let first_best = children
            .iter()
            .find(|r| r.metrics["mean_aucpr"] == max)
            .unwrap();

        assert_eq!(outcome.best_score, max);
        assert_eq!(outcome.best_params.to_map(), first_best.params);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let space = ParamSpace::default();
        let base = GbmParams::default();
        let a: Vec<GbmParams> = {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..5).map(|_| space.sample(&mut rng, &base)).collect()
        };
        let b: Vec<GbmParams> = {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..5).map(|_| space.sample(&mut rng, &base)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_jsonl_recorder_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let record = RunRecord {
            name: "candidate_000".to_string(),
            parent: Some("search".to_string()),
            params: GbmParams::default().to_map(),
            metrics: BTreeMap::from([("mean_aucpr".to_string(), 0.61)]),
        };

        let mut recorder = JsonlRecorder::create(&path).unwrap();
        recorder.log_run(&record).unwrap();
        drop(recorder);

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: RunRecord = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed, record);
    }
}
