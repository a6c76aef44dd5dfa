//! Gradient-boosted decision trees for binary direction classification
//!
//! Logistic-loss boosting over regression trees: each round fits a tree to
//! the current gradients and hessians and adds its shrunken output to the
//! raw score. Leaf values are Newton steps, `-G / (H + λ)`. Training is
//! deterministic for a fixed seed.

use crate::error::{PipelineError, Result};
use crate::model::metrics::average_precision;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// L2 regularization on leaf weights
const LAMBDA: f64 = 1.0;

/// Boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Maximum boosting rounds
    pub n_rounds: usize,
    /// Depth limit per tree
    pub max_depth: usize,
    /// Shrinkage applied to every tree's output
    pub learning_rate: f64,
    /// Fewest training rows allowed on each side of a split
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn per round
    pub subsample: f64,
    /// Weight multiplier for positive-class rows
    pub scale_pos_weight: f64,
    /// Rounds without eval-set improvement before stopping
    pub early_stopping_rounds: usize,
    /// Seed for row subsampling
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_rounds: 200,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_leaf: 5,
            subsample: 1.0,
            scale_pos_weight: 1.0,
            early_stopping_rounds: 50,
            seed: 69,
        }
    }
}

impl GbmParams {
    /// Flat string map of the hyperparameters, for run records
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("n_rounds".to_string(), self.n_rounds.to_string());
        map.insert("max_depth".to_string(), self.max_depth.to_string());
        map.insert("learning_rate".to_string(), self.learning_rate.to_string());
        map.insert(
            "min_samples_leaf".to_string(),
            self.min_samples_leaf.to_string(),
        );
        map.insert("subsample".to_string(), self.subsample.to_string());
        map.insert(
            "scale_pos_weight".to_string(),
            self.scale_pos_weight.to_string(),
        );
        map
    }
}

/// One node of a fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

fn leaf_value(indices: &[usize], grad: &[f64], hess: &[f64]) -> f64 {
    let g: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h: f64 = indices.iter().map(|&i| hess[i]).sum();
    -g / (h + LAMBDA)
}

/// Exact greedy split search on gradient statistics
fn build_node(
    x: &[Vec<f64>],
    indices: &[usize],
    grad: &[f64],
    hess: &[f64],
    depth: usize,
    params: &GbmParams,
) -> TreeNode {
    if depth >= params.max_depth || indices.len() < 2 * params.min_samples_leaf {
        return TreeNode::Leaf {
            value: leaf_value(indices, grad, hess),
        };
    }

    let g_total: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = indices.iter().map(|&i| hess[i]).sum();
    let parent_score = g_total * g_total / (h_total + LAMBDA);

    let n_features = x[indices[0]].len();
    let mut best: Option<(f64, usize, f64)> = None;

    for feature in 0..n_features {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            x[a][feature]
                .partial_cmp(&x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for pos in 0..sorted.len() - 1 {
            let i = sorted[pos];
            g_left += grad[i];
            h_left += hess[i];

            // Only split between distinct feature values
            if x[i][feature] == x[sorted[pos + 1]][feature] {
                continue;
            }
            let left_count = pos + 1;
            let right_count = sorted.len() - left_count;
            if left_count < params.min_samples_leaf || right_count < params.min_samples_leaf {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            let gain = g_left * g_left / (h_left + LAMBDA)
                + g_right * g_right / (h_right + LAMBDA)
                - parent_score;

            if gain > 1e-12 && best.map_or(true, |(b, _, _)| gain > b) {
                let threshold = (x[i][feature] + x[sorted[pos + 1]][feature]) / 2.0;
                best = Some((gain, feature, threshold));
            }
        }
    }

    match best {
        None => TreeNode::Leaf {
            value: leaf_value(indices, grad, hess),
        },
        Some((_, feature, threshold)) => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| x[i][feature] <= threshold);
            TreeNode::Split {
                feature,
                threshold,
                left: Box::new(build_node(x, &left_idx, grad, hess, depth + 1, params)),
                right: Box::new(build_node(x, &right_idx, grad, hess, depth + 1, params)),
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Fitted boosted-tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmClassifier {
    params: GbmParams,
    base_score: f64,
    trees: Vec<TreeNode>,
}

impl GbmClassifier {
    pub fn new(params: GbmParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    /// Rounds actually kept after early stopping
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Train on labels in {0, 1}. When an eval set is given, training stops
    /// once its average precision has not improved for
    /// `early_stopping_rounds` rounds and the model keeps the best round.
    pub fn fit(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        eval_set: Option<(&[Vec<f64>], &[f64])>,
    ) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::EmptyInput);
        }

        let n = x.len();
        let weights: Vec<f64> = y
            .iter()
            .map(|&yi| if yi == 1.0 { self.params.scale_pos_weight } else { 1.0 })
            .collect();

        let weight_sum: f64 = weights.iter().sum();
        let positive_weight: f64 = weights
            .iter()
            .zip(y)
            .map(|(w, &yi)| if yi == 1.0 { *w } else { 0.0 })
            .sum();
        let prior = (positive_weight / weight_sum).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (prior / (1.0 - prior)).ln();
        self.trees.clear();

        let mut scores = vec![self.base_score; n];
        let mut eval_scores: Vec<f64> = eval_set
            .map(|(ex, _)| vec![self.base_score; ex.len()])
            .unwrap_or_default();

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);
        let mut best_metric = f64::NEG_INFINITY;
        let mut best_round = 0;

        for round in 0..self.params.n_rounds {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(scores[i]);
                grad[i] = weights[i] * (p - y[i]);
                hess[i] = (weights[i] * p * (1.0 - p)).max(1e-16);
            }

            let indices: Vec<usize> = if sample_size < n {
                let mut all: Vec<usize> = (0..n).collect();
                all.shuffle(&mut rng);
                all.truncate(sample_size);
                all
            } else {
                (0..n).collect()
            };

            let tree = build_node(x, &indices, &grad, &hess, 0, &self.params);
            for i in 0..n {
                scores[i] += self.params.learning_rate * tree.predict(&x[i]);
            }

            if let Some((eval_x, eval_y)) = eval_set {
                for (s, row) in eval_scores.iter_mut().zip(eval_x) {
                    *s += self.params.learning_rate * tree.predict(row);
                }
                self.trees.push(tree);

                let probs: Vec<f64> = eval_scores.iter().map(|&s| sigmoid(s)).collect();
                let metric = average_precision(eval_y, &probs);
                if metric > best_metric {
                    best_metric = metric;
                    best_round = round;
                } else if round - best_round >= self.params.early_stopping_rounds {
                    debug!(round, best_round, best_metric, "early stop");
                    break;
                }
            } else {
                self.trees.push(tree);
            }
        }

        if eval_set.is_some() {
            self.trees.truncate(best_round + 1);
        }
        Ok(())
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.params.learning_rate * t.predict(row))
                .sum::<f64>()
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| sigmoid(self.raw_score(row))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let v = i as f64 / n as f64;
                vec![v, (i as f64 * 0.37).sin()]
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|r| if r[0] > 0.5 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_separable_threshold() {
        let (x, y) = separable_data(200);
        let mut model = GbmClassifier::new(GbmParams {
            n_rounds: 30,
            ..GbmParams::default()
        });
        model.fit(&x, &y, None).unwrap();

        let probs = model.predict_proba(&[vec![0.9, 0.0], vec![0.1, 0.0]]);
        assert!(probs[0] > 0.7);
        assert!(probs[1] < 0.3);
    }

    #[test]
    fn test_single_class_is_harmless() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y = vec![0.0; 30];
        let mut model = GbmClassifier::new(GbmParams::default());
        model.fit(&x, &y, None).unwrap();

        for p in model.predict_proba(&x) {
            assert!(p < 0.01);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = separable_data(120);
        let params = GbmParams {
            n_rounds: 15,
            subsample: 0.7,
            ..GbmParams::default()
        };

        let mut a = GbmClassifier::new(params.clone());
        a.fit(&x, &y, None).unwrap();
        let mut b = GbmClassifier::new(params);
        b.fit(&x, &y, None).unwrap();

        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }

    #[test]
    fn test_early_stopping_bounds_rounds() {
        let (x, y) = separable_data(150);
        let mut model = GbmClassifier::new(GbmParams {
            n_rounds: 100,
            early_stopping_rounds: 5,
            ..GbmParams::default()
        });
        model.fit(&x[..100], &y[..100], Some((&x[100..], &y[100..]))).unwrap();

        assert!(model.n_trees() >= 1);
        assert!(model.n_trees() <= 100);
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = separable_data(100);
        let mut model = GbmClassifier::new(GbmParams {
            n_rounds: 10,
            ..GbmParams::default()
        });
        model.fit(&x, &y, None).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: GbmClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict_proba(&x), model.predict_proba(&x));
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let mut model = GbmClassifier::new(GbmParams::default());
        let err = model.fit(&[vec![1.0]], &[1.0, 0.0], None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }
}
