//! Standardization and principal-component reduction
//!
//! Columns are standardized with statistics learned at fit time, then
//! projected onto the leading principal components of the training window.
//! The number of components is the smallest that explains the configured
//! fraction of variance. Everything learned lives in [`ReducerState`], which
//! serializes into the trained artifact.

use crate::data::frame::Frame;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Covariance matrix of row-major observations
fn covariance_matrix(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows() as f64;
    let mean = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(data.ncols()));
    let centered = data - &mean;
    centered.t().dot(&centered) / (n - 1.0).max(1.0)
}

/// Power iteration for the dominant eigenpair of a symmetric matrix
fn power_iteration(matrix: &Array2<f64>, max_iter: usize, tol: f64) -> (f64, Array1<f64>) {
    let n = matrix.nrows();
    let mut v = Array1::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut eigenvalue = 0.0;

    for _ in 0..max_iter {
        let new_v = matrix.dot(&v);
        let new_eigenvalue: f64 = v.iter().zip(new_v.iter()).map(|(&a, &b)| a * b).sum();

        let norm = new_v.dot(&new_v).sqrt();
        let new_v = if norm > 1e-10 { new_v / norm } else { new_v };

        if (new_eigenvalue - eigenvalue).abs() < tol {
            return (new_eigenvalue, new_v);
        }
        eigenvalue = new_eigenvalue;
        v = new_v;
    }

    (eigenvalue, v)
}

/// Eigenpairs of a symmetric matrix by power iteration with deflation,
/// sorted by descending eigenvalue
fn eigen_symmetric(matrix: &Array2<f64>) -> Vec<(f64, Array1<f64>)> {
    let n = matrix.nrows();
    let mut deflated = matrix.clone();
    let mut pairs = Vec::with_capacity(n);

    for _ in 0..n {
        let (eigenvalue, eigenvector) = power_iteration(&deflated, 100, 1e-10);

        // Deflate: A = A - λ v vᵀ
        let outer = {
            let v = eigenvector.view().insert_axis(Axis(1));
            v.dot(&v.t())
        };
        deflated = deflated - eigenvalue * outer;
        pairs.push((eigenvalue, eigenvector));
    }

    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

/// Everything the reducer learns at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerState {
    /// Input columns in the order the projection expects
    pub columns: Vec<String>,
    /// Per-column standardization mean
    pub means: Vec<f64>,
    /// Per-column standardization scale, never zero
    pub scales: Vec<f64>,
    /// Principal components, one coefficient vector per retained component
    pub components: Vec<Vec<f64>>,
    /// Fraction of variance each retained component explains
    pub explained_variance_ratio: Vec<f64>,
}

impl ReducerState {
    pub fn n_components(&self) -> usize {
        self.components.len()
    }
}

/// Standardize-then-project preprocessor
#[derive(Debug, Clone)]
pub struct Reducer {
    variance_threshold: f64,
    state: Option<ReducerState>,
}

impl Reducer {
    /// Reducer keeping the smallest component count whose cumulative
    /// explained variance reaches `variance_threshold`
    pub fn new(variance_threshold: f64) -> Self {
        Self {
            variance_threshold,
            state: None,
        }
    }

    /// Rebuild a fitted reducer from persisted state
    pub fn from_state(state: ReducerState) -> Self {
        Self {
            variance_threshold: 0.0,
            state: Some(state),
        }
    }

    /// Learned state, once fitted
    pub fn state(&self) -> Option<&ReducerState> {
        self.state.as_ref()
    }

    /// Learn standardization statistics and principal components
    pub fn fit(&mut self, frame: &Frame) -> Result<()> {
        if frame.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let n_rows = frame.len();
        let n_cols = frame.n_cols();
        let mut means = Vec::with_capacity(n_cols);
        let mut scales = Vec::with_capacity(n_cols);
        let mut standardized = Array2::zeros((n_rows, n_cols));

        for (j, name) in frame.columns().iter().enumerate() {
            let values = frame.column(name)?;
            let mean: f64 = values.iter().sum::<f64>() / n_rows as f64;
            let variance: f64 =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
            // Constant columns standardize to zero instead of dividing by zero
            let scale = if variance.sqrt() > 1e-12 { variance.sqrt() } else { 1.0 };

            for (i, v) in values.iter().enumerate() {
                standardized[[i, j]] = (v - mean) / scale;
            }
            means.push(mean);
            scales.push(scale);
        }

        let cov = covariance_matrix(&standardized);
        let pairs = eigen_symmetric(&cov);

        let total: f64 = pairs.iter().map(|(v, _)| v.max(0.0)).sum();
        let ratios: Vec<f64> = pairs
            .iter()
            .map(|(v, _)| if total > 0.0 { v.max(0.0) / total } else { 0.0 })
            .collect();

        let mut n_components = 0;
        let mut cumulative = 0.0;
        for ratio in &ratios {
            n_components += 1;
            cumulative += ratio;
            if cumulative >= self.variance_threshold {
                break;
            }
        }

        debug!(
            n_components,
            cumulative_variance = cumulative,
            "fitted principal-component reducer"
        );

        self.state = Some(ReducerState {
            columns: frame.columns().to_vec(),
            means,
            scales,
            components: pairs[..n_components]
                .iter()
                .map(|(_, v)| v.to_vec())
                .collect(),
            explained_variance_ratio: ratios[..n_components].to_vec(),
        });
        Ok(())
    }

    /// Standardize and project onto the retained components.
    ///
    /// Output columns are `PC1..PCk` over the input's timestamp index.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let state = self
            .state
            .as_ref()
            .ok_or(PipelineError::NotFitted("Reducer"))?;

        let aligned = frame.select(&state.columns)?;
        let names: Vec<String> = (1..=state.n_components())
            .map(|i| format!("PC{i}"))
            .collect();
        let mut out = Frame::new(names);

        for (ts, row) in aligned.index().iter().zip(aligned.rows()) {
            let scaled: Vec<f64> = row
                .iter()
                .zip(state.means.iter().zip(&state.scales))
                .map(|(v, (m, s))| (v - m) / s)
                .collect();
            let projected: Vec<f64> = state
                .components
                .iter()
                .map(|c| c.iter().zip(&scaled).map(|(a, b)| a * b).sum())
                .collect();
            out.push_row(*ts, projected);
        }
        Ok(out)
    }

    /// Fit on a window and transform that same window
    pub fn fit_transform(&mut self, frame: &Frame) -> Result<Frame> {
        self.fit(frame)?;
        self.transform(frame)
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

    /// Four columns driven by two latent factors plus a constant column
    fn correlated_frame(n: usize) -> Frame {
        let mut frame = Frame::new(vec!["a", "b", "c", "d", "const"]);
        for i in 0..n {
            let f1 = noise(i, 78.233);
            let f2 = noise(i, 11.135);
            frame.push_row(
                Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                vec![
                    f1 * 2.0,
                    f1 * 2.0 + f2 * 0.05,
                    f2 * 1.5,
                    f2 * 1.5 - f1 * 0.05,
                    3.0,
                ],
            );
        }
        frame
    }

    #[test]
    fn test_reduces_correlated_columns() {
        let frame = correlated_frame(120);
        let mut reducer = Reducer::new(0.8);
        let reduced = reducer.fit_transform(&frame).unwrap();

        let state = reducer.state().unwrap();
        assert!(state.n_components() < frame.n_cols());
        assert!(state.n_components() >= 1);
        assert_eq!(reduced.len(), frame.len());
        assert_eq!(reduced.columns()[0], "PC1");
        for row in reduced.rows() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let reducer = Reducer::new(0.8);
        let err = reducer.transform(&correlated_frame(10)).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted("Reducer")));
        assert!(err.to_string().contains("fitted"));
    }

    #[test]
    fn test_state_round_trip_reproduces_transform() {
        let frame = correlated_frame(100);
        let mut reducer = Reducer::new(0.8);
        let expected = reducer.fit_transform(&frame).unwrap();

        let json = serde_json::to_string(reducer.state().unwrap()).unwrap();
        let restored = Reducer::from_state(serde_json::from_str(&json).unwrap());
        let actual = restored.transform(&frame).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_constant_column_does_not_poison_projection() {
        let frame = correlated_frame(60);
        let mut reducer = Reducer::new(0.99);
        let reduced = reducer.fit_transform(&frame).unwrap();
        for row in reduced.rows() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_transform_reorders_columns_by_name() {
        let frame = correlated_frame(80);
        let mut reducer = Reducer::new(0.8);
        let expected = reducer.fit_transform(&frame).unwrap();

        let shuffled: Vec<String> = vec!["const", "d", "c", "b", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        let reordered = frame.select(&shuffled).unwrap();
        let actual = reducer.transform(&reordered).unwrap();
        assert_eq!(actual, expected);
    }
}
