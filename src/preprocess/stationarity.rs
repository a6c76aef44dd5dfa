//! Stationarity testing and differencing
//!
//! Each continuous feature column is checked with an augmented Dickey-Fuller
//! test on the training window. Columns that fail are first-differenced.
//! The set of differenced columns is frozen at fit time and replayed on
//! later windows, so training and inference always see the same transform.

use crate::data::frame::Frame;
use crate::error::Result;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of an augmented Dickey-Fuller test
#[derive(Debug, Clone, Copy)]
pub struct AdfResult {
    /// t-statistic of the lagged-level coefficient
    pub statistic: f64,
    /// Approximate p-value; H0 is "the series has a unit root"
    pub p_value: f64,
}

/// Augmented Dickey-Fuller test with constant.
///
/// Fits the regression `Δy_t = α + β·y_{t-1} + Σ γ_i·Δy_{t-i}` by OLS and
/// reports the t-statistic on β. Degenerate inputs (too short, singular
/// design matrix) come back with a p-value of 1.0 so the caller treats the
/// series as non-stationary.
pub fn adf_test(data: &[f64], max_lag: Option<usize>) -> AdfResult {
    let unit_root = AdfResult {
        statistic: f64::NAN,
        p_value: 1.0,
    };

    let n = data.len();
    if n < 10 {
        return unit_root;
    }

    let diff: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();

    // Schwert-style default lag, bounded away from the sample size
    let lag = max_lag.unwrap_or_else(|| ((n as f64).powf(1.0 / 3.0) * 2.0) as usize);
    let lag = lag.min(n / 4).max(1);

    let effective_n = n - 1 - lag;
    if effective_n < lag + 3 {
        return unit_root;
    }

    // Regressors: [1, y_{t-1}, Δy_{t-1}, ..., Δy_{t-lag}]
    let num_regressors = 2 + lag;
    let mut x_data = Vec::with_capacity(effective_n * num_regressors);
    for t in lag..diff.len() {
        x_data.push(1.0);
        x_data.push(data[t]);
        for i in 1..=lag {
            x_data.push(diff[t - i]);
        }
    }

    let x = DMatrix::from_row_slice(effective_n, num_regressors, &x_data);
    let y = DVector::from_vec(diff[lag..].to_vec());

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;
    let xtx_inv = match xtx.try_inverse() {
        Some(inv) => inv,
        None => return unit_root,
    };
    let beta = &xtx_inv * xty;

    let residuals = &y - &x * &beta;
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let mse = sse / (effective_n - num_regressors) as f64;
    let se_beta = (mse * xtx_inv[(1, 1)]).sqrt();

    let t_stat = beta[1] / se_beta;
    AdfResult {
        statistic: t_stat,
        p_value: adf_p_value(t_stat, n),
    }
}

/// Approximate ADF p-value by interpolating between finite-sample critical
/// values for the constant-only regression
fn adf_p_value(t_stat: f64, n: usize) -> f64 {
    let cv_1 = -3.43 - 6.0 / n as f64;
    let cv_5 = -2.86 - 4.0 / n as f64;
    let cv_10 = -2.57 - 3.0 / n as f64;

    if t_stat < cv_1 {
        0.01 * (cv_1 - t_stat).exp().recip()
    } else if t_stat < cv_5 {
        0.01 + (0.05 - 0.01) * (t_stat - cv_1) / (cv_5 - cv_1)
    } else if t_stat < cv_10 {
        0.05 + (0.10 - 0.05) * (t_stat - cv_5) / (cv_10 - cv_5)
    } else {
        0.10 + 0.90 * (1.0 - (-0.5 * (t_stat - cv_10)).exp())
    }
}

/// Configuration for the column-wise stationarity pass
#[derive(Debug, Clone)]
pub struct StationarityFilter {
    /// Significance level; a column is stationary when `p_value < alpha`
    pub alpha: f64,
    /// Fewest observations required before a column is tested
    pub min_obs: usize,
    /// Columns never tested or differenced
    pub exempt_columns: Vec<String>,
    /// Column-name prefix never tested or differenced
    pub exempt_prefix: String,
}

impl Default for StationarityFilter {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            min_obs: 30,
            exempt_columns: vec!["DOW".to_string()],
            exempt_prefix: "Signal_".to_string(),
        }
    }
}

impl StationarityFilter {
    pub fn new(alpha: f64, min_obs: usize) -> Self {
        Self {
            alpha,
            min_obs,
            ..Self::default()
        }
    }

    fn is_exempt(&self, name: &str) -> bool {
        name.starts_with(&self.exempt_prefix) || self.exempt_columns.iter().any(|c| c == name)
    }

    /// Test every testable column and freeze the set that needs differencing
    pub fn fit(&self, frame: &Frame) -> Result<FittedStationarity> {
        let mut non_stationary = Vec::new();

        for name in frame.columns() {
            if self.is_exempt(name) {
                continue;
            }

            let values = frame.column(name)?;
            let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
            if finite.len() < self.min_obs {
                debug!(column = %name, observations = finite.len(), "too short to test, left as is");
                continue;
            }

            let result = adf_test(&finite, None);
            if result.p_value.is_nan() || result.p_value >= self.alpha {
                debug!(
                    column = %name,
                    p_value = result.p_value,
                    statistic = result.statistic,
                    "unit root not rejected, will difference"
                );
                non_stationary.push(name.clone());
            }
        }

        Ok(FittedStationarity { non_stationary })
    }
}

/// Frozen outcome of [`StationarityFilter::fit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedStationarity {
    non_stationary: Vec<String>,
}

impl FittedStationarity {
    /// Columns that get first-differenced by [`FittedStationarity::transform`]
    pub fn non_stationary(&self) -> &[String] {
        &self.non_stationary
    }

    /// Difference the frozen columns and drop incomplete rows.
    ///
    /// The first row is always removed: differencing has no value there,
    /// and windows with nothing to difference must still line up with
    /// windows that do.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut out = frame.clone();
        for name in &self.non_stationary {
            let values = out.column(name)?;
            let mut diffed = vec![f64::NAN];
            diffed.extend(values.windows(2).map(|w| w[1] - w[0]));
            out.set_column(name, diffed)?;
        }

        let trimmed = out.slice_rows(1, out.len());
        Ok(trimmed.drop_nan_rows())
    }
}
