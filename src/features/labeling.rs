//! Direction labeling
//!
//! The target is binary: 1 when the close `horizon` bars ahead is strictly
//! higher than the current close, 0 otherwise. The last `horizon` rows have
//! no lookahead and carry NaN until [`split_xy`] removes them.

use crate::data::frame::Frame;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Name of the label column
pub const TARGET_COLUMN: &str = "Target";

/// Timestamp-aligned label vector
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSeries {
    index: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TargetSeries {
    pub fn new(index: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self { index, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Labels re-ordered to match another timestamp index.
    ///
    /// Preprocessing may drop rows, so labels are matched by timestamp
    /// rather than position. A timestamp with no label is a hard error.
    pub fn align_to(&self, index: &[DateTime<Utc>]) -> Result<Vec<f64>> {
        let by_ts: HashMap<DateTime<Utc>, f64> = self
            .index
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect();

        index
            .iter()
            .map(|ts| {
                by_ts.get(ts).copied().ok_or_else(|| {
                    PipelineError::Misaligned(format!("no label for timestamp {ts}"))
                })
            })
            .collect()
    }
}

/// Append the `Target` column for the given horizon
pub fn make_label(frame: &Frame, horizon: usize) -> Result<Frame> {
    if frame.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let close = frame.column("Close")?;
    let n = close.len();
    let mut target = vec![f64::NAN; n];
    for i in 0..n.saturating_sub(horizon) {
        target[i] = if close[i + horizon] > close[i] { 1.0 } else { 0.0 };
    }

    let mut labeled = frame.clone();
    labeled.insert_column(TARGET_COLUMN, target)?;
    Ok(labeled)
}

/// Split a labeled frame into features and labels, dropping the trailing
/// rows whose target is undefined
pub fn split_xy(labeled: &Frame) -> Result<(Frame, TargetSeries)> {
    let target = labeled.column(TARGET_COLUMN)?;
    let features = labeled.drop_column(TARGET_COLUMN)?;

    let mut x = Frame::new(features.columns().to_vec());
    let mut index = Vec::new();
    let mut values = Vec::new();

    for (i, (ts, row)) in features.index().iter().zip(features.rows()).enumerate() {
        if target[i].is_finite() {
            x.push_row(*ts, row.clone());
            index.push(*ts);
            values.push(target[i]);
        }
    }

    if x.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok((x, TargetSeries::new(index, values)))
}
