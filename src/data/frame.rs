//! Time-indexed numeric table
//!
//! `Frame` is the tabular structure flowing through the feature, labeling
//! and preprocessing stages: an ordered timestamp index plus a fixed,
//! ordered set of named `f64` columns. Column order is load-bearing for the
//! reducer and for persisted artifacts, so it is preserved by every
//! operation here.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};

/// Ordered, timestamp-indexed table of named `f64` columns
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Frame {
    /// Create an empty frame with the given column names
    pub fn new<S: Into<String>>(columns: Vec<S>) -> Self {
        Self {
            index: Vec::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row; the row length must match the column count
    pub fn push_row(&mut self, timestamp: DateTime<Utc>, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.index.push(timestamp);
        self.rows.push(row);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Ordered column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Timestamp index
    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// Row-major data access
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Position of a column by name
    pub fn column_pos(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True when the frame has a column with this name
    pub fn has_column(&self, name: &str) -> bool {
        self.column_pos(name).is_some()
    }

    /// Copy of one column's values
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let pos = self
            .column_pos(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r[pos]).collect())
    }

    /// Append a new column; the value count must match the row count
    pub fn insert_column<S: Into<String>>(&mut self, name: S, values: Vec<f64>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Misaligned(format!(
                "column of {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// New frame with only the rows whose values are all finite
    pub fn drop_nan_rows(&self) -> Frame {
        let mut out = Frame::new(self.columns.clone());
        for (ts, row) in self.index.iter().zip(&self.rows) {
            if row.iter().all(|v| v.is_finite()) {
                out.push_row(*ts, row.clone());
            }
        }
        out
    }

    /// New frame covering the given row range
    pub fn slice_rows(&self, start: usize, end: usize) -> Frame {
        let end = end.min(self.len());
        let start = start.min(end);
        Frame {
            index: self.index[start..end].to_vec(),
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// New frame with the named columns in the requested order
    pub fn select(&self, names: &[String]) -> Result<Frame> {
        let positions: Vec<usize> = names
            .iter()
            .map(|n| {
                self.column_pos(n)
                    .ok_or_else(|| PipelineError::MissingColumn(n.clone()))
            })
            .collect::<Result<_>>()?;

        let mut out = Frame::new(names.to_vec());
        for (ts, row) in self.index.iter().zip(&self.rows) {
            out.push_row(*ts, positions.iter().map(|&p| row[p]).collect());
        }
        Ok(out)
    }

    /// New frame without the named column
    pub fn drop_column(&self, name: &str) -> Result<Frame> {
        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.as_str() != name)
            .cloned()
            .collect();
        if keep.len() == self.columns.len() {
            return Err(PipelineError::MissingColumn(name.to_string()));
        }
        self.select(&keep)
    }

    /// Replace one column's values in place
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        let pos = self
            .column_pos(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        if values.len() != self.rows.len() {
            return Err(PipelineError::Misaligned(format!(
                "column of {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[pos] = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 3600, 0).unwrap()
    }

    fn sample_frame() -> Frame {
        let mut f = Frame::new(vec!["a", "b"]);
        f.push_row(ts(0), vec![1.0, 10.0]);
        f.push_row(ts(1), vec![2.0, f64::NAN]);
        f.push_row(ts(2), vec![3.0, 30.0]);
        f
    }

    #[test]
    fn test_column_access() {
        let f = sample_frame();
        assert_eq!(f.column("a").unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(f.column("missing").is_err());
    }

    #[test]
    fn test_drop_nan_rows() {
        let f = sample_frame().drop_nan_rows();
        assert_eq!(f.len(), 2);
        assert_eq!(f.index()[1], ts(2));
        assert_eq!(f.column("b").unwrap(), vec![10.0, 30.0]);
    }

    #[test]
    fn test_insert_and_select() {
        let mut f = sample_frame();
        f.insert_column("c", vec![7.0, 8.0, 9.0]).unwrap();
        let sel = f.select(&["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(sel.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(sel.rows()[0], vec![7.0, 1.0]);

        assert!(f.insert_column("bad", vec![1.0]).is_err());
    }

    #[test]
    fn test_slice_rows() {
        let f = sample_frame();
        let s = f.slice_rows(1, 3);
        assert_eq!(s.len(), 2);
        assert_eq!(s.index()[0], ts(1));
    }

    #[test]
    fn test_drop_column() {
        let f = sample_frame();
        let d = f.drop_column("b").unwrap();
        assert_eq!(d.columns(), &["a".to_string()]);
        assert!(f.drop_column("missing").is_err());
    }
}
