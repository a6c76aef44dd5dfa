//! CSV load/save utilities
//!
//! Raw rates and bars round-trip through serde; frames are written with the
//! timestamp as an explicit leading `Datetime` column. Values are formatted
//! with Rust's shortest round-trip notation, so reading a file back
//! reproduces the original values exactly.

use crate::data::frame::Frame;
use crate::data::types::{Bar, RawRate};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{Reader, Writer};
use std::fs::File;
use std::path::Path;

/// CSV-backed loader for pipeline tables
pub struct DataLoader;

impl DataLoader {
    /// Load raw rate records from a CSV file
    pub fn load_rates<P: AsRef<Path>>(path: P) -> Result<Vec<RawRate>> {
        let file = File::open(&path)
            .with_context(|| format!("failed to open file {:?}", path.as_ref()))?;
        let mut reader = Reader::from_reader(file);

        let mut rates = Vec::new();
        for record in reader.deserialize() {
            let rate: RawRate = record.context("failed to parse rate record")?;
            rates.push(rate);
        }
        Ok(rates)
    }

    /// Load bars from a CSV file, sorted by timestamp
    pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
        let file = File::open(&path)
            .with_context(|| format!("failed to open file {:?}", path.as_ref()))?;
        let mut reader = Reader::from_reader(file);

        let mut bars = Vec::new();
        for record in reader.deserialize() {
            let bar: Bar = record.context("failed to parse bar")?;
            bars.push(bar);
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Save bars to a CSV file
    pub fn save_bars<P: AsRef<Path>>(bars: &[Bar], path: P) -> Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("failed to create file {:?}", path.as_ref()))?;
        let mut writer = Writer::from_writer(file);
        for bar in bars {
            writer.serialize(bar)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Save a frame with a leading `Datetime` column and a header row
    pub fn save_frame<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("failed to create file {:?}", path.as_ref()))?;
        let mut writer = Writer::from_writer(file);

        let mut header = vec!["Datetime".to_string()];
        header.extend(frame.columns().iter().cloned());
        writer.write_record(&header)?;

        for (ts, row) in frame.index().iter().zip(frame.rows()) {
            let mut record = vec![ts.to_rfc3339()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a frame written by [`DataLoader::save_frame`]
    pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame> {
        let file = File::open(&path)
            .with_context(|| format!("failed to open file {:?}", path.as_ref()))?;
        let mut reader = Reader::from_reader(file);

        let header = reader.headers().context("missing header row")?.clone();
        let columns: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        let mut frame = Frame::new(columns);

        for record in reader.records() {
            let record = record.context("failed to read frame row")?;
            let ts_field = record
                .get(0)
                .context("missing Datetime field in frame row")?;
            let timestamp: DateTime<Utc> = ts_field
                .parse::<DateTime<Utc>>()
                .with_context(|| format!("bad timestamp {ts_field:?}"))?;

            let row: Vec<f64> = record
                .iter()
                .skip(1)
                .map(|v| v.parse::<f64>().with_context(|| format!("bad value {v:?}")))
                .collect::<Result<_>>()?;
            frame.push_row(timestamp, row);
        }
        Ok(frame)
    }
}
