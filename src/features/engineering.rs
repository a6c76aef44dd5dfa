//! Feature engineering
//!
//! Builds the full model input table from normalized bars: raw OHLCV,
//! continuous indicators and discrete signal encodings, in a fixed column
//! order. The order is part of the trained artifact contract, so it never
//! depends on insertion order or configuration.

use crate::data::frame::Frame;
use crate::data::types::Bar;
use crate::error::{PipelineError, Result};
use crate::features::technical::{
    adx, atr, bollinger_bands, cci, cmf, donchian_channel, ema, ichimoku, macd, mfi, obv,
    pct_change, roc, rsi, sma, stochastic_k, vwap,
};
use chrono::Datelike;
use tracing::debug;

/// Fewest bars accepted by [`add_all_features`]
pub const MIN_FEATURE_ROWS: usize = 30;

/// Fixed feature column order
pub const FEATURE_COLUMNS: [&str; 45] = [
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Returns",
    "Range",
    "DOW",
    "ROC",
    "RSI",
    "STOCH",
    "VROC",
    "CMF",
    "MFI",
    "OBV",
    "VWAP",
    "ATR",
    "BB_upper",
    "BB_middle",
    "BB_lower",
    "Donchian_Upper",
    "Donchian_Lower",
    "Donchian_Middle",
    "ADX",
    "DMP",
    "DMN",
    "CCI",
    "MA_8",
    "MA_20",
    "Ichi_A",
    "Ichi_B",
    "Ichi_base",
    "MACD_Line",
    "Signal_Line",
    "Signal_MA",
    "Signal_Price_Above_MA",
    "Signal_MACD",
    "Signal_RSI",
    "Signal_BB",
    "Signal_ATR",
    "Signal_OBV",
    "Signal_MFI",
    "Signal_VROC",
    "Signal_ADX",
    "Signal_CCI",
];

/// Feature column names as owned strings
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
}

/// Compute every feature column over the given bars and drop warm-up rows.
///
/// Fails with [`PipelineError::InsufficientData`] when there are too few
/// bars for the indicator windows to produce any complete row.
pub fn add_all_features(bars: &[Bar]) -> Result<Frame> {
    if bars.len() < MIN_FEATURE_ROWS {
        return Err(PipelineError::InsufficientData {
            actual: bars.len(),
            required: MIN_FEATURE_ROWS,
        });
    }

    let n = bars.len();
    let open: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let returns = pct_change(&close, 1);
    let range: Vec<f64> = (0..n)
        .map(|i| if low[i] != 0.0 { high[i] / low[i] - 1.0 } else { f64::NAN })
        .collect();
    let dow: Vec<f64> = bars
        .iter()
        .map(|b| b.timestamp.weekday().num_days_from_monday() as f64)
        .collect();

    let roc_12 = roc(&close, 12);
    let rsi_14 = rsi(&close, 14);
    let stoch_14 = stochastic_k(&high, &low, &close, 14);
    let vroc: Vec<f64> = pct_change(&volume, 14).iter().map(|v| v * 100.0).collect();
    let cmf_20 = cmf(&high, &low, &close, &volume, 20);
    let mfi_14 = mfi(&high, &low, &close, &volume, 14);
    let obv_line = obv(&close, &volume);
    let vwap_14 = vwap(&high, &low, &close, &volume, 14);
    let atr_14 = atr(&high, &low, &close, 14);
    let bb = bollinger_bands(&close, 20, 2.0);
    let donchian = donchian_channel(&high, &low, 20);
    let dmi = adx(&high, &low, &close, 14);
    let cci_20 = cci(&high, &low, &close, 20);
    let ema_8 = ema(&close, 8);
    let ema_20 = ema(&close, 20);
    let cloud = ichimoku(&high, &low, 9, 26, 52);
    let macd_lines = macd(&close, 12, 26, 9);

    // Discrete encodings. NaN comparisons evaluate false, which only
    // affects warm-up rows removed by the final NaN drop.
    let signal_ma: Vec<f64> = (0..n)
        .map(|i| if ema_8[i] > ema_20[i] { 1.0 } else { 0.0 })
        .collect();
    let signal_price_above_ma: Vec<f64> = (0..n)
        .map(|i| if close[i] > ema_20[i] { 1.0 } else { 0.0 })
        .collect();
    let signal_macd: Vec<f64> = (0..n)
        .map(|i| {
            if macd_lines.macd_line[i] > macd_lines.signal_line[i] {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let signal_rsi: Vec<f64> = rsi_14
        .iter()
        .map(|&v| {
            if v <= 30.0 {
                1.0
            } else if v >= 70.0 {
                2.0
            } else {
                0.0
            }
        })
        .collect();
    let signal_bb: Vec<f64> = (0..n)
        .map(|i| {
            if close[i] <= bb.lower[i] {
                1.0
            } else if close[i] >= bb.upper[i] {
                2.0
            } else {
                0.0
            }
        })
        .collect();

    let above_own_mean = |values: &[f64]| -> Vec<f64> {
        let mean = sma(values, 14);
        values
            .iter()
            .zip(mean.iter())
            .map(|(v, m)| if v >= m { 1.0 } else { 0.0 })
            .collect()
    };
    let signal_atr = above_own_mean(&atr_14);
    let signal_obv = above_own_mean(&obv_line);
    let signal_vroc = above_own_mean(&vroc);

    let signal_mfi: Vec<f64> = mfi_14
        .iter()
        .map(|&v| {
            if v <= 20.0 {
                1.0
            } else if v >= 80.0 {
                2.0
            } else {
                0.0
            }
        })
        .collect();
    let signal_adx: Vec<f64> = (0..n)
        .map(|i| {
            if dmi.adx[i] > 20.0 {
                if dmi.plus_di[i] > dmi.minus_di[i] {
                    1.0
                } else {
                    2.0
                }
            } else {
                0.0
            }
        })
        .collect();
    let signal_cci: Vec<f64> = cci_20
        .iter()
        .map(|&v| {
            if v <= -100.0 || (v > 0.0 && v < 100.0) {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    let columns: Vec<Vec<f64>> = vec![
        open,
        high,
        low,
        close,
        volume,
        returns,
        range,
        dow,
        roc_12,
        rsi_14,
        stoch_14,
        vroc,
        cmf_20,
        mfi_14,
        obv_line,
        vwap_14,
        atr_14,
        bb.upper,
        bb.middle,
        bb.lower,
        donchian.upper,
        donchian.lower,
        donchian.middle,
        dmi.adx,
        dmi.plus_di,
        dmi.minus_di,
        cci_20,
        ema_8,
        ema_20,
        cloud.span_a,
        cloud.span_b,
        cloud.base_line,
        macd_lines.macd_line,
        macd_lines.signal_line,
        signal_ma,
        signal_price_above_ma,
        signal_macd,
        signal_rsi,
        signal_bb,
        signal_atr,
        signal_obv,
        signal_mfi,
        signal_vroc,
        signal_adx,
        signal_cci,
    ];

    let mut frame = Frame::new(feature_columns());
    for i in 0..n {
        frame.push_row(bars[i].timestamp, columns.iter().map(|c| c[i]).collect());
    }

    let frame = frame.drop_nan_rows();
    debug!(
        input_bars = n,
        feature_rows = frame.len(),
        "computed feature table"
    );
    if frame.is_empty() {
        return Err(PipelineError::InsufficientData {
            actual: n,
            required: MIN_FEATURE_ROWS,
        });
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

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

    #[test]
    fn test_fifty_bars_produce_complete_rows() {
        let frame = add_all_features(&hourly_bars(50)).unwrap();

        assert!(!frame.is_empty());
        assert_eq!(frame.n_cols(), FEATURE_COLUMNS.len());
        for row in frame.rows() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_monotonic_linear_grid_produces_complete_rows() {
        let bars: Vec<Bar> = (0..50)
            .map(|i| {
                let base = 1.10 + i as f64 * 0.001;
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: base,
                    high: base + 0.002,
                    low: base - 0.002,
                    close: base,
                    volume: 200.0,
                }
            })
            .collect();

        let frame = add_all_features(&bars).unwrap();
        assert!(!frame.is_empty());
        for name in FEATURE_COLUMNS {
            assert!(frame.has_column(name));
        }
        for row in frame.rows() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_column_order_is_fixed() {
        let frame = add_all_features(&hourly_bars(60)).unwrap();
        let expected: Vec<String> = feature_columns();
        assert_eq!(frame.columns(), expected.as_slice());
    }

    #[test]
    fn test_too_few_bars_reports_count() {
        let err = add_all_features(&hourly_bars(20)).unwrap_err();
        match err {
            PipelineError::InsufficientData { actual, required } => {
                assert_eq!(actual, 20);
                assert_eq!(required, MIN_FEATURE_ROWS);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("20"));
    }

    #[test]
    fn test_signal_columns_are_discrete() {
        let frame = add_all_features(&hourly_bars(80)).unwrap();
        for name in FEATURE_COLUMNS.iter().filter(|c| c.starts_with("Signal_")) {
            for v in frame.column(name).unwrap() {
                assert!(
                    v == 0.0 || v == 1.0 || v == 2.0,
                    "{name} produced non-discrete value {v}"
                );
            }
        }
    }

    #[test]
    fn test_dow_matches_timestamp() {
        let frame = add_all_features(&hourly_bars(60)).unwrap();
        let dow = frame.column("DOW").unwrap();
        for (ts, v) in frame.index().iter().zip(dow) {
            assert_eq!(v, ts.weekday().num_days_from_monday() as f64);
        }
    }
}
