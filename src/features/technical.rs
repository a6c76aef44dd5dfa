//! Technical indicators
//!
//! Every function returns a vector the same length as its input, with NaN
//! for positions inside the indicator's warm-up window. The feature engine
//! drops warm-up rows in one pass after all columns are assembled.

/// Fractional change over `periods` steps
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    for i in periods..values.len() {
        if values[i - periods] != 0.0 {
            result[i] = (values[i] - values[i - periods]) / values[i - periods];
        }
    }
    result
}

/// Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![f64::NAN; values.len()];
    }

    let mut result = vec![f64::NAN; period - 1];
    for i in (period - 1)..values.len() {
        let sum: f64 = values[(i + 1 - period)..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first window
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = vec![f64::NAN; values.len()];

    if values.len() >= period {
        let initial_sma: f64 = values[..period].iter().sum::<f64>() / period as f64;
        result[period - 1] = initial_sma;

        for i in period..values.len() {
            result[i] = (values[i] - result[i - 1]) * multiplier + result[i - 1];
        }
    }

    result
}

/// Rolling maximum over a trailing window, valid once `min_periods`
/// observations are available
pub fn rolling_max(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    for i in 0..values.len() {
        if i + 1 >= min_periods {
            let start = (i + 1).saturating_sub(window);
            result[i] = values[start..=i].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        }
    }
    result
}

/// Rolling minimum over a trailing window, valid once `min_periods`
/// observations are available
pub fn rolling_min(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    for i in 0..values.len() {
        if i + 1 >= min_periods {
            let start = (i + 1).saturating_sub(window);
            result[i] = values[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);
        }
    }
    result
}

/// Relative Strength Index with Wilder smoothing
pub fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.len() < period + 1 {
        return vec![f64::NAN; prices.len()];
    }

    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());
    gains.push(0.0);
    losses.push(0.0);

    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut result = vec![f64::NAN; prices.len()];
    let mut avg_gain: f64 = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[1..=period].iter().sum::<f64>() / period as f64;

    for i in period..prices.len() {
        if i > period {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        }

        if avg_loss == 0.0 {
            result[i] = 100.0;
        } else {
            let rs = avg_gain / avg_loss;
            result[i] = 100.0 - (100.0 / (1.0 + rs));
        }
    }

    result
}

/// Stochastic oscillator %K
pub fn stochastic_k(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; close.len()];
    if close.len() < period {
        return result;
    }

    for i in (period - 1)..close.len() {
        let start = i + 1 - period;
        let highest = high[start..=i].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lowest = low[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);

        if highest != lowest {
            result[i] = (close[i] - lowest) / (highest - lowest) * 100.0;
        } else {
            result[i] = 50.0;
        }
    }
    result
}

/// Price Rate of Change, in percent
pub fn roc(prices: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; prices.len()];
    for i in period..prices.len() {
        if prices[i - period] != 0.0 {
            result[i] = (prices[i] - prices[i - period]) / prices[i - period] * 100.0;
        }
    }
    result
}

/// Chaikin Money Flow
pub fn cmf(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut mf_volume = vec![0.0; n];
    for i in 0..n {
        let range = high[i] - low[i];
        if range != 0.0 {
            let multiplier = ((close[i] - low[i]) - (high[i] - close[i])) / range;
            mf_volume[i] = multiplier * volume[i];
        }
    }

    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    for i in (period - 1)..n {
        let start = i + 1 - period;
        let vol_sum: f64 = volume[start..=i].iter().sum();
        if vol_sum != 0.0 {
            result[i] = mf_volume[start..=i].iter().sum::<f64>() / vol_sum;
        }
    }
    result
}

/// Money Flow Index
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    if n < period + 1 {
        return vec![f64::NAN; n];
    }

    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let money_flow: Vec<f64> = (0..n).map(|i| typical[i] * volume[i]).collect();

    let mut result = vec![f64::NAN; n];
    for i in period..n {
        let mut positive = 0.0;
        let mut negative = 0.0;

        for j in (i - period + 1)..=i {
            if typical[j] > typical[j - 1] {
                positive += money_flow[j];
            } else if typical[j] < typical[j - 1] {
                negative += money_flow[j];
            }
        }

        if negative != 0.0 {
            let ratio = positive / negative;
            result[i] = 100.0 - (100.0 / (1.0 + ratio));
        } else {
            result[i] = 100.0;
        }
    }
    result
}

/// On-Balance Volume, cumulative from the first bar
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    if close.is_empty() {
        return vec![];
    }

    let mut result = vec![volume[0]];
    for i in 1..close.len() {
        let prev = result[i - 1];
        let next = if close[i] > close[i - 1] {
            prev + volume[i]
        } else if close[i] < close[i - 1] {
            prev - volume[i]
        } else {
            prev
        };
        result.push(next);
    }
    result
}

/// Rolling Volume-Weighted Average Price of the typical price
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();

    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    for i in (period - 1)..n {
        let start = i + 1 - period;
        let vol_sum: f64 = volume[start..=i].iter().sum();
        if vol_sum != 0.0 {
            let weighted: f64 = (start..=i).map(|j| typical[j] * volume[j]).sum();
            result[i] = weighted / vol_sum;
        }
    }
    result
}

/// Average True Range with Wilder smoothing, seeded by the SMA of the
/// first `period` true ranges
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    let mut tr = vec![high[0] - low[0]];
    for i in 1..n {
        let high_low = high[i] - low[i];
        let high_close = (high[i] - close[i - 1]).abs();
        let low_close = (low[i] - close[i - 1]).abs();
        tr.push(high_low.max(high_close).max(low_close));
    }

    result[period - 1] = tr[..period].iter().sum::<f64>() / period as f64;
    for i in period..n {
        result[i] = (result[i - 1] * (period - 1) as f64 + tr[i]) / period as f64;
    }
    result
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(prices: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let middle = sma(prices, period);
    let mut upper = vec![f64::NAN; prices.len()];
    let mut lower = vec![f64::NAN; prices.len()];

    if prices.len() >= period {
        for i in (period - 1)..prices.len() {
            let slice = &prices[(i + 1 - period)..=i];
            let mean = middle[i];
            let variance: f64 =
                slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
            let std_dev = variance.sqrt();

            upper[i] = mean + num_std * std_dev;
            lower[i] = mean - num_std * std_dev;
        }
    }

    BollingerBands { upper, middle, lower }
}

/// Donchian Channel
pub struct DonchianChannel {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn donchian_channel(high: &[f64], low: &[f64], period: usize) -> DonchianChannel {
    let upper = rolling_max(high, period, period);
    let lower = rolling_min(low, period, period);
    let middle = upper
        .iter()
        .zip(lower.iter())
        .map(|(u, l)| (u + l) / 2.0)
        .collect();

    DonchianChannel { upper, middle, lower }
}

/// Average Directional Index with directional indicators
pub struct AdxResult {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

/// ADX with Wilder smoothing; ADX values stabilize after roughly two
/// full periods
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> AdxResult {
    let n = close.len();
    let mut result = AdxResult {
        adx: vec![f64::NAN; n],
        plus_di: vec![f64::NAN; n],
        minus_di: vec![f64::NAN; n],
    };
    if n < 2 * period {
        return result;
    }

    let mut tr = vec![0.0; n];
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];

    tr[0] = high[0] - low[0];
    for i in 1..n {
        let high_low = high[i] - low[i];
        let high_close = (high[i] - close[i - 1]).abs();
        let low_close = (low[i] - close[i - 1]).abs();
        tr[i] = high_low.max(high_close).max(low_close);

        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    // Wilder running sums, seeded over the first full period
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut dx = vec![f64::NAN; n];

    for i in period..n {
        if i > period {
            s_tr = s_tr - s_tr / period as f64 + tr[i];
            s_plus = s_plus - s_plus / period as f64 + plus_dm[i];
            s_minus = s_minus - s_minus / period as f64 + minus_dm[i];
        }

        let (plus_di, minus_di) = if s_tr != 0.0 {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        } else {
            (0.0, 0.0)
        };
        result.plus_di[i] = plus_di;
        result.minus_di[i] = minus_di;

        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum != 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };
    }

    let seed = 2 * period - 1;
    result.adx[seed] = dx[period..=seed].iter().sum::<f64>() / period as f64;
    for i in (seed + 1)..n {
        result.adx[i] = (result.adx[i - 1] * (period - 1) as f64 + dx[i]) / period as f64;
    }

    result
}

/// Commodity Channel Index
pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let typical: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let sma_tp = sma(&typical, period);

    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }

    for i in (period - 1)..n {
        let slice = &typical[(i + 1 - period)..=i];
        let mean = sma_tp[i];
        let mean_deviation: f64 =
            slice.iter().map(|x| (x - mean).abs()).sum::<f64>() / period as f64;

        if mean_deviation != 0.0 {
            result[i] = (typical[i] - mean) / (0.015 * mean_deviation);
        }
    }
    result
}

/// Ichimoku cloud components (no forward displacement)
pub struct Ichimoku {
    pub span_a: Vec<f64>,
    pub span_b: Vec<f64>,
    pub base_line: Vec<f64>,
}

/// Ichimoku with the usual conversion/base/span-B windows. Span B keeps its
/// long trailing window but becomes valid once `base` observations exist,
/// so the cloud does not consume more warm-up than the base line.
pub fn ichimoku(
    high: &[f64],
    low: &[f64],
    conversion: usize,
    base: usize,
    span_b_window: usize,
) -> Ichimoku {
    let midline = |window: usize, min_periods: usize| -> Vec<f64> {
        let highs = rolling_max(high, window, min_periods);
        let lows = rolling_min(low, window, min_periods);
        highs
            .iter()
            .zip(lows.iter())
            .map(|(h, l)| (h + l) / 2.0)
            .collect::<Vec<f64>>()
    };

    let conversion_line = midline(conversion, conversion);
    let base_line = midline(base, base);
    let span_a = conversion_line
        .iter()
        .zip(base_line.iter())
        .map(|(c, b)| (c + b) / 2.0)
        .collect();
    let span_b = midline(span_b_window, base);

    Ichimoku {
        span_a,
        span_b,
        base_line,
    }
}

/// MACD line and signal line
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
}

pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    let fast_ema = ema(prices, fast);
    let slow_ema = ema(prices, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    // Signal line is an EMA over the valid region of the MACD line
    let valid: Vec<f64> = macd_line.iter().filter(|x| !x.is_nan()).copied().collect();
    let signal_ema = ema(&valid, signal);

    let mut signal_line = vec![f64::NAN; macd_line.len()];
    let mut valid_idx = 0;
    for i in 0..macd_line.len() {
        if !macd_line[i].is_nan() {
            if valid_idx < signal_ema.len() {
                signal_line[i] = signal_ema[valid_idx];
            }
            valid_idx += 1;
        }
    }

    MacdResult {
        macd_line,
        signal_line,
    }
}
