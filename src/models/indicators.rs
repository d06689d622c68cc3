//! Technical indicators computed from a close-price column
//!
//! # Absence Convention
//! **CRITICAL**: an indicator that lacks history is *absent* (`None`), never a
//! fabricated zero. Callers drop absent indicators from classification.
//!
//! # EMA Seeding
//! Two EMA variants are used on purpose:
//! - [`calculate_ema`]: seeded with the SMA of the first `period` closes.
//!   Used by the per-period EMA indicators, the Bollinger middle band and the
//!   9/21 crossover.
//! - [`calculate_ema_continuous`]: seeded with the first value (`adjust=false`).
//!   Used inside MACD.

use serde::{Deserialize, Serialize};

/// Calculate Simple Moving Average for a given period
///
/// # Arguments
/// * `values` - Slice of values, oldest first
/// * `period` - Window length
///
/// # Returns
/// * Vector aligned with `values`; `None` until a full window is available
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut ma_values = vec![None; values.len()];

    if period == 0 || values.len() < period {
        return ma_values;
    }

    for i in (period - 1)..values.len() {
        let start_idx = i + 1 - period;
        let sum: f64 = values[start_idx..=i].iter().sum();
        ma_values[i] = Some(sum / period as f64);
    }

    ma_values
}

/// Calculate an SMA-seeded Exponential Moving Average
///
/// Index `period - 1` holds the mean of the first `period` values; after that
/// `ema[i] = (value[i] - ema[i-1]) * 2/(period+1) + ema[i-1]`.
///
/// When the series is shorter than `period` the continuously-seeded EMA over
/// the whole series is returned instead, so every index is populated.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.is_empty() {
        return vec![None; values.len()];
    }

    if values.len() < period {
        return calculate_ema_continuous(values, period)
            .into_iter()
            .map(Some)
            .collect();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = vec![None; values.len()];

    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    ema_values[period - 1] = Some(prev);

    for i in period..values.len() {
        let ema = (values[i] - prev) * multiplier + prev;
        ema_values[i] = Some(ema);
        prev = ema;
    }

    ema_values
}

/// Calculate a continuously-seeded Exponential Moving Average
///
/// `ema[0] = value[0]`, `ema[i] = a * value[i] + (1 - a) * ema[i-1]` with
/// `a = 2/(period+1)`. Defined at every index.
pub fn calculate_ema_continuous(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(values.len());

    let mut prev: Option<f64> = None;
    for &value in values {
        let ema = match prev {
            None => value,
            Some(p) => alpha * value + (1.0 - alpha) * p,
        };
        ema_values.push(ema);
        prev = Some(ema);
    }

    ema_values
}

/// Sample standard deviation (n - 1 denominator) of a window
fn sample_std(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Calculate Relative Strength Index over the most recent `period` deltas
///
/// Average gain and loss are simple means of the positive and negative
/// close-to-close deltas (not Wilder smoothing).
///
/// # Returns
/// * `None` when fewer than `period + 1` closes are available, or when the
///   window has no movement at all
/// * `Some(100.0)` when the window has gains but no losses
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (mut gains, mut losses) = (0.0, 0.0);
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { None } else { Some(100.0) };
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Bollinger Bands around an EMA middle band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands for the latest bar
///
/// The middle band is the SMA-seeded EMA(period), not an SMA. Bands are
/// `middle ± k * stddev` where stddev is the sample deviation of the last
/// `period` closes.
pub fn calculate_bollinger_bands(closes: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    if period < 2 || closes.len() < period {
        return None;
    }

    let middle = calculate_ema(closes, period).last().copied().flatten()?;
    let std = sample_std(&closes[closes.len() - period..])?;

    Some(BollingerBands {
        upper: middle + k * std,
        middle,
        lower: middle - k * std,
    })
}

/// MACD values for the latest bar plus the previous bar's line and signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub prev_macd_line: Option<f64>,
    pub prev_signal_line: Option<f64>,
}

/// Calculate MACD with continuously-seeded EMAs
///
/// `macd_line = EMA(fast) - EMA(slow)`, `signal_line = EMA(signal)` of the
/// line, `histogram = macd_line - signal_line`. Requires `slow` closes.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow.max(fast) {
        return None;
    }

    let fast_ema = calculate_ema_continuous(closes, fast);
    let slow_ema = calculate_ema_continuous(closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_ema = calculate_ema_continuous(&line, signal);

    let n = line.len();
    let (prev_macd_line, prev_signal_line) = if n >= 2 {
        (Some(line[n - 2]), Some(signal_ema[n - 2]))
    } else {
        (None, None)
    };

    Some(Macd {
        macd_line: line[n - 1],
        signal_line: signal_ema[n - 1],
        histogram: line[n - 1] - signal_ema[n - 1],
        prev_macd_line,
        prev_signal_line,
    })
}

/// Fast/slow EMA pair for the latest bar plus the previous bar when defined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaCrossover {
    pub fast: f64,
    pub slow: f64,
    pub prev_fast: Option<f64>,
    pub prev_slow: Option<f64>,
}

impl EmaCrossover {
    pub fn crossed_above(&self) -> bool {
        match (self.prev_fast, self.prev_slow) {
            (Some(pf), Some(ps)) => pf <= ps && self.fast > self.slow,
            _ => false,
        }
    }

    pub fn crossed_below(&self) -> bool {
        match (self.prev_fast, self.prev_slow) {
            (Some(pf), Some(ps)) => pf >= ps && self.fast < self.slow,
            _ => false,
        }
    }
}

/// Calculate the dual EMA crossover state using SMA-seeded EMAs
///
/// With exactly `slow` closes the previous slow EMA is undefined, so no
/// crossover can be reported on that bar.
pub fn calculate_ema_crossover(closes: &[f64], fast: usize, slow: usize) -> Option<EmaCrossover> {
    if fast == 0 || slow == 0 || closes.len() < slow.max(fast) {
        return None;
    }

    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);
    let n = closes.len();

    let (prev_fast, prev_slow) = if n >= 2 {
        (fast_ema[n - 2], slow_ema[n - 2])
    } else {
        (None, None)
    };

    Some(EmaCrossover {
        fast: fast_ema[n - 1]?,
        slow: slow_ema[n - 1]?,
        prev_fast,
        prev_slow,
    })
}
