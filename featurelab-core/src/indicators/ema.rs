//! Exponential Moving Average (`ema_{n}`).
//!
//! alpha = 2 / (span + 1), seeded with the SMA of the first `span` defined
//! values. Lookback: span - 1.

use super::{closes, Indicator, IndicatorError};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.span - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        Ok(vec![ema_of_series(&closes(bars), self.span)])
    }
}

/// EMA over an arbitrary series.
///
/// Leading NaNs are skipped so derived series (the MACD line) can be smoothed
/// again. A NaN inside the seed window or after it ends the series.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if span == 0 {
        return result;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = start + span;
    if seed_end > n {
        return result;
    }
    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }

    let mut prev = seed_window.iter().sum::<f64>() / span as f64;
    result[seed_end - 1] = prev;

    let alpha = 2.0 / (span as f64 + 1.0);
    for i in seed_end..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}
