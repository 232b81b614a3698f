//! MACD: fast EMA minus slow EMA, its signal line, and the histogram.
//!
//! Outputs `macd`, `macds`, `macdh`. Standard spans are 12/26/9.
//! Lookback: slow - 1 for the line, slow + signal - 2 for the signal.

use super::ema::ema_of_series;
use super::{closes, Indicator, IndicatorError};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD spans must be >= 1");
        assert!(fast < slow, "MACD fast span must be shorter than slow span");
        Self { fast, slow, signal }
    }

    pub fn standard() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn outputs(&self) -> Vec<String> {
        vec!["macd".into(), "macds".into(), "macdh".into()]
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let close = closes(bars);
        let fast = ema_of_series(&close, self.fast);
        let slow = ema_of_series(&close, self.slow);

        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

        Ok(vec![line, signal, histogram])
    }
}
