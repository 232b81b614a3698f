//! Stochastic oscillator (`stoch_k`, `stoch_d`).
//!
//! %K = 100 * (close - LL) / (HH - LL) over `period` bars; a flat range
//! yields 50. %D is the SMA of %K over `smooth` bars.

use super::extrema::strict_range;
use super::sma::sma_of_series;
use super::{Indicator, IndicatorError};
use crate::domain::Bar;

/// Which line of the oscillator to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    smooth: usize,
    line: StochLine,
}

impl Stochastic {
    pub fn new(line: StochLine, period: usize, smooth: usize) -> Self {
        assert!(period >= 1 && smooth >= 1, "stochastic periods must be >= 1");
        Self {
            period,
            smooth,
            line,
        }
    }

    pub fn k() -> Self {
        Self::new(StochLine::K, 14, 3)
    }

    pub fn d() -> Self {
        Self::new(StochLine::D, 14, 3)
    }

    fn percent_k(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| match strict_range(bars, i, self.period) {
                Some(_) if bars[i].close.is_nan() => f64::NAN,
                Some((hh, ll)) if hh == ll => 50.0,
                Some((hh, ll)) => 100.0 * (bars[i].close - ll) / (hh - ll),
                None => f64::NAN,
            })
            .collect()
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        match self.line {
            StochLine::K => "stoch_k",
            StochLine::D => "stoch_d",
        }
    }

    fn lookback(&self) -> usize {
        match self.line {
            StochLine::K => self.period - 1,
            StochLine::D => self.period + self.smooth - 2,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let k = self.percent_k(bars);
        Ok(match self.line {
            StochLine::K => vec![k],
            StochLine::D => vec![sma_of_series(&k, self.smooth)],
        })
    }
}
