//! Williams %R (`wr_{n}`).
//!
//! %R = -100 * (HH - close) / (HH - LL), in [-100, 0]. Flat range yields -50.

use super::extrema::strict_range;
use super::{Indicator, IndicatorError};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct WilliamsR {
    period: usize,
    name: String,
}

impl WilliamsR {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Williams %R period must be >= 1");
        Self {
            period,
            name: format!("wr_{period}"),
        }
    }
}

impl Indicator for WilliamsR {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let result = (0..bars.len())
            .map(|i| match strict_range(bars, i, self.period) {
                Some(_) if bars[i].close.is_nan() => f64::NAN,
                Some((hh, ll)) if hh == ll => -50.0,
                Some((hh, ll)) => -100.0 * (hh - bars[i].close) / (hh - ll),
                None => f64::NAN,
            })
            .collect();
        Ok(vec![result])
    }
}
