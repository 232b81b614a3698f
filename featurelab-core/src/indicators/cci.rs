//! Commodity Channel Index (`cci_{n}`).
//!
//! CCI = (TP - SMA(TP)) / (0.015 * mean deviation), TP = (H + L + C) / 3.
//! A window with zero mean deviation yields 0. Lookback: period - 1.

use super::sma::sma_of_series;
use super::{Indicator, IndicatorError};
use crate::domain::Bar;

const LAMBERT_CONSTANT: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
    name: String,
}

impl Cci {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "CCI period must be >= 1");
        Self {
            period,
            name: format!("cci_{period}"),
        }
    }
}

impl Indicator for Cci {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let tp: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
        let mean = sma_of_series(&tp, self.period);

        let result = (0..tp.len())
            .map(|i| {
                if mean[i].is_nan() {
                    return f64::NAN;
                }
                let window = &tp[i + 1 - self.period..=i];
                let deviation =
                    window.iter().map(|v| (v - mean[i]).abs()).sum::<f64>() / self.period as f64;
                if deviation == 0.0 {
                    0.0
                } else {
                    (tp[i] - mean[i]) / (LAMBERT_CONSTANT * deviation)
                }
            })
            .collect();
        Ok(vec![result])
    }
}
