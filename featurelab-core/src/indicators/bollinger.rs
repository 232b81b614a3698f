//! Bollinger Bands: `boll` (middle), `boll_ub`, `boll_lb`.
//!
//! Middle = SMA(close, period); bands are middle +/- k * sample stddev.
//! Lookback: period - 1.

use super::{closes, Indicator, IndicatorError};
use crate::domain::Bar;
use crate::features::rolling_mean_std;

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self { period, multiplier }
    }

    pub fn standard() -> Self {
        Self::new(20, 2.0)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        "boll"
    }

    fn outputs(&self) -> Vec<String> {
        vec!["boll".into(), "boll_ub".into(), "boll_lb".into()]
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let (middle, std) = rolling_mean_std(&closes(bars), self.period);
        let upper = middle
            .iter()
            .zip(&std)
            .map(|(m, s)| m + self.multiplier * s)
            .collect();
        let lower = middle
            .iter()
            .zip(&std)
            .map(|(m, s)| m - self.multiplier * s)
            .collect();
        Ok(vec![middle, upper, lower])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn bands_around_middle() {
        // window [1, 2, 3]: mean 2, sample std 1
        let out = Bollinger::new(3, 2.0).compute(&make_bars(&[1.0, 2.0, 3.0])).unwrap();
        assert!(out[0][1].is_nan());
        assert_approx(out[0][2], 2.0, DEFAULT_EPSILON);
        assert_approx(out[1][2], 4.0, DEFAULT_EPSILON);
        assert_approx(out[2][2], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn flat_prices_collapse_bands() {
        let out = Bollinger::standard().compute(&make_bars(&[10.0; 25])).unwrap();
        assert!(out[0][18].is_nan());
        for band in &out {
            assert_approx(band[24], 10.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn upper_never_below_lower() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64).cos() * 3.0).collect();
        let out = Bollinger::standard().compute(&make_bars(&closes)).unwrap();
        for i in 19..40 {
            assert!(out[1][i] >= out[0][i] && out[0][i] >= out[2][i]);
        }
    }
}
