//! Average Directional Index (`adx`) and its rating (`adxr`), Wilder style.
//!
//! +DM/-DM and true range are Wilder-smoothed into +DI/-DI, DX is their
//! normalized spread, ADX is smoothed DX. ADXR averages ADX with its value
//! `period` bars earlier. Lookback: 2 * period - 1 for ADX.

use super::wilder::{true_range, wilder_smooth};
use super::{Indicator, IndicatorError};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self { period }
    }

    fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        let n = bars.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let (prev, cur) = (&bars[i - 1], &bars[i]);
            if cur.high.is_nan() || cur.low.is_nan() || prev.high.is_nan() || prev.low.is_nan() {
                continue;
            }
            let up = cur.high - prev.high;
            let down = prev.low - cur.low;
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }
        (plus_dm, minus_dm)
    }
}

impl Default for Adx {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        "adx"
    }

    fn outputs(&self) -> Vec<String> {
        vec!["adx".into(), "adxr".into()]
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let n = bars.len();
        let (plus_dm, minus_dm) = Self::directional_movement(bars);
        let smooth_tr = wilder_smooth(&true_range(bars), self.period);
        let smooth_plus = wilder_smooth(&plus_dm, self.period);
        let smooth_minus = wilder_smooth(&minus_dm, self.period);

        let dx: Vec<f64> = (0..n)
            .map(|i| {
                let tr = smooth_tr[i];
                if tr.is_nan() || tr == 0.0 || smooth_plus[i].is_nan() || smooth_minus[i].is_nan() {
                    return f64::NAN;
                }
                let plus_di = 100.0 * smooth_plus[i] / tr;
                let minus_di = 100.0 * smooth_minus[i] / tr;
                let di_sum = plus_di + minus_di;
                if di_sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / di_sum
                }
            })
            .collect();

        let adx = wilder_smooth(&dx, self.period);
        let adxr = (0..n)
            .map(|i| {
                if i < self.period {
                    f64::NAN
                } else {
                    (adx[i] + adx[i - self.period]) / 2.0
                }
            })
            .collect();

        Ok(vec![adx, adxr])
    }
}
