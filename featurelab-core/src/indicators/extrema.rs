//! Rolling lowest low / highest high (`low_{n}`, `high_{n}`).
//!
//! Unlike the other windows these need only one defined observation, so the
//! first rows of the table carry the running extreme so far. NaN entries are
//! ignored; a window with no defined value yields NaN.

use super::{Indicator, IndicatorError};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Low,
    High,
}

#[derive(Debug, Clone)]
pub struct RollingExtreme {
    period: usize,
    kind: Extreme,
    name: String,
}

impl RollingExtreme {
    pub fn new(kind: Extreme, period: usize) -> Self {
        assert!(period >= 1, "rolling extreme period must be >= 1");
        let prefix = match kind {
            Extreme::Low => "low",
            Extreme::High => "high",
        };
        Self {
            period,
            kind,
            name: format!("{prefix}_{period}"),
        }
    }

    pub fn lowest_low(period: usize) -> Self {
        Self::new(Extreme::Low, period)
    }

    pub fn highest_high(period: usize) -> Self {
        Self::new(Extreme::High, period)
    }
}

impl Indicator for RollingExtreme {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError> {
        let values: Vec<f64> = match self.kind {
            Extreme::Low => bars.iter().map(|b| b.low).collect(),
            Extreme::High => bars.iter().map(|b| b.high).collect(),
        };
        let result = (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(self.period);
                let defined = values[start..=i].iter().copied().filter(|v| !v.is_nan());
                let folded = match self.kind {
                    Extreme::Low => defined.fold(f64::INFINITY, f64::min),
                    Extreme::High => defined.fold(f64::NEG_INFINITY, f64::max),
                };
                if folded.is_infinite() {
                    f64::NAN
                } else {
                    folded
                }
            })
            .collect();
        Ok(vec![result])
    }
}

/// Highest high and lowest low over the strict window ending at `i`.
/// Returns `None` if the window is incomplete or touches a NaN.
pub(crate) fn strict_range(bars: &[Bar], i: usize, period: usize) -> Option<(f64, f64)> {
    if period == 0 || i + 1 < period {
        return None;
    }
    let window = &bars[i + 1 - period..=i];
    if window.iter().any(|b| b.high.is_nan() || b.low.is_nan()) {
        return None;
    }
    let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((hh, ll))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_hlc_bars, DEFAULT_EPSILON};

    #[test]
    fn low_uses_partial_window_at_start() {
        let bars = make_hlc_bars(&[(10.0, 5.0, 8.0), (11.0, 6.0, 9.0), (12.0, 4.0, 9.0), (13.0, 7.0, 9.0)]);
        let lows = RollingExtreme::lowest_low(2).compute(&bars).unwrap().remove(0);
        assert_approx(lows[0], 5.0, DEFAULT_EPSILON);
        assert_approx(lows[1], 5.0, DEFAULT_EPSILON);
        assert_approx(lows[2], 4.0, DEFAULT_EPSILON);
        assert_approx(lows[3], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn high_ignores_nan() {
        let bars = make_hlc_bars(&[(10.0, 5.0, 8.0), (f64::NAN, 6.0, 9.0), (9.0, 4.0, 9.0)]);
        let highs = RollingExtreme::highest_high(14).compute(&bars).unwrap().remove(0);
        assert_approx(highs[1], 10.0, DEFAULT_EPSILON);
        assert_approx(highs[2], 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn all_nan_window_is_nan() {
        let bars = make_hlc_bars(&[(f64::NAN, f64::NAN, 1.0)]);
        let lows = RollingExtreme::lowest_low(3).compute(&bars).unwrap().remove(0);
        assert!(lows[0].is_nan());
    }

    #[test]
    fn names() {
        assert_eq!(RollingExtreme::lowest_low(14).name(), "low_14");
        assert_eq!(RollingExtreme::highest_high(14).name(), "high_14");
    }

    #[test]
    fn strict_range_requires_full_window() {
        let bars = make_hlc_bars(&[(10.0, 5.0, 8.0), (11.0, 6.0, 9.0)]);
        assert_eq!(strict_range(&bars, 0, 2), None);
        assert_eq!(strict_range(&bars, 1, 2), Some((11.0, 5.0)));
    }
}
