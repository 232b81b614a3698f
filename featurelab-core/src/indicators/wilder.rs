//! True range and Wilder smoothing, shared by ADX.

use crate::domain::Bar;

/// True range per bar.
///
/// TR[0] is NaN because there is no previous close.
/// TR[t] = max(high-low, |high-prev_close|, |low-prev_close|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.high.is_nan() || cur.low.is_nan() || prev.close.is_nan() {
            continue;
        }
        tr[i + 1] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
    }
    tr
}

/// Wilder smoothing (alpha = 1/period).
///
/// Seeded with the mean of the first run of `period` consecutive defined
/// values; the seed lands on the last index of that run. A NaN after the
/// seed ends the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        run = if v.is_nan() { 0 } else { run + 1 };
        if run == period {
            seed_end = Some(i + 1);
            break;
        }
    }
    let Some(seed_end) = seed_end else {
        return result;
    };

    let mut prev = values[seed_end - period..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = prev;

    let alpha = 1.0 / period as f64;
    for i in seed_end..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_hlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_previous_close_gap() {
        let bars = make_hlc_bars(&[(10.0, 8.0, 9.0), (15.0, 12.0, 14.0), (14.5, 13.5, 14.0)]);
        let tr = true_range(&bars);
        assert!(tr[0].is_nan());
        // gap up: |15 - 9| = 6 beats 15 - 12 = 3
        assert_approx(tr[1], 6.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_seed_is_mean_of_first_run() {
        let result = wilder_smooth(&[f64::NAN, 2.0, 4.0, 6.0, 8.0], 3);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 4.0, DEFAULT_EPSILON);
        // 8/3 + 4 * 2/3
        assert_approx(result[4], 8.0 / 3.0 + 4.0 * 2.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_nan_after_seed_ends_series() {
        let result = wilder_smooth(&[1.0, 1.0, f64::NAN, 1.0], 2);
        assert_approx(result[1], 1.0, DEFAULT_EPSILON);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn wilder_too_short() {
        assert!(wilder_smooth(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
    }
}
