//! Rolling mean and sample standard deviation over a trailing window.

use super::FeatureError;
use crate::data::frame::{float_column, float_values};
use polars::prelude::*;

/// Append `{column}_rolling_mean` and `{column}_rolling_std`.
///
/// Row `r` covers rows `r - window + 1 ..= r` and is undefined until the
/// window is full or when any value in it is undefined. The standard
/// deviation uses ddof = 1, so `window == 1` yields an all-undefined std
/// column.
pub fn calculate_rolling_statistics(
    df: &DataFrame,
    column: &str,
    window: usize,
) -> Result<DataFrame, FeatureError> {
    if window == 0 {
        return Err(FeatureError::InvalidParameter {
            name: "window",
            value: window,
        });
    }

    let values = float_values(df, column)?;
    let (mean, std) = rolling_mean_std(&values, window);

    let mut out = df.clone();
    out.with_column(float_column(&format!("{column}_rolling_mean"), &mean))?;
    out.with_column(float_column(&format!("{column}_rolling_std"), &std))?;
    Ok(out)
}

/// Trailing-window mean and sample standard deviation (ddof = 1).
///
/// Both outputs are NaN for the first `window - 1` rows and for any window
/// containing NaN. The std is NaN everywhere when `window < 2`.
pub fn rolling_mean_std(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut mean = vec![f64::NAN; n];
    let mut std = vec![f64::NAN; n];

    if window == 0 || n < window {
        return (mean, std);
    }

    for i in (window - 1)..n {
        let slice = &values[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }

        let m = slice.iter().sum::<f64>() / window as f64;
        mean[i] = m;

        if window > 1 {
            let ss: f64 = slice.iter().map(|v| (v - m) * (v - m)).sum();
            std[i] = (ss / (window - 1) as f64).sqrt();
        }
    }

    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn close_frame(values: &[f64]) -> DataFrame {
        DataFrame::new(vec![Column::new("close".into(), values)]).unwrap()
    }

    #[test]
    fn rolling_mean_and_std_window_3() {
        let df = close_frame(&[10.0, 12.0, 11.0, 14.0, 16.0, 15.0, 18.0, 20.0]);
        let out = calculate_rolling_statistics(&df, "close", 3).unwrap();

        let mean = float_values(&out, "close_rolling_mean").unwrap();
        let std = float_values(&out, "close_rolling_std").unwrap();

        assert_eq!(out.height(), 8);
        assert!(mean[0].is_nan() && mean[1].is_nan());
        assert!((mean[2] - 11.0).abs() < EPS);
        assert!((mean[7] - 53.0 / 3.0).abs() < EPS);
        // sample std of (10, 12, 11) = 1.0
        assert!((std[2] - 1.0).abs() < EPS);
        // sample std of (14, 16, 15) = 1.0
        assert!((std[5] - 1.0).abs() < EPS);
        assert_eq!(out.column("close_rolling_mean").unwrap().null_count(), 2);
        assert_eq!(out.column("close_rolling_std").unwrap().null_count(), 2);
    }

    #[test]
    fn window_of_one_has_undefined_std() {
        let df = close_frame(&[1.0, 2.0, 3.0]);
        let out = calculate_rolling_statistics(&df, "close", 1).unwrap();
        assert_eq!(float_values(&out, "close_rolling_mean").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(out.column("close_rolling_std").unwrap().null_count(), 3);
    }

    #[test]
    fn table_shorter_than_window_is_all_undefined() {
        let df = close_frame(&[10.0, 12.0]);
        let out = calculate_rolling_statistics(&df, "close", 3).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.column("close_rolling_mean").unwrap().null_count(), 2);
        assert_eq!(out.column("close_rolling_std").unwrap().null_count(), 2);
    }

    #[test]
    fn empty_table_gets_empty_columns() {
        let df = close_frame(&[]);
        let out = calculate_rolling_statistics(&df, "close", 3).unwrap();
        assert_eq!(out.height(), 0);
        assert!(out.column("close_rolling_mean").is_ok());
        assert!(out.column("close_rolling_std").is_ok());
    }

    #[test]
    fn undefined_value_poisons_its_windows() {
        let (mean, _) = rolling_mean_std(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(mean[1].is_nan());
        assert!(mean[2].is_nan());
        assert!((mean[3] - 3.5).abs() < EPS);
    }

    #[test]
    fn zero_window_is_rejected() {
        let df = close_frame(&[1.0]);
        assert!(matches!(
            calculate_rolling_statistics(&df, "close", 0),
            Err(FeatureError::InvalidParameter { name: "window", .. })
        ));
    }
}
