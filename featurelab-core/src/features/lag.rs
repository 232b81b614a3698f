//! Lag features: `{column}_lag_{i}` holds the value `i` rows earlier.

use super::FeatureError;
use crate::data::frame::{float_column, float_values};
use polars::prelude::*;

/// Append `{column}_lag_1` ..= `{column}_lag_{lag_days}`.
///
/// Row `r` of `{column}_lag_{i}` is `column[r - i]`, undefined for `r < i`.
/// An empty table gets the new columns with zero rows.
pub fn create_lag_features(
    df: &DataFrame,
    column: &str,
    lag_days: usize,
) -> Result<DataFrame, FeatureError> {
    if lag_days == 0 {
        return Err(FeatureError::InvalidParameter {
            name: "lag_days",
            value: lag_days,
        });
    }

    let values = float_values(df, column)?;
    let mut out = df.clone();

    for lag in 1..=lag_days {
        out.with_column(float_column(
            &format!("{column}_lag_{lag}"),
            &shift(&values, lag),
        ))?;
    }

    Ok(out)
}

fn shift(values: &[f64], lag: usize) -> Vec<f64> {
    let n = values.len();
    let mut shifted = vec![f64::NAN; n];
    if lag < n {
        shifted[lag..].copy_from_slice(&values[..n - lag]);
    }
    shifted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::float_values;

    fn close_frame(values: &[f64]) -> DataFrame {
        DataFrame::new(vec![Column::new("close".into(), values)]).unwrap()
    }

    fn assert_series(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            if e.is_nan() {
                assert!(a.is_nan(), "expected undefined at row {i}, got {a}");
            } else {
                assert_eq!(a, e, "row {i}");
            }
        }
    }

    #[test]
    fn lag_columns_shift_values() {
        let df = close_frame(&[10.0, 12.0, 15.0, 14.0, 16.0]);
        let out = create_lag_features(&df, "close", 2).unwrap();

        assert_eq!(out.height(), 5);
        assert_series(
            &float_values(&out, "close_lag_1").unwrap(),
            &[f64::NAN, 10.0, 12.0, 15.0, 14.0],
        );
        assert_series(
            &float_values(&out, "close_lag_2").unwrap(),
            &[f64::NAN, f64::NAN, 10.0, 12.0, 15.0],
        );
        assert_eq!(out.column("close_lag_2").unwrap().null_count(), 2);
    }

    #[test]
    fn lag_on_empty_table_adds_empty_columns() {
        let df = close_frame(&[]);
        let out = create_lag_features(&df, "close", 3).unwrap();
        assert_eq!(out.height(), 0);
        for i in 1..=3 {
            assert!(out.column(&format!("close_lag_{i}")).is_ok());
        }
    }

    #[test]
    fn lag_longer_than_table_is_all_undefined() {
        let df = close_frame(&[1.0, 2.0]);
        let out = create_lag_features(&df, "close", 3).unwrap();
        assert_eq!(out.column("close_lag_3").unwrap().null_count(), 2);
    }

    #[test]
    fn integer_source_gives_float_lags() {
        let df = DataFrame::new(vec![Column::new("volume".into(), &[100u64, 200, 300])]).unwrap();
        let out = create_lag_features(&df, "volume", 1).unwrap();
        assert_eq!(out.column("volume").unwrap().dtype(), &DataType::UInt64);
        assert_eq!(out.column("volume_lag_1").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn input_table_is_untouched() {
        let df = close_frame(&[1.0, 2.0, 3.0]);
        let _ = create_lag_features(&df, "close", 2).unwrap();
        assert_eq!(df.width(), 1);
    }

    #[test]
    fn zero_lag_days_is_rejected() {
        let df = close_frame(&[1.0]);
        assert!(matches!(
            create_lag_features(&df, "close", 0),
            Err(FeatureError::InvalidParameter { name: "lag_days", .. })
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let df = close_frame(&[1.0]);
        let err = create_lag_features(&df, "volume", 1).unwrap_err();
        assert!(err.to_string().contains("volume"));
    }
}
