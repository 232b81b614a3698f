//! Calendar Annotator: weekday/month/year fields and the daily return.

use super::{FeatureError, ReturnFill};
use crate::data::frame::{dates, float_column, float_values};
use chrono::Datelike;
use polars::prelude::*;

/// Append `day_of_week` (Monday = 0 .. Sunday = 6), `month` (1-12) and `year`.
///
/// Requires a normalized `Date` column; all three outputs are Int32 with no nulls.
pub fn add_calendar_features(df: &DataFrame) -> Result<DataFrame, FeatureError> {
    let dates = dates(df)?;

    let day_of_week: Vec<i32> = dates
        .iter()
        .map(|d| d.weekday().num_days_from_monday() as i32)
        .collect();
    let month: Vec<i32> = dates.iter().map(|d| d.month() as i32).collect();
    let year: Vec<i32> = dates.iter().map(|d| d.year()).collect();

    let mut out = df.clone();
    out.with_column(Column::new("day_of_week".into(), day_of_week))?;
    out.with_column(Column::new("month".into(), month))?;
    out.with_column(Column::new("year".into(), year))?;
    Ok(out)
}

/// Append `daily_return = (close[r] - close[r-1]) / close[r-1]`.
///
/// Fails with `InvalidClose` before computing anything if `close` holds an
/// undefined value. Row 0 follows `fill`.
pub fn add_daily_return(df: &DataFrame, fill: ReturnFill) -> Result<DataFrame, FeatureError> {
    let close = float_values(df, "close")?;

    let undefined = close.iter().filter(|v| v.is_nan()).count();
    if undefined > 0 {
        return Err(FeatureError::InvalidClose { undefined });
    }

    let mut returns = vec![f64::NAN; close.len()];
    for i in 1..close.len() {
        returns[i] = (close[i] - close[i - 1]) / close[i - 1];
    }
    if let (Some(first), ReturnFill::Zero) = (returns.first_mut(), fill) {
        *first = 0.0;
    }

    let mut out = df.clone();
    out.with_column(float_column("daily_return", &returns))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::bars_to_frame;
    use crate::data::provider::RawBar;
    use chrono::NaiveDate;

    fn frame(start: NaiveDate, closes: &[f64]) -> DataFrame {
        let bars: Vec<RawBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| RawBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: Some(100),
            })
            .collect();
        bars_to_frame(&bars).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn calendar_fields_follow_the_date() {
        // 2024-01-01 is a Monday; seven days cover the whole week.
        let df = frame(monday(), &[1.0; 7]);
        let out = add_calendar_features(&df).unwrap();

        let dow: Vec<Option<i32>> = out.column("day_of_week").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(dow, (0..7).map(Some).collect::<Vec<_>>());
        assert_eq!(out.column("month").unwrap().i32().unwrap().get(0), Some(1));
        assert_eq!(out.column("year").unwrap().i32().unwrap().get(6), Some(2024));
        assert_eq!(out.column("day_of_week").unwrap().null_count(), 0);
    }

    #[test]
    fn calendar_needs_a_date_typed_column() {
        let df = DataFrame::new(vec![Column::new("date".into(), &["2024-01-01"])]).unwrap();
        assert!(matches!(
            add_calendar_features(&df),
            Err(FeatureError::Frame(_))
        ));
    }

    #[test]
    fn daily_return_with_zero_fill() {
        let df = frame(monday(), &[100.0, 110.0, 99.0]);
        let out = add_daily_return(&df, ReturnFill::Zero).unwrap();
        let r = float_values(&out, "daily_return").unwrap();
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert!((r[2] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn daily_return_with_undefined_fill() {
        let df = frame(monday(), &[100.0, 110.0]);
        let out = add_daily_return(&df, ReturnFill::Undefined).unwrap();
        assert_eq!(out.column("daily_return").unwrap().null_count(), 1);
    }

    #[test]
    fn undefined_close_aborts_return() {
        let df = frame(monday(), &[100.0, f64::NAN, 99.0]);
        let err = add_daily_return(&df, ReturnFill::Zero).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidClose { undefined: 1 }));
    }

    #[test]
    fn empty_table_gets_empty_return_column() {
        let df = frame(monday(), &[]);
        let out = add_daily_return(&df, ReturnFill::Zero).unwrap();
        assert_eq!(out.height(), 0);
        assert!(out.column("daily_return").is_ok());
    }
}
