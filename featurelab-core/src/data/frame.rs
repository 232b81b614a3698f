//! Conversion between bars and polars frames.
//!
//! The feature table is a polars `DataFrame`. Undefined values are stored as
//! nulls; the numeric helpers here map nulls to `f64::NAN` on the way out and
//! NaN back to null on the way in, so every stage agrees on one notion of
//! "missing".

use super::provider::RawBar;
use crate::domain::Bar;
use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

/// Columns every source must deliver before feature work starts.
pub const REQUIRED_SOURCE_COLUMNS: [&str; 5] = ["date", "close", "high", "low", "volume"];

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' is not numeric (dtype {dtype})")]
    NonNumeric { column: String, dtype: String },

    #[error("invalid date{}: {reason}", .row.map(|r| format!(" at row {r}")).unwrap_or_default())]
    InvalidDate { row: Option<usize>, reason: String },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn date_from_days(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

/// Build the initial feature table from raw bars.
///
/// Columns: `date` (Date), `open`, `high`, `low`, `close` (Float64, NaN stored
/// as null) and `volume` (UInt64, null where the source had no value). Row
/// order is the order of `bars`.
pub fn bars_to_frame(bars: &[RawBar]) -> Result<DataFrame, FrameError> {
    let dates: Vec<i32> = bars.iter().map(|b| days_since_epoch(b.date)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<Option<u64>> = bars.iter().map(|b| b.volume).collect();

    let df = DataFrame::new(vec![
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        float_column("open", &opens),
        float_column("high", &highs),
        float_column("low", &lows),
        float_column("close", &closes),
        Column::new("volume".into(), volumes),
    ])?;
    Ok(df)
}

/// Return a copy of `df` whose `date` column is a chronological `Date`.
///
/// Accepts `Date`, `Datetime`, or ISO `YYYY-MM-DD...` string columns. Any
/// missing or unparseable value, or a date that does not strictly follow the
/// previous row, is an `InvalidDate` error.
pub fn normalize_dates(df: &DataFrame) -> Result<DataFrame, FrameError> {
    let column = df.column("date").map_err(|_| FrameError::MissingColumn {
        column: "date".into(),
    })?;

    let days = match column.dtype() {
        DataType::Date => date_days(column)?,
        DataType::Datetime(_, _) => date_days(&column.cast(&DataType::Date)?)?,
        DataType::String => string_days(column)?,
        other => {
            return Err(FrameError::InvalidDate {
                row: None,
                reason: format!("unsupported date dtype {other}"),
            })
        }
    };

    for i in 1..days.len() {
        if days[i] <= days[i - 1] {
            return Err(FrameError::InvalidDate {
                row: Some(i),
                reason: format!(
                    "{} does not follow {} (dates must be strictly increasing)",
                    date_from_days(days[i]),
                    date_from_days(days[i - 1])
                ),
            });
        }
    }

    let mut out = df.clone();
    out.with_column(Column::new("date".into(), days).cast(&DataType::Date)?)?;
    Ok(out)
}

fn date_days(column: &Column) -> Result<Vec<i32>, FrameError> {
    let ca = column.date()?;
    (0..ca.len())
        .map(|i| {
            ca.get(i).ok_or_else(|| FrameError::InvalidDate {
                row: Some(i),
                reason: "missing date".into(),
            })
        })
        .collect()
}

fn string_days(column: &Column) -> Result<Vec<i32>, FrameError> {
    let ca = column.str()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let raw = raw.ok_or_else(|| FrameError::InvalidDate {
                row: Some(i),
                reason: "missing date".into(),
            })?;
            let head = raw.get(..10).unwrap_or(raw);
            NaiveDate::parse_from_str(head, "%Y-%m-%d")
                .map(days_since_epoch)
                .map_err(|e| FrameError::InvalidDate {
                    row: Some(i),
                    reason: format!("cannot parse '{raw}': {e}"),
                })
        })
        .collect()
}

/// Read the calendar dates of a normalized `date` column.
pub fn dates(df: &DataFrame) -> Result<Vec<NaiveDate>, FrameError> {
    let column = df.column("date").map_err(|_| FrameError::MissingColumn {
        column: "date".into(),
    })?;
    if column.dtype() != &DataType::Date {
        return Err(FrameError::InvalidDate {
            row: None,
            reason: format!("date column has dtype {}, expected date", column.dtype()),
        });
    }
    Ok(date_days(column)?.into_iter().map(date_from_days).collect())
}

/// Read a numeric column as `f64`, nulls as NaN.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, FrameError> {
    let column = df.column(name).map_err(|_| FrameError::MissingColumn {
        column: name.to_string(),
    })?;
    let dtype = column.dtype();
    if !(dtype.is_float() || dtype.is_integer()) {
        return Err(FrameError::NonNumeric {
            column: name.to_string(),
            dtype: dtype.to_string(),
        });
    }
    let cast = column.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Build a Float64 column from `values`, storing NaN as null.
pub fn float_column(name: &str, values: &[f64]) -> Column {
    let values: Vec<Option<f64>> = values
        .iter()
        .map(|v| if v.is_nan() { None } else { Some(*v) })
        .collect();
    Column::new(name.into(), values)
}

/// Extract indicator input bars in row order.
///
/// Requires `date`, `high`, `low`, `close`, `volume`; `open` is optional.
pub fn bars_from_frame(df: &DataFrame) -> Result<Vec<Bar>, FrameError> {
    let dates = dates(df)?;
    let high = float_values(df, "high")?;
    let low = float_values(df, "low")?;
    let close = float_values(df, "close")?;
    let volume = float_values(df, "volume")?;
    let open = match float_values(df, "open") {
        Ok(v) => v,
        Err(FrameError::MissingColumn { .. }) => vec![f64::NAN; df.height()],
        Err(e) => return Err(e),
    };

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| Bar {
            date,
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        })
        .collect())
}
