//! Evaluates a registry against a feature table.
//!
//! Every entry is computed in isolation: an error, a panic, or a malformed
//! result from one indicator becomes an [`IndicatorFailure`] and NaN-filled
//! columns, and the remaining indicators still run. An entry whose output
//! name is already a column is reported and attaches nothing. If the table
//! lacks a prerequisite column the engine returns the input untouched.

use super::registry::IndicatorRegistry;
use super::{Indicator, IndicatorError};
use crate::data::frame::{bars_from_frame, float_column};
use crate::domain::Bar;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Columns the engine needs before it will compute anything.
pub const REQUIRED_COLUMNS: [&str; 5] = ["date", "close", "high", "low", "volume"];

/// One indicator that could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct EngineOutput {
    pub table: DataFrame,
    pub failures: Vec<IndicatorFailure>,
    /// Set when the whole stage was skipped; `table` is then the input.
    pub skipped: Option<IndicatorError>,
}

impl EngineOutput {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_none() && self.failures.is_empty()
    }
}

/// Add one column per indicator output to a copy of `df`.
///
/// Rows must already be in ascending date order. Undefined values are nulls.
pub fn add_technical_indicators(df: &DataFrame, registry: &IndicatorRegistry) -> EngineOutput {
    info!(indicators = registry.len(), rows = df.height(), "adding technical indicators");

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| df.column(c).is_err())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        error!(missing = ?missing, "missing required columns for technical indicators");
        return skipped(df, IndicatorError::MissingColumns { columns: missing });
    }

    let bars = match bars_from_frame(df) {
        Ok(bars) => bars,
        Err(e) => {
            error!(error = %e, "cannot read price columns for technical indicators");
            return skipped(df, e.into());
        }
    };

    let rows = bars.len();
    let mut table = df.clone();
    let mut failures = Vec::new();

    for (name, indicator) in registry.entries() {
        let outputs = indicator.map_or_else(|| vec![name.to_string()], |ind| ind.outputs());
        if let Some(column) = outputs.iter().find(|c| table.column(c).is_ok()) {
            let e = IndicatorError::ColumnExists {
                name: name.to_string(),
                column: column.clone(),
            };
            warn!(indicator = name, error = %e, "indicator skipped, existing column kept");
            failures.push(IndicatorFailure {
                name: name.to_string(),
                reason: e.to_string(),
            });
            continue;
        }

        let result = match indicator {
            Some(ind) => run_isolated(name, ind, &bars),
            None => Err(IndicatorError::UnknownIndicator {
                name: name.to_string(),
            }),
        };

        let series = match result {
            Ok(series) => series,
            Err(e) => {
                warn!(indicator = name, error = %e, "indicator failed, filling with NaN");
                failures.push(IndicatorFailure {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
                vec![vec![f64::NAN; rows]; outputs.len()]
            }
        };

        for (column, values) in outputs.iter().zip(&series) {
            if let Err(e) = table.with_column(float_column(column, values)) {
                warn!(indicator = name, column = column.as_str(), error = %e, "could not attach indicator column");
                failures.push(IndicatorFailure {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(columns = ?table.get_column_names(), "columns after technical indicators");
    EngineOutput {
        table,
        failures,
        skipped: None,
    }
}

fn skipped(df: &DataFrame, reason: IndicatorError) -> EngineOutput {
    EngineOutput {
        table: df.clone(),
        failures: Vec::new(),
        skipped: Some(reason),
    }
}

fn run_isolated(
    name: &str,
    indicator: &dyn Indicator,
    bars: &[Bar],
) -> Result<Vec<Vec<f64>>, IndicatorError> {
    let series = panic::catch_unwind(AssertUnwindSafe(|| indicator.compute(bars))).map_err(
        |payload| IndicatorError::Panicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        },
    )??;

    let expected = indicator.outputs().len();
    let bad_length = series.iter().map(Vec::len).find(|&len| len != bars.len());
    if series.len() != expected || bad_length.is_some() {
        return Err(IndicatorError::OutputMismatch {
            name: name.to_string(),
            expected,
            actual: series.len(),
            rows: bars.len(),
            length: bad_length.unwrap_or(bars.len()),
        });
    }
    Ok(series)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{bars_to_frame, float_values};
    use crate::data::provider::RawBar;
    use chrono::NaiveDate;

    fn price_frame(n: usize) -> DataFrame {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<RawBar> = (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.5).sin() * 4.0;
                RawBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close + 1.5,
                    low: close - 1.5,
                    close,
                    volume: Some(10_000),
                }
            })
            .collect();
        bars_to_frame(&bars).unwrap()
    }

    #[test]
    fn default_catalog_adds_all_columns() {
        let out = add_technical_indicators(&price_frame(80), &IndicatorRegistry::default());
        assert!(out.is_complete(), "failures: {:?}", out.failures);
        for column in [
            "low_14", "high_14", "macd", "macds", "macdh", "rsi_14", "boll", "boll_ub", "boll_lb",
            "close_30_sma", "close_60_sma", "cci_20", "stoch_k", "stoch_d", "adx", "adxr",
            "wr_14", "ema_20",
        ] {
            let values = float_values(&out.table, column).unwrap();
            assert_eq!(values.len(), 80);
            assert!(!values[79].is_nan(), "{column} undefined at the last row");
        }
        assert_eq!(out.table.width(), 6 + 18);
    }

    #[test]
    fn unknown_name_is_nan_column() {
        let registry = IndicatorRegistry::from_names(&["ema_5", "not_a_thing"]);
        let out = add_technical_indicators(&price_frame(10), &registry);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].name, "not_a_thing");
        assert_eq!(out.table.column("not_a_thing").unwrap().null_count(), 10);
        assert_eq!(out.table.column("ema_5").unwrap().null_count(), 4);
    }

    #[test]
    fn name_matching_existing_column_keeps_that_column() {
        let input = price_frame(5);
        let registry = IndicatorRegistry::from_names(&["close", "volume", "ema_2"]);
        let out = add_technical_indicators(&input, &registry);

        let failed: Vec<&str> = out.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["close", "volume"]);
        assert!(out.failures[0].reason.contains("existing column 'close'"));
        for column in ["close", "volume"] {
            assert!(out
                .table
                .column(column)
                .unwrap()
                .as_materialized_series()
                .equals_missing(input.column(column).unwrap().as_materialized_series()));
        }
        assert_eq!(out.table.width(), input.width() + 1);
    }

    #[test]
    fn registered_output_colliding_with_column_is_rejected() {
        let input = price_frame(30)
            .lazy()
            .with_column(lit(1.0).alias("rsi_14"))
            .collect()
            .unwrap();
        let out = add_technical_indicators(&input, &IndicatorRegistry::from_names(&["rsi_14"]));
        assert_eq!(out.failures.len(), 1);
        assert!(matches!(
            out.table.column("rsi_14").unwrap().f64().unwrap().get(0),
            Some(v) if v == 1.0
        ));
    }

    #[test]
    fn missing_volume_skips_stage() {
        let input = price_frame(10).drop("volume").unwrap();
        let out = add_technical_indicators(&input, &IndicatorRegistry::default());
        assert!(matches!(
            out.skipped,
            Some(IndicatorError::MissingColumns { ref columns }) if columns == &["volume".to_string()]
        ));
        assert!(out.table.equals_missing(&input));
    }

    #[test]
    fn short_table_yields_undefined_not_failure() {
        let out = add_technical_indicators(&price_frame(3), &IndicatorRegistry::default());
        assert!(out.failures.is_empty());
        assert_eq!(out.table.column("close_60_sma").unwrap().null_count(), 3);
    }
}
