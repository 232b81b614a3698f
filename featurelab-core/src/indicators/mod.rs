//! Technical Indicator Engine.
//!
//! Indicators are pure functions: bar history in, one or more numeric series
//! out, each the same length as the input. They are looked up by name through
//! the `registry` and evaluated one at a time by `engine`, which absorbs any
//! single indicator's failure by filling its columns with NaN.
//!
//! Multi-series indicators (MACD, Bollinger, ADX) report every output column
//! name up front so a failure can still produce correctly named columns.

pub mod adx;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod engine;
pub mod extrema;
pub mod macd;
pub mod registry;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod wilder;
pub mod williams;

pub use adx::Adx;
pub use bollinger::Bollinger;
pub use cci::Cci;
pub use ema::Ema;
pub use extrema::{Extreme, RollingExtreme};
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{StochLine, Stochastic};
pub use williams::WilliamsR;

use crate::data::frame::FrameError;
use crate::domain::Bar;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("missing required columns for technical indicators: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("indicator '{name}' is not recognized")]
    UnknownIndicator { name: String },

    #[error("indicator '{name}' failed: {reason}")]
    Computation { name: String, reason: String },

    #[error("indicator '{name}' returned {actual} series of length {length}, expected {expected} of length {rows}")]
    OutputMismatch {
        name: String,
        expected: usize,
        actual: usize,
        rows: usize,
        length: usize,
    },

    #[error("indicator '{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    #[error("indicator '{name}' would overwrite existing column '{column}'")]
    ColumnExists { name: String, column: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Trait for indicators.
///
/// `compute` returns one series per entry of `outputs()`, in the same order,
/// each exactly `bars.len()` long. The first `lookback()` values are NaN.
///
/// # Look-ahead guard
/// No value at bar t may depend on bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Catalog name (e.g., "rsi_14", "macd").
    fn name(&self) -> &str;

    /// Output column names. Single-series indicators output their own name.
    fn outputs(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute every output series for the whole bar history.
    fn compute(&self, bars: &[Bar]) -> Result<Vec<Vec<f64>>, IndicatorError>;
}

/// Close prices in bar order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1,
/// low = min(open, close) - 1, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Bars from explicit (high, low, close) triples.
#[cfg(test)]
pub fn make_hlc_bars(data: &[(f64, f64, f64)]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(high, low, close))| Bar {
            date: base_date + chrono::Duration::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
