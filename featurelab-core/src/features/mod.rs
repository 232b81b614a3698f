//! Feature Deriver and Calendar Annotator.
//!
//! Every function takes the table by reference and returns a new table with
//! the derived columns appended. Input columns and row order are never
//! touched. Derived numeric columns are Float64 with nulls for undefined
//! rows, whatever the dtype of the source column.

pub mod calendar;
pub mod lag;
pub mod rolling;

pub use calendar::{add_calendar_features, add_daily_return};
pub use lag::create_lag_features;
pub use rolling::{calculate_rolling_statistics, rolling_mean_std};

use crate::data::frame::FrameError;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("invalid parameter {name} = {value} (must be >= 1)")]
    InvalidParameter { name: &'static str, value: usize },

    #[error("'close' has {undefined} undefined value(s); returns and indicators would be invalid")]
    InvalidClose { undefined: usize },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// What `daily_return` holds on the first row, where no previous close exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFill {
    /// First row is 0.0.
    #[default]
    Zero,
    /// First row is left undefined (null).
    Undefined,
}
