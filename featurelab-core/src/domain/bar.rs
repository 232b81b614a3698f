//! Bar: one trading day of OHLCV data as seen by the indicator engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily bar extracted from a feature table.
///
/// Missing values are carried as `f64::NAN`. `low <= close <= high` is
/// expected but not enforced; indicators propagate whatever they are given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}
