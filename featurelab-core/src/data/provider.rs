//! Price source contract shared by the Yahoo and CSV providers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar from a data provider (before any feature work).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the source had no value for the day.
    pub volume: Option<u64>,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("price source unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("throttled by price source, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected response shape: {0}")]
    ResponseFormatChanged(String),

    #[error("unknown ticker {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("column '{column}' is missing from the source data for {symbol}")]
    MissingColumn { symbol: String, column: String },

    #[error("malformed row {row} in {source_name}: {reason}")]
    MalformedRow {
        source_name: String,
        row: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Bars for one ticker, tagged with their origin.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
}

/// A daily price source. `start` is inclusive and `end` exclusive; an empty
/// range is `DataError::NoData`, never a zero-row success.
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;
}

/// Deterministic BLAKE3 hash over the raw bars, in the order given.
pub fn dataset_hash(symbol: &str, bars: &[RawBar]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(symbol.as_bytes());
    for bar in bars {
        h.update(&bar.date.num_days_from_ce().to_le_bytes());
        for price in [bar.open, bar.high, bar.low, bar.close] {
            h.update(&price.to_bits().to_le_bytes());
        }
        match bar.volume {
            Some(v) => h.update(&[1]).update(&v.to_le_bytes()),
            None => h.update(&[0]),
        };
    }
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> RawBar {
        RawBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: Some(1000),
        }
    }

    #[test]
    fn same_bars_hash_identically() {
        let bars = vec![bar(2, 100.0), bar(3, 101.0)];
        assert_eq!(dataset_hash("SPY", &bars), dataset_hash("SPY", &bars));
    }

    #[test]
    fn dataset_hash_changes_with_symbol_and_values() {
        let bars = vec![bar(2, 100.0), bar(3, 101.0)];
        let other = vec![bar(2, 100.0), bar(3, 101.5)];
        assert_ne!(dataset_hash("SPY", &bars), dataset_hash("QQQ", &bars));
        assert_ne!(dataset_hash("SPY", &bars), dataset_hash("SPY", &other));
    }

    #[test]
    fn no_data_error_names_symbol_and_range() {
        let err = DataError::NoData {
            symbol: "SPY".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SPY"));
        assert!(msg.contains("2024-01-01"));
    }
}
