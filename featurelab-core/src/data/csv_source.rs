//! Local CSV price source.
//!
//! Reads `date,open,high,low,close,volume` rows (any column order, header
//! names case-insensitive). `open` is optional; the other five are required.
//! Empty numeric cells become NaN (volume: 0). Dates may carry a time or
//! offset suffix, only the leading `YYYY-MM-DD` is used.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Price source backed by a CSV file on disk.
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse every row of the file, unfiltered.
    pub fn read_all(&self, symbol: &str) -> Result<Vec<RawBar>, DataError> {
        let source_name = self.path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| csv_error(&source_name, 0, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(&source_name, 0, e))?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let index_of = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            index_of(name).ok_or_else(|| DataError::MissingColumn {
                symbol: symbol.to_string(),
                column: name.to_string(),
            })
        };

        let date_idx = require("date")?;
        let close_idx = require("close")?;
        let volume_idx = require("volume")?;
        let low_idx = require("low")?;
        let high_idx = require("high")?;
        let open_idx = index_of("open");

        let mut bars = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // Header is line 1.
            let row = i + 2;
            let record = record.map_err(|e| csv_error(&source_name, row, e))?;
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let malformed = |reason: String| DataError::MalformedRow {
                source_name: source_name.clone(),
                row,
                reason,
            };

            let date = parse_date(field(date_idx)).map_err(malformed)?;
            let open = match open_idx {
                Some(idx) => parse_price(field(idx), "open").map_err(malformed)?,
                None => f64::NAN,
            };
            let high = parse_price(field(high_idx), "high").map_err(malformed)?;
            let low = parse_price(field(low_idx), "low").map_err(malformed)?;
            let close = parse_price(field(close_idx), "close").map_err(malformed)?;
            let volume = parse_volume(field(volume_idx)).map_err(malformed)?;

            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Ok(bars)
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars: Vec<RawBar> = self
            .read_all(symbol)?
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect();

        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvImport,
        })
    }
}

fn csv_error(source_name: &str, row: usize, err: csv::Error) -> DataError {
    DataError::MalformedRow {
        source_name: source_name.to_string(),
        row,
        reason: err.to_string(),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|e| format!("bad date '{raw}': {e}"))
}

fn parse_price(raw: &str, column: &str) -> Result<f64, String> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| format!("bad {column} value '{raw}': {e}"))
}

fn parse_volume(raw: &str) -> Result<Option<u64>, String> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|e| format!("bad volume value '{raw}': {e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("volume must be a non-negative number, got '{raw}'"));
    }
    Ok(Some(value.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn reads_capitalized_headers_in_any_order() {
        let file = write_csv(
            "Date,Close,High,Low,Volume,Open\n\
             2024-01-02 00:00:00-05:00,101.0,102.0,99.0,1000,100.0\n\
             2024-01-03,102.0,103.0,100.0,1100.0,101.0\n",
        );
        let provider = CsvProvider::new(file.path());
        let bars = provider.read_all("SPY").unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2024, 1, 2));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].volume, Some(1100));
    }

    #[test]
    fn blank_volume_reaches_the_table_as_null() {
        let file = write_csv("date,high,low,close,volume\n2024-01-02,2,1,1.5,10\n2024-01-03,2,1,1.5,\n");
        let fetched = CsvProvider::new(file.path())
            .fetch("SPY", d(2024, 1, 1), d(2024, 2, 1))
            .unwrap();
        assert_eq!(fetched.bars[1].volume, None);

        let df = crate::data::bars_to_frame(&fetched.bars).unwrap();
        assert_eq!(df.column("volume").unwrap().null_count(), 1);
    }

    #[test]
    fn open_is_optional_and_blanks_are_nan() {
        let file = write_csv("date,high,low,close,volume\n2024-01-02,102.0,99.0,,\n");
        let bars = CsvProvider::new(file.path()).read_all("SPY").unwrap();
        assert!(bars[0].open.is_nan());
        assert!(bars[0].close.is_nan());
        assert_eq!(bars[0].volume, None);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let file = write_csv("date,high,low,close\n2024-01-02,102.0,99.0,101.0\n");
        let err = CsvProvider::new(file.path()).read_all("SPY").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column, .. } if column == "volume"));
    }

    #[test]
    fn bad_date_reports_row_number() {
        let file = write_csv(
            "date,high,low,close,volume\n2024-01-02,2,1,1.5,10\nnot-a-date,2,1,1.5,10\n",
        );
        let err = CsvProvider::new(file.path()).read_all("SPY").unwrap_err();
        assert!(matches!(err, DataError::MalformedRow { row: 3, .. }));
    }

    #[test]
    fn fetch_filters_half_open_range() {
        let file = write_csv(
            "date,high,low,close,volume\n\
             2024-01-02,2,1,1.5,10\n\
             2024-01-03,2,1,1.5,10\n\
             2024-01-04,2,1,1.5,10\n",
        );
        let provider = CsvProvider::new(file.path());
        let result = provider.fetch("SPY", d(2024, 1, 3), d(2024, 1, 4)).unwrap();
        assert_eq!(result.bars.len(), 1);
        assert_eq!(result.bars[0].date, d(2024, 1, 3));
        assert_eq!(result.source, DataSource::CsvImport);
    }

    #[test]
    fn fetch_with_no_rows_in_range_is_no_data() {
        let file = write_csv("date,high,low,close,volume\n2024-01-02,2,1,1.5,10\n");
        let err = CsvProvider::new(file.path())
            .fetch("SPY", d(2025, 1, 1), d(2025, 2, 1))
            .unwrap_err();
        assert!(matches!(err, DataError::NoData { .. }));
    }

    #[test]
    fn negative_volume_is_rejected() {
        let file = write_csv("date,high,low,close,volume\n2024-01-02,2,1,1.5,-5\n");
        let err = CsvProvider::new(file.path()).read_all("SPY").unwrap_err();
        assert!(matches!(err, DataError::MalformedRow { .. }));
    }
}
