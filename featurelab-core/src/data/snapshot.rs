//! Raw download snapshot.
//!
//! Writes the bars exactly as received to `{dir}/{symbol}_original_data.csv`
//! so a run can be replayed offline through `CsvProvider`.

use super::provider::{DataError, RawBar};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `bars` as CSV and return the file path. NaN prices and missing
/// volumes are written as empty cells.
pub fn write_raw_snapshot(dir: &Path, symbol: &str, bars: &[RawBar]) -> Result<PathBuf, DataError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{symbol}_original_data.csv"));

    let mut wtr = csv::Writer::from_path(&path)
        .map_err(|e| DataError::Other(format!("create {}: {e}", path.display())))?;
    wtr.write_record(["date", "open", "high", "low", "close", "volume"])
        .map_err(|e| DataError::Other(format!("write header: {e}")))?;

    for bar in bars {
        wtr.write_record([
            bar.date.to_string(),
            price_cell(bar.open),
            price_cell(bar.high),
            price_cell(bar.low),
            price_cell(bar.close),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
        ])
        .map_err(|e| DataError::Other(format!("write row for {}: {e}", bar.date)))?;
    }

    wtr.flush()?;
    Ok(path)
}

fn price_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
