//! Run manifest written at the end of a successful pipeline run.

use crate::pipeline::PipelineStage;
use chrono::NaiveDate;
use featurelab_core::data::DataSource;
use featurelab_core::IndicatorFailure;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub source: DataSource,
    pub final_stage: PipelineStage,
    pub rows: usize,
    pub columns: Vec<String>,
    pub indicator_failures: Vec<IndicatorFailure>,
    pub destination: String,
    pub chunks_written: usize,
    /// BLAKE3 over the raw input bars.
    pub dataset_hash: String,
    pub snapshot_path: Option<PathBuf>,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// One-paragraph human summary for the CLI.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{ticker} {start}..{end}: {rows} rows x {cols} columns -> {dest} ({chunks} chunk{s}) in {ms} ms",
            ticker = self.ticker,
            start = self.start_date,
            end = self.end_date,
            rows = self.rows,
            cols = self.columns.len(),
            dest = self.destination,
            chunks = self.chunks_written,
            s = if self.chunks_written == 1 { "" } else { "s" },
            ms = self.elapsed_ms,
        );
        if !self.indicator_failures.is_empty() {
            let names: Vec<&str> = self
                .indicator_failures
                .iter()
                .map(|f| f.name.as_str())
                .collect();
            text.push_str(&format!("\n  indicators filled with NaN: {}", names.join(", ")));
        }
        text
    }
}
