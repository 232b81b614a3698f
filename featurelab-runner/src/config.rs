//! Pipeline configuration.
//!
//! Loaded from TOML, then overridden by the deployment environment variables
//! (`TICKER_SYMBOL`, `START_DATE`, ...), then by CLI flags in the binary.
//! Every section has defaults, so a config file only needs `[run]`.

use chrono::NaiveDate;
use featurelab_core::{ReturnFill, DEFAULT_CATALOG};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder in the table name template replaced by the ticker.
pub const TICKER_PLACEHOLDER: &str = "{ticker}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub run: RunSettings,
    pub features: FeatureSettings,
    pub indicators: IndicatorSettings,
    pub sink: SinkSettings,
    pub source: SourceSettings,
}

/// Which ticker and date range to process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub ticker: String,
    /// Inclusive.
    pub start_date: Option<NaiveDate>,
    /// Exclusive.
    pub end_date: Option<NaiveDate>,
    pub log_level: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            ticker: String::new(),
            start_date: None,
            end_date: None,
            log_level: "info".into(),
        }
    }
}

/// Lag and rolling feature parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub lag_columns: Vec<String>,
    pub lag_days: usize,
    pub rolling_columns: Vec<String>,
    pub window: usize,
    pub return_fill: ReturnFill,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            lag_columns: vec!["close".into(), "volume".into()],
            lag_days: 5,
            rolling_columns: vec!["close".into(), "volume".into()],
            window: 10,
            return_fill: ReturnFill::Zero,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    /// Ordered indicator names; unknown names become all-NaN columns.
    pub catalog: Vec<String>,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Parquet,
    Bigquery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub kind: SinkKind,
    /// Destination table name; `{ticker}` is substituted.
    pub table: String,
    pub chunk_size: usize,
    pub output_dir: PathBuf,
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::Parquet,
            table: format!("{TICKER_PLACEHOLDER}_processed_stock_data"),
            chunk_size: 10_000,
            output_dir: PathBuf::from("output"),
            project_id: None,
            dataset_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub csv_path: Option<PathBuf>,
    /// Write `{ticker}_original_data.csv` after download.
    pub snapshot: bool,
    pub snapshot_dir: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Yahoo,
            csv_path: None,
            snapshot: true,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply the deployment environment variables on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(ticker) = get("TICKER_SYMBOL") {
            self.run.ticker = ticker.trim().to_string();
        }
        if let Some(value) = get("START_DATE") {
            self.run.start_date = Some(parse_date("START_DATE", &value)?);
        }
        if let Some(value) = get("END_DATE") {
            self.run.end_date = Some(parse_date("END_DATE", &value)?);
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.run.log_level = level.trim().to_lowercase();
        }
        if let Some(project) = get("BIGQUERY_PROJECT_ID") {
            self.sink.project_id = Some(project);
        }
        if let Some(dataset) = get("BIGQUERY_DATASET_ID") {
            self.sink.dataset_id = Some(dataset);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.ticker.trim().is_empty() {
            return Err(ConfigError::Invalid("ticker must not be empty".into()));
        }
        let (start, end) = self.date_range()?;
        if start >= end {
            return Err(ConfigError::Invalid(format!(
                "start_date {start} must be before end_date {end}"
            )));
        }
        if self.features.lag_days == 0 {
            return Err(ConfigError::Invalid("features.lag_days must be >= 1".into()));
        }
        if self.features.window == 0 {
            return Err(ConfigError::Invalid("features.window must be >= 1".into()));
        }
        if self.sink.chunk_size == 0 {
            return Err(ConfigError::Invalid("sink.chunk_size must be >= 1".into()));
        }
        if self.table_name().trim().is_empty() {
            return Err(ConfigError::Invalid("sink.table must not be empty".into()));
        }
        if self.sink.kind == SinkKind::Bigquery
            && (self.sink.project_id.is_none() || self.sink.dataset_id.is_none())
        {
            return Err(ConfigError::Invalid(
                "bigquery sink requires project_id and dataset_id".into(),
            ));
        }
        if self.source.kind == SourceKind::Csv && self.source.csv_path.is_none() {
            return Err(ConfigError::Invalid("csv source requires source.csv_path".into()));
        }
        Ok(())
    }

    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        match (self.run.start_date, self.run.end_date) {
            (Some(start), Some(end)) => Ok((start, end)),
            (None, _) => Err(ConfigError::Invalid("start_date is required".into())),
            (_, None) => Err(ConfigError::Invalid("end_date is required".into())),
        }
    }

    /// Destination table with the ticker substituted.
    pub fn table_name(&self) -> String {
        self.sink.table.replace(TICKER_PLACEHOLDER, &self.run.ticker)
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
