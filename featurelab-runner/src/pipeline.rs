//! Pipeline orchestrator.
//!
//! One linear pass per ticker:
//! `START -> DOWNLOADED -> DATE_NORMALIZED -> FEATURE_ENGINEERED ->
//! RETURN_COMPUTED -> INDICATORS_ADDED -> UPLOADED -> DONE`.
//! Any checkpoint failure halts the run with a terminal state; nothing is
//! uploaded unless every stage before the upload completed.

use crate::config::{ConfigError, FeatureSettings, PipelineConfig};
use crate::report::PipelineReport;
use crate::sink::{upload_table, Sink, SinkError};
use chrono::NaiveDate;
use featurelab_core::data::{
    dataset_hash, write_raw_snapshot, DataError, DataProvider, FrameError, RawBar,
    REQUIRED_SOURCE_COLUMNS,
};
use featurelab_core::indicators::IndicatorError;
use featurelab_core::{
    add_calendar_features, add_daily_return, add_technical_indicators, bars_to_frame,
    calculate_rolling_statistics, create_lag_features, normalize_dates, FeatureError,
    IndicatorFailure, IndicatorRegistry,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Start,
    Downloaded,
    DateNormalized,
    FeatureEngineered,
    ReturnComputed,
    IndicatorsAdded,
    Uploaded,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Downloaded => "DOWNLOADED",
            Self::DateNormalized => "DATE_NORMALIZED",
            Self::FeatureEngineered => "FEATURE_ENGINEERED",
            Self::ReturnComputed => "RETURN_COMPUTED",
            Self::IndicatorsAdded => "INDICATORS_ADDED",
            Self::Uploaded => "UPLOADED",
            Self::Done => "DONE",
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Downloaded),
            Self::Downloaded => Some(Self::DateNormalized),
            Self::DateNormalized => Some(Self::FeatureEngineered),
            Self::FeatureEngineered => Some(Self::ReturnComputed),
            Self::ReturnComputed => Some(Self::IndicatorsAdded),
            Self::IndicatorsAdded => Some(Self::Uploaded),
            Self::Uploaded => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Early-exit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    EmptyInput,
    MissingColumn,
    InvalidDate,
    InvalidClose,
    SourceFailed,
    UploadFailed,
    InvalidConfig,
    NonNumericColumn,
    ComputationFailed,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::MissingColumn => "MISSING_COLUMN",
            Self::InvalidDate => "INVALID_DATE",
            Self::InvalidClose => "INVALID_CLOSE",
            Self::SourceFailed => "SOURCE_FAILED",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::NonNumericColumn => "NON_NUMERIC_COLUMN",
            Self::ComputationFailed => "COMPUTATION_FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("[{ticker}] no price data{}", .range.map(|(s, e)| format!(" for {s}..{e}")).unwrap_or_default())]
    EmptyInput {
        ticker: String,
        range: Option<(NaiveDate, NaiveDate)>,
    },

    #[error("[{ticker}] source '{source_name}' failed: {source}")]
    Source {
        ticker: String,
        source_name: String,
        source: DataError,
    },

    #[error("[{ticker}] {stage}: missing required column '{column}'")]
    MissingColumn {
        ticker: String,
        stage: PipelineStage,
        column: String,
    },

    #[error("[{ticker}] {stage}: {source}")]
    InvalidDate {
        ticker: String,
        stage: PipelineStage,
        source: FrameError,
    },

    #[error("[{ticker}] 'close' has {undefined} undefined value(s); daily_return and indicators not computed")]
    InvalidClose { ticker: String, undefined: usize },

    #[error("[{ticker}] {stage}: {source}")]
    Feature {
        ticker: String,
        stage: PipelineStage,
        source: FeatureError,
    },

    #[error("[{ticker}] technical indicators skipped: {source}")]
    Indicators {
        ticker: String,
        source: IndicatorError,
    },

    #[error("[{ticker}] upload to '{destination}' failed: {source}")]
    Upload {
        ticker: String,
        destination: String,
        source: SinkError,
    },
}

impl PipelineError {
    pub fn terminal_state(&self) -> TerminalState {
        match self {
            Self::Config(_) => TerminalState::InvalidConfig,
            Self::EmptyInput { .. } => TerminalState::EmptyInput,
            Self::Source { .. } => TerminalState::SourceFailed,
            Self::MissingColumn { .. } => TerminalState::MissingColumn,
            Self::Feature { source, .. } => match source {
                FeatureError::InvalidParameter { .. } => TerminalState::InvalidConfig,
                FeatureError::InvalidClose { .. } => TerminalState::InvalidClose,
                FeatureError::Frame(e) => frame_state(e),
                FeatureError::Polars(_) => TerminalState::ComputationFailed,
            },
            Self::Indicators { source, .. } => match source {
                IndicatorError::MissingColumns { .. } => TerminalState::MissingColumn,
                IndicatorError::Frame(e) => frame_state(e),
                _ => TerminalState::ComputationFailed,
            },
            Self::InvalidDate { .. } => TerminalState::InvalidDate,
            Self::InvalidClose { .. } => TerminalState::InvalidClose,
            Self::Upload { .. } => TerminalState::UploadFailed,
        }
    }
}

fn frame_state(err: &FrameError) -> TerminalState {
    match err {
        FrameError::MissingColumn { .. } => TerminalState::MissingColumn,
        FrameError::NonNumeric { .. } => TerminalState::NonNumericColumn,
        FrameError::InvalidDate { .. } => TerminalState::InvalidDate,
        FrameError::Polars(_) => TerminalState::ComputationFailed,
    }
}

/// The enriched table plus what the indicator engine reported.
#[derive(Debug)]
pub struct FeatureTable {
    pub table: DataFrame,
    pub indicator_failures: Vec<IndicatorFailure>,
}

fn enter(ticker: &str, stage: PipelineStage) {
    info!(ticker, stage = %stage, "stage reached");
}

/// Run every stage between download and upload on a source table.
///
/// `raw` needs `date`, `close`, `high`, `low`, `volume`; `date` may still be
/// a string column. Rows must already be in date order.
pub fn build_feature_table(
    ticker: &str,
    raw: &DataFrame,
    features: &FeatureSettings,
    registry: &IndicatorRegistry,
) -> Result<FeatureTable, PipelineError> {
    if raw.height() == 0 {
        return Err(PipelineError::EmptyInput {
            ticker: ticker.to_string(),
            range: None,
        });
    }
    for column in REQUIRED_SOURCE_COLUMNS {
        if raw.column(column).is_err() {
            return Err(PipelineError::MissingColumn {
                ticker: ticker.to_string(),
                stage: PipelineStage::Downloaded,
                column: column.to_string(),
            });
        }
    }

    let table = normalize_dates(raw).map_err(|source| PipelineError::InvalidDate {
        ticker: ticker.to_string(),
        stage: PipelineStage::Downloaded,
        source,
    })?;
    enter(ticker, PipelineStage::DateNormalized);

    let feature_err = |source: FeatureError| match source {
        FeatureError::Frame(FrameError::MissingColumn { column }) => PipelineError::MissingColumn {
            ticker: ticker.to_string(),
            stage: PipelineStage::DateNormalized,
            column,
        },
        source => PipelineError::Feature {
            ticker: ticker.to_string(),
            stage: PipelineStage::DateNormalized,
            source,
        },
    };

    let mut table = table;
    for column in &features.lag_columns {
        table = create_lag_features(&table, column, features.lag_days).map_err(feature_err)?;
    }
    for column in &features.rolling_columns {
        table =
            calculate_rolling_statistics(&table, column, features.window).map_err(feature_err)?;
    }
    table = add_calendar_features(&table).map_err(feature_err)?;
    debug!(ticker, shape = ?table.shape(), "feature table after engineering");
    enter(ticker, PipelineStage::FeatureEngineered);

    table = match add_daily_return(&table, features.return_fill) {
        Ok(t) => t,
        Err(FeatureError::InvalidClose { undefined }) => {
            return Err(PipelineError::InvalidClose {
                ticker: ticker.to_string(),
                undefined,
            })
        }
        Err(e) => return Err(feature_err(e)),
    };
    enter(ticker, PipelineStage::ReturnComputed);

    let output = add_technical_indicators(&table, registry);
    let complete = output.is_complete();
    if let Some(source) = output.skipped {
        return Err(PipelineError::Indicators {
            ticker: ticker.to_string(),
            source,
        });
    }
    if !complete {
        warn!(ticker, failed = output.failures.len(), "indicator stage finished with failures");
        for failure in &output.failures {
            warn!(ticker, indicator = %failure.name, reason = %failure.reason, "indicator not attached or NaN-filled");
        }
    }
    debug!(ticker, columns = ?output.table.get_column_names(), "columns before upload");
    enter(ticker, PipelineStage::IndicatorsAdded);

    Ok(FeatureTable {
        table: output.table,
        indicator_failures: output.failures,
    })
}

/// Download, enrich and upload one ticker.
pub fn run_pipeline(
    config: &PipelineConfig,
    provider: &dyn DataProvider,
    sink: &dyn Sink,
) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();
    config.validate()?;
    let ticker = config.run.ticker.as_str();
    let (start, end) = config.date_range()?;
    enter(ticker, PipelineStage::Start);

    let result = run_stages(config, ticker, start, end, provider, sink, started);
    if let Err(e) = &result {
        error!(ticker, terminal = %e.terminal_state(), error = %e, "pipeline halted");
    }
    result
}

fn run_stages(
    config: &PipelineConfig,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    provider: &dyn DataProvider,
    sink: &dyn Sink,
    started: Instant,
) -> Result<PipelineReport, PipelineError> {
    info!(ticker, %start, %end, provider = provider.name(), "downloading price history");
    let fetched = match provider.fetch(ticker, start, end) {
        Ok(f) if f.bars.is_empty() => Err(PipelineError::EmptyInput {
            ticker: ticker.to_string(),
            range: Some((start, end)),
        }),
        Ok(f) => Ok(f),
        Err(DataError::NoData { .. }) => Err(PipelineError::EmptyInput {
            ticker: ticker.to_string(),
            range: Some((start, end)),
        }),
        Err(DataError::MissingColumn { column, .. }) => Err(PipelineError::MissingColumn {
            ticker: ticker.to_string(),
            stage: PipelineStage::Start,
            column,
        }),
        Err(source) => Err(PipelineError::Source {
            ticker: ticker.to_string(),
            source_name: provider.name().to_string(),
            source,
        }),
    }?;
    enter(ticker, PipelineStage::Downloaded);

    let hash = dataset_hash(ticker, &fetched.bars);
    let snapshot_path = snapshot(config, ticker, &fetched.bars);

    let raw = bars_to_frame(&fetched.bars).map_err(|source| PipelineError::InvalidDate {
        ticker: ticker.to_string(),
        stage: PipelineStage::Downloaded,
        source,
    })?;
    debug!(ticker, shape = ?raw.shape(), "raw table");

    let registry = IndicatorRegistry::from_names(&config.indicators.catalog);
    for name in registry.unknown_names() {
        warn!(ticker, indicator = name, "unknown indicator, column will be NaN");
    }
    let features = build_feature_table(ticker, &raw, &config.features, &registry)?;

    let destination = config.table_name();
    let chunks_written = upload_table(sink, &features.table, &destination, config.sink.chunk_size)
        .map_err(|source| PipelineError::Upload {
            ticker: ticker.to_string(),
            destination: destination.clone(),
            source,
        })?;
    enter(ticker, PipelineStage::Uploaded);

    let report = PipelineReport {
        ticker: ticker.to_string(),
        start_date: start,
        end_date: end,
        source: fetched.source,
        final_stage: PipelineStage::Done,
        rows: features.table.height(),
        columns: features
            .table
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect(),
        indicator_failures: features.indicator_failures,
        destination,
        chunks_written,
        dataset_hash: hash,
        snapshot_path,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    enter(ticker, PipelineStage::Done);
    info!(ticker, rows = report.rows, columns = report.columns.len(), "main processing finished");
    Ok(report)
}

/// Write the raw snapshot if enabled. Failure is logged, not fatal.
fn snapshot(config: &PipelineConfig, ticker: &str, bars: &[RawBar]) -> Option<std::path::PathBuf> {
    if !config.source.snapshot {
        return None;
    }
    match write_raw_snapshot(&config.source.snapshot_dir, ticker, bars) {
        Ok(path) => {
            info!(ticker, path = %path.display(), "raw data snapshot written");
            Some(path)
        }
        Err(e) => {
            warn!(ticker, error = %e, "could not write raw data snapshot");
            None
        }
    }
}
