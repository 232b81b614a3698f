//! FeatureLab Runner: pipeline orchestration, configuration, warehouse sinks.
//!
//! This crate builds on `featurelab-core` to provide:
//! - TOML configuration with deployment environment overrides
//! - The linear pipeline state machine with terminal error states
//! - Chunked warehouse upload (local Parquet, BigQuery load jobs)
//! - The run report

pub mod config;
pub mod pipeline;
pub mod report;
pub mod sink;

pub use config::{
    ConfigError, FeatureSettings, IndicatorSettings, PipelineConfig, RunSettings, SinkKind,
    SinkSettings, SourceKind, SourceSettings,
};
pub use pipeline::{
    build_feature_table, run_pipeline, FeatureTable, PipelineError, PipelineStage, TerminalState,
};
pub use report::PipelineReport;
pub use sink::{
    infer_schema, upload_table, BigQuerySink, FieldSchema, FieldType, ParquetSink, Sink,
    SinkError, WriteDisposition,
};
