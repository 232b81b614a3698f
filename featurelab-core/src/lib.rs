//! FeatureLab Core: price sources, feature derivation, calendar fields, technical indicators.
//!
//! This crate contains the deterministic part of the pipeline:
//! - Domain types (daily bars)
//! - Source collaborators (Yahoo Finance, local CSV) and the raw snapshot writer
//! - Conversion between bars and polars frames, with date normalization
//! - Lag features and rolling statistics over arbitrary numeric columns
//! - Calendar fields and period-over-period returns
//! - A registry-driven technical indicator engine with per-indicator failure isolation

pub mod data;
pub mod domain;
pub mod features;
pub mod indicators;

pub use data::frame::{bars_to_frame, normalize_dates, FrameError};
pub use features::{
    add_calendar_features, add_daily_return, calculate_rolling_statistics, create_lag_features,
    FeatureError, ReturnFill,
};
pub use indicators::engine::{add_technical_indicators, EngineOutput, IndicatorFailure};
pub use indicators::registry::{IndicatorRegistry, DEFAULT_CATALOG};
