//! Warehouse sinks.
//!
//! A sink receives the finished feature table in row-ordered chunks. The
//! first chunk replaces whatever the destination held, later chunks append,
//! so an interrupted upload can leave a partial table behind.

pub mod bigquery;
pub mod parquet;

pub use self::bigquery::BigQuerySink;
pub use self::parquet::ParquetSink;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("warehouse rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("load job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("load job {job_id} did not finish after {polls} polls")]
    JobTimeout { job_id: String, polls: u32 },

    #[error("unexpected warehouse response: {0}")]
    Response(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("chunk_size must be >= 1")]
    InvalidChunkSize,
}

/// External column type, as understood by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Timestamp,
    Float,
    Integer,
    Boolean,
    String,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "TIMESTAMP",
            Self::Float => "FLOAT",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    /// Replace existing destination data.
    Truncate,
    Append,
}

impl WriteDisposition {
    pub fn as_bigquery(&self) -> &'static str {
        match self {
            Self::Truncate => "WRITE_TRUNCATE",
            Self::Append => "WRITE_APPEND",
        }
    }
}

/// A destination for feature tables.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Write one chunk. `schema` covers the whole table, not just this chunk.
    fn write_chunk(
        &self,
        destination: &str,
        chunk: &DataFrame,
        schema: &[FieldSchema],
        disposition: WriteDisposition,
    ) -> Result<(), SinkError>;
}

/// One external type per column.
///
/// Date/datetime columns map to TIMESTAMP, floats to FLOAT, integers to
/// INTEGER unless they hold nulls (then FLOAT), booleans to BOOLEAN, and
/// everything else to STRING.
pub fn infer_schema(df: &DataFrame) -> Vec<FieldSchema> {
    df.get_columns()
        .iter()
        .map(|column| {
            let dtype = column.dtype();
            let field_type = match dtype {
                DataType::Date | DataType::Datetime(_, _) => FieldType::Timestamp,
                DataType::Boolean => FieldType::Boolean,
                d if d.is_float() => FieldType::Float,
                d if d.is_integer() => {
                    if column.null_count() > 0 {
                        warn!(
                            column = column.name().as_str(),
                            "integer column holds undefined values, uploading as FLOAT"
                        );
                        FieldType::Float
                    } else {
                        FieldType::Integer
                    }
                }
                _ => FieldType::String,
            };
            FieldSchema {
                name: column.name().to_string(),
                field_type,
            }
        })
        .collect()
}

/// Upload `df` to `destination` in chunks of at most `chunk_size` rows.
///
/// Returns the number of chunks written. An empty table is skipped with a
/// warning and writes nothing.
pub fn upload_table(
    sink: &dyn Sink,
    df: &DataFrame,
    destination: &str,
    chunk_size: usize,
) -> Result<usize, SinkError> {
    if chunk_size == 0 {
        return Err(SinkError::InvalidChunkSize);
    }
    if df.height() == 0 {
        warn!(destination, sink = sink.name(), "table is empty, skipping upload");
        return Ok(0);
    }

    let schema = infer_schema(df);
    debug!(destination, schema = ?schema, "inferred warehouse schema");

    let rows = df.height();
    let chunks = rows.div_ceil(chunk_size);
    info!(destination, sink = sink.name(), rows, chunks, "uploading table");

    for index in 0..chunks {
        let offset = index * chunk_size;
        let chunk = df.slice(offset as i64, chunk_size.min(rows - offset));
        let disposition = if index == 0 {
            WriteDisposition::Truncate
        } else {
            WriteDisposition::Append
        };
        sink.write_chunk(destination, &chunk, &schema, disposition)?;
        debug!(destination, chunk = index + 1, of = chunks, rows = chunk.height(), "chunk written");
    }

    info!(destination, rows, "upload complete");
    Ok(chunks)
}

/// Cast integer columns the schema promoted to FLOAT.
pub(crate) fn conform_to_schema(chunk: &DataFrame, schema: &[FieldSchema]) -> Result<DataFrame, SinkError> {
    let mut out = chunk.clone();
    for field in schema.iter().filter(|f| f.field_type == FieldType::Float) {
        let Ok(column) = chunk.column(&field.name) else {
            continue;
        };
        if column.dtype().is_integer() {
            out.with_column(column.cast(&DataType::Float64)?)?;
        }
    }
    Ok(out)
}
