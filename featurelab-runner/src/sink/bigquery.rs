//! BigQuery load-job sink over the v2 REST API.
//!
//! Each chunk becomes one multipart load job: JSON job metadata plus the rows
//! as newline-delimited JSON. The job is polled until BigQuery reports DONE.
//! Authentication is a caller-supplied OAuth bearer token.

use super::{FieldSchema, Sink, SinkError, WriteDisposition};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_API_ROOT: &str = "https://bigquery.googleapis.com";
const BOUNDARY: &str = "featurelab_load_boundary";

pub struct BigQuerySink {
    client: reqwest::blocking::Client,
    api_root: String,
    project_id: String,
    dataset_id: String,
    access_token: String,
    poll_interval: Duration,
    max_polls: u32,
}

// ── Job resource (subset) ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl BigQuerySink {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_root: DEFAULT_API_ROOT.to_string(),
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            access_token: access_token.into(),
            poll_interval: Duration::from_secs(1),
            max_polls: 300,
        })
    }

    /// Point the sink at another API root (an emulator, for instance).
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn table_ref(&self, table: &str) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, table)
    }

    fn load_metadata(&self, table: &str, schema: &[FieldSchema], disposition: WriteDisposition) -> Value {
        let fields: Vec<Value> = schema
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.field_type.as_str() }))
            .collect();
        json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project_id,
                        "datasetId": self.dataset_id,
                        "tableId": table,
                    },
                    "schema": { "fields": fields },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": disposition.as_bigquery(),
                    "createDisposition": "CREATE_IF_NEEDED",
                }
            }
        })
    }

    fn submit(&self, body: Vec<u8>) -> Result<JobResource, SinkError> {
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.api_root, self.project_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()?;
        parse_job(resp)
    }

    fn wait_for(&self, mut job: JobResource) -> Result<(), SinkError> {
        for _ in 0..self.max_polls {
            if let Some(status) = &job.status {
                if status.state == "DONE" {
                    return match &status.error_result {
                        Some(err) => Err(SinkError::JobFailed {
                            job_id: job.job_reference.job_id.clone(),
                            reason: format!("{}: {}", err.reason, err.message),
                        }),
                        None => Ok(()),
                    };
                }
                debug!(job_id = %job.job_reference.job_id, state = %status.state, "waiting for load job");
            }
            thread::sleep(self.poll_interval);

            let mut request = self.client.get(format!(
                "{}/bigquery/v2/projects/{}/jobs/{}",
                self.api_root, self.project_id, job.job_reference.job_id
            ));
            if let Some(location) = &job.job_reference.location {
                request = request.query(&[("location", location)]);
            }
            job = parse_job(request.bearer_auth(&self.access_token).send()?)?;
        }
        Err(SinkError::JobTimeout {
            job_id: job.job_reference.job_id,
            polls: self.max_polls,
        })
    }
}

impl Sink for BigQuerySink {
    fn name(&self) -> &str {
        "bigquery"
    }

    fn write_chunk(
        &self,
        destination: &str,
        chunk: &DataFrame,
        schema: &[FieldSchema],
        disposition: WriteDisposition,
    ) -> Result<(), SinkError> {
        let metadata = self.load_metadata(destination, schema, disposition);
        let rows = chunk_to_ndjson(chunk, schema)?;
        let body = multipart_body(&metadata, &rows)?;

        let job = self.submit(body)?;
        info!(
            table = %self.table_ref(destination),
            job_id = %job.job_reference.job_id,
            rows = chunk.height(),
            disposition = disposition.as_bigquery(),
            "submitted load job"
        );
        self.wait_for(job)
    }
}

fn parse_job(resp: reqwest::blocking::Response) -> Result<JobResource, SinkError> {
    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        return Err(SinkError::Rejected {
            status: status.as_u16(),
            body: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| SinkError::Response(format!("job resource: {e}")))
}

/// multipart/related body: JSON metadata part, then the NDJSON payload part.
fn multipart_body(metadata: &Value, rows: &str) -> Result<Vec<u8>, SinkError> {
    let mut body = Vec::with_capacity(rows.len() + 1024);
    body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes());
    serde_json::to_writer(&mut body, metadata)?;
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes());
    body.extend_from_slice(rows.as_bytes());
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Ok(body)
}

/// Serialize rows as newline-delimited JSON objects.
///
/// Dates become `YYYY-MM-DD 00:00:00`; NaN and null become JSON null.
fn chunk_to_ndjson(chunk: &DataFrame, schema: &[FieldSchema]) -> Result<String, SinkError> {
    let columns = chunk.get_columns();
    let mut out = String::new();
    for row in 0..chunk.height() {
        let mut object = Map::with_capacity(columns.len());
        for (column, field) in columns.iter().zip(schema) {
            object.insert(field.name.clone(), cell_json(column.get(row)?));
        }
        out.push_str(&serde_json::to_string(&Value::Object(object))?);
        out.push('\n');
    }
    Ok(out)
}

fn cell_json(value: AnyValue<'_>) -> Value {
    let number = |v: f64| {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    };
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Float64(v) => number(v),
        AnyValue::Float32(v) => number(v as f64),
        AnyValue::Int8(v) => json!(v),
        AnyValue::Int16(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt8(v) => json!(v),
        AnyValue::UInt16(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Date(days) => {
            let date = NaiveDate::default() + chrono::Duration::days(days as i64);
            Value::String(format!("{date} 00:00:00"))
        }
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}
