//! Warehouse execution.
//!
//! The `Warehouse` trait is the seam between the pipeline and the actual
//! data warehouse; `BigQueryWarehouse` implements it over the BigQuery
//! `jobs.query` REST endpoint. Execution failures are never retried: a query
//! that failed once will fail the same way again, and the caller wants the
//! warehouse's own message, not a second wait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ErrorCategory, ExecutionError};

const BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// One cell value. BigQuery returns every cell as a string or null; values
/// are coerced using the column's declared type so downstream chart and
/// explanation stages can reason about shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
  Null,
  Bool(bool),
  Integer(i64),
  Float(f64),
  Text(String),
}

impl Scalar {
  pub fn is_null(&self) -> bool {
    matches!(self, Scalar::Null)
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Scalar::Integer(n) => Some(*n as f64),
      Scalar::Float(f) => Some(*f),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Scalar::Text(s) => Some(s),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
  pub name: String,
  /// Warehouse type name, e.g. "STRING", "INT64", "TIMESTAMP".
  #[serde(rename = "type")]
  pub ty: String,
}

/// A bounded, fully materialized query result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
  pub columns: Vec<ColumnMeta>,
  pub rows: Vec<Vec<Scalar>>,
  /// True when the warehouse had more rows than the configured cap.
  pub truncated: bool,
}

impl ResultSet {
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// All values of one column, by position.
  pub fn column_values(&self, idx: usize) -> Vec<&Scalar> {
    self.rows.iter().filter_map(|row| row.get(idx)).collect()
  }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
  async fn execute(&self, sql: &str) -> Result<ResultSet, ExecutionError>;
}

pub struct BigQueryWarehouse {
  client: reqwest::Client,
  project_id: Option<String>,
  access_token: Option<String>,
  max_rows: usize,
  timeout_ms: u64,
  base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
  #[serde(default)]
  schema: Option<TableSchema>,
  #[serde(default)]
  rows: Vec<WireRow>,
  #[serde(default)]
  total_rows: Option<String>,
  #[serde(default)]
  page_token: Option<String>,
  #[serde(default)]
  job_complete: Option<bool>,
}

#[derive(Deserialize)]
struct TableSchema {
  #[serde(default)]
  fields: Vec<WireField>,
}

#[derive(Deserialize)]
struct WireField {
  name: String,
  #[serde(rename = "type")]
  ty: String,
}

#[derive(Deserialize)]
struct WireRow {
  #[serde(default)]
  f: Vec<WireCell>,
}

#[derive(Deserialize)]
struct WireCell {
  #[serde(default)]
  v: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
  #[serde(default)]
  message: String,
  #[serde(default)]
  errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
  #[serde(default)]
  reason: String,
}

impl BigQueryWarehouse {
  pub fn new(
    project_id: Option<String>,
    access_token: Option<String>,
    max_rows: usize,
    timeout: Duration,
  ) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());
    Self {
      client,
      project_id,
      access_token,
      max_rows,
      timeout_ms: timeout.as_millis() as u64,
      base_url: BASE_URL.to_string(),
    }
  }
}

fn query_body(sql: &str, max_rows: usize, timeout_ms: u64) -> serde_json::Value {
  json!({
    "query": sql,
    "useLegacySql": false,
    "maxResults": max_rows,
    "timeoutMs": timeout_ms,
  })
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
  async fn execute(&self, sql: &str) -> Result<ResultSet, ExecutionError> {
    let project = self.project_id.as_deref().ok_or_else(|| {
      ExecutionError::new(ErrorCategory::Unknown, "BIGQUERY_PROJECT_ID is not configured")
    })?;
    let token = self.access_token.as_deref().ok_or_else(|| {
      ExecutionError::new(ErrorCategory::Permission, "BIGQUERY_ACCESS_TOKEN is not configured")
    })?;

    let url = format!("{}/projects/{}/queries", self.base_url, project);
    let body = query_body(sql, self.max_rows, self.timeout_ms);

    debug!(project, "executing warehouse query");
    let response = self
      .client
      .post(&url)
      .bearer_auth(token)
      .json(&body)
      .send()
      .await
      .map_err(|e| {
        let category =
          if e.is_timeout() { ErrorCategory::Timeout } else { ErrorCategory::Unknown };
        ExecutionError::new(category, format!("warehouse request failed: {e}"))
      })?;

    if !response.status().is_success() {
      let status = response.status();
      let text = response.text().await.unwrap_or_default();
      return Err(categorize_failure(status, &text));
    }

    let parsed: QueryResponse = response.json().await.map_err(|e| {
      ExecutionError::new(ErrorCategory::Unknown, format!("unparseable warehouse response: {e}"))
    })?;

    if parsed.job_complete == Some(false) {
      return Err(ExecutionError::new(
        ErrorCategory::Timeout,
        "query did not complete within the request deadline",
      ));
    }

    Ok(materialize(parsed, self.max_rows))
  }
}

/// Map an HTTP failure from the warehouse into the error taxonomy, keeping
/// the warehouse's own message verbatim.
fn categorize_failure(status: reqwest::StatusCode, body: &str) -> ExecutionError {
  if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
    let reason = parsed.error.errors.first().map(|e| e.reason.as_str()).unwrap_or_default();
    let category = categorize_reason(reason);
    let message = if parsed.error.message.is_empty() {
      format!("warehouse returned {status}")
    } else {
      parsed.error.message
    };
    return ExecutionError::new(category, message);
  }
  warn!(%status, "warehouse error body was not structured");
  ExecutionError::new(ErrorCategory::Unknown, format!("warehouse returned {status}: {body}"))
}

fn categorize_reason(reason: &str) -> ErrorCategory {
  match reason {
    "invalidQuery" => ErrorCategory::Syntax,
    "accessDenied" | "authError" => ErrorCategory::Permission,
    "timeout" => ErrorCategory::Timeout,
    "quotaExceeded" | "rateLimitExceeded" | "resourcesExceeded" | "responseTooLarge" => {
      ErrorCategory::ResourceExceeded
    }
    _ => ErrorCategory::Unknown,
  }
}

fn materialize(response: QueryResponse, max_rows: usize) -> ResultSet {
  let columns: Vec<ColumnMeta> = response
    .schema
    .map(|s| s.fields.into_iter().map(|f| ColumnMeta { name: f.name, ty: f.ty }).collect())
    .unwrap_or_default();

  let mut rows: Vec<Vec<Scalar>> = response
    .rows
    .into_iter()
    .map(|row| {
      row
        .f
        .into_iter()
        .enumerate()
        .map(|(i, cell)| coerce(cell.v, columns.get(i).map(|c| c.ty.as_str()).unwrap_or("")))
        .collect()
    })
    .collect();

  let total: Option<u64> = response.total_rows.and_then(|t| t.parse().ok());
  let truncated = rows.len() > max_rows
    || response.page_token.is_some()
    || total.is_some_and(|t| t > rows.len() as u64);
  rows.truncate(max_rows);

  ResultSet { columns, rows, truncated }
}

/// BigQuery serializes every cell as a JSON string (or null); coerce using
/// the column's declared type, falling back to text when parsing fails.
fn coerce(value: serde_json::Value, ty: &str) -> Scalar {
  let Some(text) = value.as_str().map(str::to_string) else {
    return Scalar::Null;
  };
  match ty {
    "INTEGER" | "INT64" => text.parse().map(Scalar::Integer).unwrap_or(Scalar::Text(text)),
    "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
      text.parse().map(Scalar::Float).unwrap_or(Scalar::Text(text))
    }
    "BOOLEAN" | "BOOL" => match text.as_str() {
      "true" => Scalar::Bool(true),
      "false" => Scalar::Bool(false),
      _ => Scalar::Text(text),
    },
    _ => Scalar::Text(text),
  }
}
