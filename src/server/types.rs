//! REST API wire types.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::warehouse::ResultSet;

/// Request for POST /api/chat
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
  /// The user's natural-language question
  pub query: String,
}

/// Response for POST /api/chat
///
/// The explanation field always carries text: the answer prose on success,
/// or a notice describing why no query could run. `sql_query`, `data`, and
/// `chart_url` are null for the stages that did not complete.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
  pub explanation: String,
  pub sql_query: Option<String>,
  /// Result rows as objects keyed by column name
  pub data: Option<Vec<serde_json::Value>>,
  pub chart_url: Option<String>,
  #[serde(default)]
  pub truncated: bool,
}

/// Request for POST /api/explain-sql
#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainSqlRequest {
  pub sql_query: String,
}

/// Response for POST /api/explain-sql
///
/// Exactly one of the two fields is populated.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainSqlResponse {
  pub explanation: Option<String>,
  pub error: Option<String>,
}

/// Error body for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
  pub key: String,
  pub message: String,
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string() }
  }
}

/// Response for GET /status
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
  pub status: String,
  pub service: String,
  pub version: String,
  /// Whether the schema index holds any vectors yet
  pub index_ready: bool,
}

/// Response for GET /version
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
  pub version: String,
}

/// Convert a result set to row objects keyed by column name.
pub fn rows_as_objects(result: &ResultSet) -> Vec<serde_json::Value> {
  result
    .rows
    .iter()
    .map(|row| {
      let object: serde_json::Map<String, serde_json::Value> = result
        .columns
        .iter()
        .zip(row.iter())
        .map(|(col, cell)| (col.name.clone(), json!(cell)))
        .collect();
      serde_json::Value::Object(object)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::warehouse::{ColumnMeta, Scalar};

  #[test]
  fn rows_serialize_as_keyed_objects() {
    let result = ResultSet {
      columns: vec![
        ColumnMeta { name: "profession".to_string(), ty: "STRING".to_string() },
        ColumnMeta { name: "count".to_string(), ty: "INTEGER".to_string() },
      ],
      rows: vec![
        vec![Scalar::Text("Doctor".to_string()), Scalar::Integer(42)],
        vec![Scalar::Null, Scalar::Integer(3)],
      ],
      truncated: false,
    };

    let objects = rows_as_objects(&result);
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["profession"], json!("Doctor"));
    assert_eq!(objects[0]["count"], json!(42));
    assert_eq!(objects[1]["profession"], serde_json::Value::Null);
  }

  #[test]
  fn chat_response_keeps_nulls_on_the_wire() {
    let response = ChatResponse {
      explanation: "no query".to_string(),
      sql_query: None,
      data: None,
      chart_url: None,
      truncated: false,
    };
    let wire = serde_json::to_value(&response).unwrap();
    assert!(wire["sql_query"].is_null());
    assert!(wire["data"].is_null());
    assert!(wire["chart_url"].is_null());
  }
}
