//! Chat and SQL explanation endpoint handlers.

use axum::{
  extract::{Json, State},
  http::StatusCode,
  response::Json as ResponseJson,
};
use tracing::info;

use crate::server::types::{
  ApiError, ChatRequest, ChatResponse, ExplainSqlRequest, ExplainSqlResponse, rows_as_objects,
};
use crate::server::AppState;

/// POST /api/chat - Answer a natural-language question over the warehouse
pub async fn chat(
  State(state): State<AppState>,
  Json(request): Json<ChatRequest>,
) -> Result<ResponseJson<ChatResponse>, (StatusCode, ResponseJson<ApiError>)> {
  let question = request.query.trim();
  if question.is_empty() {
    return Err((
      StatusCode::BAD_REQUEST,
      ResponseJson(ApiError::new("empty_query", "query must not be empty")),
    ));
  }

  info!(question, "chat request received");
  let answer = state.orchestrator.answer(question).await;

  let truncated = answer.data.as_ref().is_some_and(|d| d.truncated);
  Ok(ResponseJson(ChatResponse {
    explanation: answer.explanation,
    sql_query: answer.sql,
    data: answer.data.as_ref().map(rows_as_objects),
    chart_url: answer.chart_url,
    truncated,
  }))
}

/// POST /api/explain-sql - Explain an arbitrary SQL query in plain language
///
/// Failures come back as a 200 with the `error` field populated, keeping the
/// response shape uniform for clients.
pub async fn explain_sql(
  State(state): State<AppState>,
  Json(request): Json<ExplainSqlRequest>,
) -> Result<ResponseJson<ExplainSqlResponse>, (StatusCode, ResponseJson<ApiError>)> {
  let sql = request.sql_query.trim();
  if sql.is_empty() {
    return Err((
      StatusCode::BAD_REQUEST,
      ResponseJson(ApiError::new("empty_sql", "sql_query must not be empty")),
    ));
  }

  let response = match state.explainer.explain_sql(sql).await {
    Ok(explanation) => ExplainSqlResponse { explanation: Some(explanation), error: None },
    Err(e) => ExplainSqlResponse { explanation: None, error: Some(e.to_string()) },
  };
  Ok(ResponseJson(response))
}
