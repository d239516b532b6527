//! SQL synthesis: question plus retrieved schema context in, one validated
//! read-only query out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{LlmError, SynthesisError};
use crate::llm::LanguageModel;
use crate::retriever::RetrievalResult;

/// The synthesized query plus the model's optional one-line rationale.
#[derive(Debug, Clone)]
pub struct SqlArtifact {
  pub sql: String,
  pub rationale: Option<String>,
}

/// Statement keywords that are never allowed in a synthesized query.
const FORBIDDEN_KEYWORDS: &[&str] =
  &["insert", "update", "delete", "drop", "create", "alter", "truncate", "merge", "grant"];

const NO_CONTEXT_NOTICE: &str =
  "No specific schema context found. Rely on general knowledge of common table structures.";

pub struct SqlSynthesizer {
  model: Arc<dyn LanguageModel>,
}

impl SqlSynthesizer {
  pub fn new(model: Arc<dyn LanguageModel>) -> Self {
    Self { model }
  }

  pub async fn synthesize(
    &self,
    question: &str,
    context: &RetrievalResult,
    organization_id: &str,
  ) -> Result<SqlArtifact, SynthesisError> {
    let prompt = build_prompt(question, context, organization_id);
    debug!(chars = prompt.len(), "sending synthesis prompt");

    let response = self.model.generate(&prompt, 0.0).await.map_err(|e| match e {
      LlmError::Unavailable(msg) => SynthesisError::Unavailable(msg),
      LlmError::Malformed(msg) => SynthesisError::Parse(msg),
    })?;

    let artifact = extract_sql(&response)?;
    debug!(sql = %artifact.sql, "synthesized query");
    Ok(artifact)
  }
}

fn build_prompt(question: &str, context: &RetrievalResult, organization_id: &str) -> String {
  let schema_context = if context.is_empty() {
    NO_CONTEXT_NOTICE.to_string()
  } else {
    context.context_text()
  };

  format!(
    r#"You are an AI that generates SQL queries for a BigQuery data warehouse based on user questions.
Your task is to create accurate, safe SQL queries using the provided relevant schema context.
Follow these rules:
1. Generate only SELECT queries. Never produce INSERT, UPDATE, DELETE, or DDL statements.
2. Crucial: always include a condition like "WHERE organization_id = '{organization_id}'" to filter data for the user's organization.
3. Use BigQuery-compatible SQL syntax.
4. Return only the SQL query as a raw string, with no explanations or markdown fences.
5. Use only tables and columns that appear in the schema context below.
6. Ensure proper spacing in aliases (e.g., 'COUNT(*) as count', not 'COUNT(*)as count').
7. Use the fully qualified table name when the context provides one.

Relevant schema context:
{schema_context}

Examples (style guide only; rely on the schema context for actual table and column names):
Question: "How many attendees are doctors in my organization?"
SQL: SELECT COUNT(*) as count FROM `visualization-app-404406.mlh_etl_production.mrt_events` WHERE profession = 'Doctor' AND organization_id = '{organization_id}'

Question: "What is the distribution of attendees by profession for my organization?"
SQL: SELECT profession, COUNT(*) as count FROM `visualization-app-404406.mlh_etl_production.mrt_events` WHERE organization_id = '{organization_id}' GROUP BY profession

User question: {question}
Organization ID: {organization_id}
SQL:"#
  )
}

/// Pull the single query out of the model response: strip markdown fences,
/// require a read-only statement head, and refuse destructive keywords.
fn extract_sql(response: &str) -> Result<SqlArtifact, SynthesisError> {
  let mut text = response.trim();

  // Models occasionally wrap the query in a fenced block despite the prompt.
  if let Some(start) = text.find("```") {
    let after = &text[start + 3..];
    let after = after.strip_prefix("sql").unwrap_or(after);
    let end = after.find("```").unwrap_or(after.len());
    text = after[..end].trim();
  }

  if text.is_empty() {
    return Err(SynthesisError::Parse("model response was empty".to_string()));
  }

  // Take the statement itself and keep any trailing commentary line the
  // model added as the rationale.
  let (sql, rationale) = split_statement(text);
  let head = sql.split_whitespace().next().unwrap_or_default().to_lowercase();

  if head != "select" && head != "with" {
    return Err(SynthesisError::Parse(format!("response does not start with a query: {head:?}")));
  }

  let lowered = sql.to_lowercase();
  for keyword in FORBIDDEN_KEYWORDS {
    if lowered.split(|c: char| !c.is_ascii_alphanumeric() && c != '_').any(|w| w == *keyword) {
      warn!(keyword, "rejecting synthesized query with destructive keyword");
      return Err(SynthesisError::Parse(format!("query contains forbidden keyword {keyword}")));
    }
  }

  Ok(SqlArtifact { sql: sql.to_string(), rationale })
}

/// Split a response into the SQL statement and an optional trailing
/// free-text rationale. Blank lines inside the statement (models often
/// separate CTEs that way) do not end it; rationale starts at the first
/// post-blank line that cannot be SQL continuation.
fn split_statement(text: &str) -> (String, Option<String>) {
  let mut sql_lines = Vec::new();
  let mut rationale_lines = Vec::new();
  let mut in_rationale = false;
  let mut after_blank = false;

  for line in text.lines() {
    let trimmed = line.trim();
    if in_rationale {
      rationale_lines.push(trimmed);
      continue;
    }
    if trimmed.is_empty() {
      after_blank = !sql_lines.is_empty();
      continue;
    }
    if after_blank && !looks_like_sql(trimmed) {
      in_rationale = true;
      rationale_lines.push(trimmed);
      continue;
    }
    after_blank = false;
    sql_lines.push(trimmed);
  }

  let sql = sql_lines.join(" ").trim().trim_end_matches(';').trim().to_string();
  let rationale = if rationale_lines.is_empty() {
    None
  } else {
    Some(rationale_lines.join(" ").trim().to_string()).filter(|r| !r.is_empty())
  };
  (sql, rationale)
}

/// Whether a line can plausibly continue a SQL statement.
fn looks_like_sql(line: &str) -> bool {
  const CONTINUATIONS: &[&str] = &[
    "select", "with", "from", "where", "group", "order", "having", "join", "left", "right",
    "inner", "outer", "cross", "union", "on", "and", "or", "limit", "offset", "case", "when",
    "then", "else", "end", "as",
  ];

  if matches!(line.chars().next(), Some('(' | ')' | ',' | '`')) {
    return true;
  }
  let head: String = line
    .split_whitespace()
    .next()
    .unwrap_or_default()
    .chars()
    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
    .collect::<String>()
    .to_lowercase();
  CONTINUATIONS.contains(&head.as_str())
}
