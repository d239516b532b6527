//! Natural-language explanations.
//!
//! Two jobs share the language model here: summarizing a query's results for
//! the chat answer, and explaining an arbitrary SQL query on request. Result
//! summaries degrade to a deterministic template when the model is down; the
//! standalone SQL explanation surfaces the failure instead, since the caller
//! asked for exactly that.

use std::sync::Arc;

use tracing::warn;

use crate::error::LlmError;
use crate::llm::LanguageModel;
use crate::warehouse::{ResultSet, Scalar};

/// Rows included verbatim in the explanation prompt.
const PREVIEW_ROWS: usize = 20;
const EXPLAIN_TEMPERATURE: f32 = 0.4;

pub struct Explainer {
  model: Arc<dyn LanguageModel>,
}

impl Explainer {
  pub fn new(model: Arc<dyn LanguageModel>) -> Self {
    Self { model }
  }

  /// Summarize the results in plain language. Never fails: a model outage
  /// degrades to a template summary of the row count.
  pub async fn explain_result(&self, question: &str, sql: &str, result: &ResultSet) -> String {
    let prompt = result_prompt(question, sql, result);
    match self.model.generate(&prompt, EXPLAIN_TEMPERATURE).await {
      Ok(text) => text.trim().to_string(),
      Err(e) => {
        warn!(error = %e, "explanation model failed, using template summary");
        template_summary(result)
      }
    }
  }

  /// Interpret a failed execution for the user. Returns `None` when the
  /// model is also down; the caller already has the warehouse message.
  pub async fn interpret_failure(&self, question: &str, sql: &str, error: &str) -> Option<String> {
    let prompt = format!(
      "A user asked: \"{question}\"\n\
       The following SQL query was run against the data warehouse but failed:\n{sql}\n\n\
       The warehouse reported: {error}\n\n\
       In one or two sentences, explain to the user in plain language why \
       their question could not be answered. Do not suggest code changes."
    );
    match self.model.generate(&prompt, EXPLAIN_TEMPERATURE).await {
      Ok(text) => Some(text.trim().to_string()),
      Err(e) => {
        warn!(error = %e, "failure interpretation skipped, model unavailable");
        None
      }
    }
  }

  /// Explain what a SQL query does, for the standalone explain endpoint.
  pub async fn explain_sql(&self, sql: &str) -> Result<String, LlmError> {
    let prompt = format!(
      "Explain the following SQL query in simple, non-technical language. \
       Describe what data it retrieves and what question it answers. \
       Keep it to a short paragraph.\n\nSQL query:\n{sql}"
    );
    let text = self.model.generate(&prompt, EXPLAIN_TEMPERATURE).await?;
    Ok(text.trim().to_string())
  }
}

fn result_prompt(question: &str, sql: &str, result: &ResultSet) -> String {
  format!(
    "A user asked: \"{question}\"\n\
     The following SQL query was run against the data warehouse:\n{sql}\n\n\
     It returned {} row(s).{}\nData preview:\n{}\n\n\
     Write a short, friendly answer to the user's question based on this data. \
     Mention concrete numbers where they help. Do not mention SQL.",
    result.rows.len(),
    if result.truncated { " The results were truncated to a row cap." } else { "" },
    preview(result),
  )
}

fn preview(result: &ResultSet) -> String {
  let header: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
  let mut lines = vec![header.join(" | ")];
  for row in result.rows.iter().take(PREVIEW_ROWS) {
    let cells: Vec<String> = row.iter().map(render_scalar).collect();
    lines.push(cells.join(" | "));
  }
  lines.join("\n")
}

fn render_scalar(value: &Scalar) -> String {
  match value {
    Scalar::Null => "null".to_string(),
    Scalar::Bool(b) => b.to_string(),
    Scalar::Integer(n) => n.to_string(),
    Scalar::Float(f) => f.to_string(),
    Scalar::Text(s) => s.clone(),
  }
}

fn template_summary(result: &ResultSet) -> String {
  match result.rows.len() {
    0 => "The query ran successfully but returned no matching data.".to_string(),
    1 => "The query returned 1 row of data.".to_string(),
    n if result.truncated => {
      format!("The query returned {n} rows of data (truncated to a row cap).")
    }
    n => format!("The query returned {n} rows of data."),
  }
}
