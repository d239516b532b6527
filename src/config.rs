//! Environment-driven runtime settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of schema fragments retrieved per question.
pub const DEFAULT_TOP_K: usize = 7;
/// Default cap on total retrieved-context characters.
pub const DEFAULT_CONTEXT_BUDGET: usize = 2000;
/// Default cap on rows returned from the warehouse.
pub const DEFAULT_MAX_ROWS: usize = 100;

#[derive(Debug, Clone)]
pub struct Settings {
  /// API key for the Gemini embedding and generation endpoints. When absent,
  /// the primary embedder and the language model report themselves
  /// unavailable instead of making network calls.
  pub gemini_api_key: Option<String>,
  pub gemini_model: String,
  pub bigquery_project_id: Option<String>,
  /// OAuth bearer token for the BigQuery REST API.
  pub bigquery_access_token: Option<String>,
  /// Optional path to a schema catalog JSON file; the bundled catalog is
  /// used when unset.
  pub schema_path: Option<PathBuf>,
  /// Directory where chart artifacts are written and served from.
  pub static_dir: PathBuf,
  /// Tenant every synthesized query is scoped to.
  pub organization_id: String,
  pub top_k: usize,
  pub context_char_budget: usize,
  pub max_rows: usize,
  pub llm_timeout: Duration,
  pub embed_timeout: Duration,
  pub warehouse_timeout: Duration,
}

impl Settings {
  pub fn from_env() -> Self {
    Self {
      gemini_api_key: env_nonempty("GEMINI_API_KEY"),
      gemini_model: std::env::var("GEMINI_MODEL")
        .unwrap_or_else(|_| "gemini-1.5-pro-latest".to_string()),
      bigquery_project_id: env_nonempty("BIGQUERY_PROJECT_ID"),
      bigquery_access_token: env_nonempty("BIGQUERY_ACCESS_TOKEN"),
      schema_path: env_nonempty("TABLETALK_SCHEMA").map(PathBuf::from),
      static_dir: env_nonempty("TABLETALK_STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(default_static_dir),
      organization_id: std::env::var("TABLETALK_ORGANIZATION_ID")
        .unwrap_or_else(|_| "test_org_123".to_string()),
      top_k: env_usize("TABLETALK_TOP_K", DEFAULT_TOP_K),
      context_char_budget: env_usize("TABLETALK_CONTEXT_BUDGET", DEFAULT_CONTEXT_BUDGET),
      max_rows: env_usize("TABLETALK_MAX_ROWS", DEFAULT_MAX_ROWS),
      llm_timeout: Duration::from_secs(30),
      embed_timeout: Duration::from_secs(10),
      warehouse_timeout: Duration::from_secs(30),
    }
  }
}

fn env_nonempty(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
  std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn default_static_dir() -> PathBuf {
  dirs::home_dir()
    .unwrap_or_else(|| PathBuf::from("/tmp"))
    .join(".tabletalk")
    .join("static")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_sane() {
    let settings = Settings::from_env();
    assert!(settings.top_k >= 1);
    assert!(settings.context_char_budget > 0);
    assert!(settings.max_rows > 0);
    assert!(!settings.gemini_model.is_empty());
  }
}
