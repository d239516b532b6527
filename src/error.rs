//! Error taxonomy for the question-answering pipeline.
//!
//! Each stage has its own error type so the orchestrator can tell recoverable
//! conditions (embedding fallback) from terminal ones (synthesis, execution)
//! and from non-fatal enrichment failures (chart, explanation).

use thiserror::Error;

/// An embedding provider could not produce a vector. Recoverable: the
/// retriever falls back to the secondary provider, then to empty context.
#[derive(Debug, Error)]
#[error("embedding provider unavailable: {0}")]
pub struct EmbeddingUnavailable(pub String);

/// Language model call failures, shared by synthesis and explanation.
#[derive(Debug, Error)]
pub enum LlmError {
  /// Transport, quota, auth, or timeout failure reaching the model.
  #[error("language model unavailable: {0}")]
  Unavailable(String),
  /// The model answered but the response body was not usable.
  #[error("malformed language model response: {0}")]
  Malformed(String),
}

/// Terminal failures of the SQL synthesis stage.
#[derive(Debug, Error)]
pub enum SynthesisError {
  #[error("SQL synthesis unavailable: {0}")]
  Unavailable(String),
  /// The model responded but no usable query could be extracted.
  #[error("could not extract a SQL query from the model response: {0}")]
  Parse(String),
}

/// Coarse classification of warehouse execution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Syntax,
  Permission,
  Timeout,
  ResourceExceeded,
  Unknown,
}

impl ErrorCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorCategory::Syntax => "syntax",
      ErrorCategory::Permission => "permission",
      ErrorCategory::Timeout => "timeout",
      ErrorCategory::ResourceExceeded => "resource-exceeded",
      ErrorCategory::Unknown => "unknown",
    }
  }
}

/// A failed warehouse execution. The message is the warehouse's own error
/// text, surfaced verbatim to the caller. Never retried.
#[derive(Debug, Error)]
#[error("warehouse error ({}): {message}", category.as_str())]
pub struct ExecutionError {
  pub category: ErrorCategory,
  pub message: String,
}

impl ExecutionError {
  pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
    Self { category, message: message.into() }
  }
}

/// Chart rendering failure. Non-fatal: logged and degraded to "no chart".
#[derive(Debug, Error)]
pub enum ChartError {
  #[error("failed to write chart artifact: {0}")]
  Io(#[from] std::io::Error),
  #[error("chart data could not be rendered: {0}")]
  Render(String),
}

/// Vector index misuse, e.g. querying with a vector of the wrong dimension.
#[derive(Debug, Error)]
pub enum IndexError {
  #[error("vector dimension {got} does not match partition dimension {expected}")]
  DimensionMismatch { expected: usize, got: usize },
}
