//! Text embedding providers.
//!
//! Two interchangeable implementations share the [`EmbeddingProvider`]
//! contract: a remote primary and a local deterministic fallback. Their
//! vector spaces are incompatible, so every vector is tagged with the
//! provider that produced it and the index only compares vectors within one
//! provider's partition.

pub mod gemini;
pub mod lexical;

use async_trait::async_trait;

use crate::error::EmbeddingUnavailable;

pub use gemini::GeminiEmbedder;
pub use lexical::LexicalEmbedder;

/// Which embedding space a vector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
  Gemini,
  Lexical,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderKind::Gemini => "gemini",
      ProviderKind::Lexical => "lexical",
    }
  }
}

/// A fixed-length vector plus the identity of the fragment it represents and
/// the provider whose space it lives in.
#[derive(Debug, Clone)]
pub struct EmbeddingVector {
  pub fragment_id: String,
  pub provider: ProviderKind,
  pub values: Vec<f32>,
}

/// Capability interface for turning text into vectors. Deterministic for
/// identical input and provider version.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn kind(&self) -> ProviderKind;

  /// Declared output dimensionality; every vector this provider produces has
  /// exactly this length.
  fn dimension(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable>;
}

/// Cosine similarity between two vectors of equal length. Mismatched or
/// zero-magnitude inputs score 0.0 rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }

  let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }

  dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
  }

  #[test]
  fn cosine_similarity_degenerate_inputs() {
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
  }
}
