//! Fallback embedder: deterministic local feature hashing.
//!
//! When the remote provider is down (quota, network, missing key), retrieval
//! still needs vectors from a consistent space. This embedder hashes word
//! unigrams and adjacent-word bigrams into a fixed number of buckets and
//! L2-normalizes the result. It is much weaker semantically than a learned
//! model, which matches the graceful-degradation contract: worse retrieval
//! beats no retrieval.

use async_trait::async_trait;

use crate::error::EmbeddingUnavailable;

use super::{EmbeddingProvider, ProviderKind};

const DIMENSION: usize = 256;

#[derive(Default)]
pub struct LexicalEmbedder;

impl LexicalEmbedder {
  pub fn new() -> Self {
    Self
  }

  fn vectorize(text: &str) -> Vec<f32> {
    let tokens: Vec<String> = text
      .to_lowercase()
      .split(|c: char| !c.is_ascii_alphanumeric())
      .filter(|t| !t.is_empty())
      .map(str::to_string)
      .collect();

    let mut vector = vec![0.0f32; DIMENSION];
    for token in &tokens {
      vector[bucket(token)] += 1.0;
    }
    for pair in tokens.windows(2) {
      vector[bucket(&format!("{} {}", pair[0], pair[1]))] += 0.5;
    }

    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > f32::EPSILON {
      for value in vector.iter_mut() {
        *value /= magnitude;
      }
    }
    vector
  }
}

/// FNV-1a over the token bytes. Stable across runs and platforms, which
/// keeps the fallback space consistent between index build and query time.
fn bucket(token: &str) -> usize {
  let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
  for byte in token.bytes() {
    hash ^= u64::from(byte);
    hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
  }
  (hash % DIMENSION as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for LexicalEmbedder {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Lexical
  }

  fn dimension(&self) -> usize {
    DIMENSION
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
    Ok(Self::vectorize(text))
  }
}
