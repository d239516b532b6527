//! Primary embedder: Gemini's `embedContent` REST endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::error::EmbeddingUnavailable;

use super::{EmbeddingProvider, ProviderKind};

const EMBEDDING_MODEL: &str = "text-embedding-004";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Output dimensionality of `text-embedding-004`.
const DIMENSION: usize = 768;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct GeminiEmbedder {
  client: reqwest::Client,
  api_key: Option<String>,
  base_url: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
  embedding: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
  values: Vec<f32>,
}

impl GeminiEmbedder {
  pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());
    Self { client, api_key, base_url: BASE_URL.to_string() }
  }

  async fn request(&self, key: &str, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
    let url = format!("{}/models/{}:embedContent?key={}", self.base_url, EMBEDDING_MODEL, key);
    let body = json!({
      "model": format!("models/{EMBEDDING_MODEL}"),
      "content": { "parts": [{ "text": text }] },
    });

    let response = self
      .client
      .post(&url)
      .json(&body)
      .send()
      .await
      .map_err(|e| EmbeddingUnavailable(format!("embedding request failed: {e}")))?;

    if !response.status().is_success() {
      let status = response.status();
      let detail = response.text().await.unwrap_or_default();
      return Err(EmbeddingUnavailable(format!("embedding API returned {status}: {detail}")));
    }

    let parsed: EmbedResponse = response
      .json()
      .await
      .map_err(|e| EmbeddingUnavailable(format!("malformed embedding response: {e}")))?;

    if parsed.embedding.values.len() != DIMENSION {
      return Err(EmbeddingUnavailable(format!(
        "unexpected embedding dimension {}",
        parsed.embedding.values.len()
      )));
    }

    Ok(parsed.embedding.values)
  }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Gemini
  }

  fn dimension(&self) -> usize {
    DIMENSION
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
    let key = self
      .api_key
      .as_deref()
      .ok_or_else(|| EmbeddingUnavailable("GEMINI_API_KEY is not configured".to_string()))?;

    // One bounded retry for transient failures, then give up and let the
    // retriever fall back.
    match self.request(key, text).await {
      Ok(values) => Ok(values),
      Err(first) => {
        warn!(error = %first, "primary embedding call failed, retrying once");
        tokio::time::sleep(RETRY_BACKOFF).await;
        self.request(key, text).await
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn missing_api_key_is_unavailable_without_network() {
    let embedder = GeminiEmbedder::new(None, Duration::from_secs(1));
    let err = embedder.embed("anything").await.unwrap_err();
    assert!(err.to_string().contains("GEMINI_API_KEY"));
  }

  #[test]
  fn declares_gemini_space() {
    let embedder = GeminiEmbedder::new(None, Duration::from_secs(1));
    assert_eq!(embedder.kind(), ProviderKind::Gemini);
    assert_eq!(embedder.dimension(), DIMENSION);
  }
}
