//! Language model client.
//!
//! One capability trait with a Gemini-backed implementation. Call sites pick
//! a temperature per task: 0.0 for SQL synthesis, higher for prose.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::error::LlmError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);
const MAX_OUTPUT_TOKENS: u32 = 2048;

#[async_trait]
pub trait LanguageModel: Send + Sync {
  async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, LlmError>;
}

pub struct GeminiModel {
  client: reqwest::Client,
  api_key: Option<String>,
  model: String,
  base_url: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Content,
}

#[derive(Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

impl GeminiModel {
  pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());
    Self { client, api_key, model: model.into(), base_url: BASE_URL.to_string() }
  }

  async fn request(&self, key: &str, prompt: &str, temperature: f32) -> Result<String, LlmError> {
    let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, key);
    let body = json!({
      "contents": [{ "parts": [{ "text": prompt }] }],
      "generationConfig": {
        "temperature": temperature,
        "topP": 1,
        "topK": 1,
        "maxOutputTokens": MAX_OUTPUT_TOKENS,
      },
    });

    let response = self
      .client
      .post(&url)
      .json(&body)
      .send()
      .await
      .map_err(|e| LlmError::Unavailable(format!("model request failed: {e}")))?;

    if !response.status().is_success() {
      let status = response.status();
      let detail = response.text().await.unwrap_or_default();
      return Err(LlmError::Unavailable(format!("model API returned {status}: {detail}")));
    }

    let parsed: GenerateResponse = response
      .json()
      .await
      .map_err(|e| LlmError::Malformed(format!("unparseable model response: {e}")))?;

    let text = parsed
      .candidates
      .into_iter()
      .next()
      .and_then(|c| c.content.parts.into_iter().next())
      .map(|p| p.text)
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(LlmError::Malformed("model response contained no text".to_string()));
    }

    Ok(text)
  }
}

#[async_trait]
impl LanguageModel for GeminiModel {
  async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
    let key = self
      .api_key
      .as_deref()
      .ok_or_else(|| LlmError::Unavailable("GEMINI_API_KEY is not configured".to_string()))?;

    // One bounded retry for transient transport failures. Malformed
    // responses are not retried; they are deterministic for a given prompt
    // often enough that a second call rarely helps.
    match self.request(key, prompt, temperature).await {
      Ok(text) => Ok(text),
      Err(LlmError::Unavailable(first)) => {
        warn!(error = %first, "model call failed, retrying once");
        tokio::time::sleep(RETRY_BACKOFF).await;
        self.request(key, prompt, temperature).await
      }
      Err(other) => Err(other),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn missing_api_key_is_unavailable_without_network() {
    let model = GeminiModel::new(None, "gemini-1.5-pro-latest", Duration::from_secs(1));
    let err = model.generate("hello", 0.0).await.unwrap_err();
    assert!(matches!(err, LlmError::Unavailable(_)));
  }
}
