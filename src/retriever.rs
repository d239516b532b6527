//! Schema retrieval: question in, bounded ranked schema context out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embeddings::EmbeddingProvider;
use crate::index::SharedSchemaIndex;
use crate::schema::SchemaFragment;

/// Ranked fragments for one question, already bounded by count and by the
/// character budget.
#[derive(Debug, Default)]
pub struct RetrievalResult {
  pub entries: Vec<(SchemaFragment, f32)>,
}

impl RetrievalResult {
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// The context string handed to the synthesizer: fragment texts joined by
  /// newlines, best match first.
  pub fn context_text(&self) -> String {
    self.entries.iter().map(|(f, _)| f.text.as_str()).collect::<Vec<_>>().join("\n")
  }
}

pub struct SchemaRetriever {
  index: SharedSchemaIndex,
  primary: Arc<dyn EmbeddingProvider>,
  fallback: Arc<dyn EmbeddingProvider>,
  top_k: usize,
  char_budget: usize,
}

impl SchemaRetriever {
  pub fn new(
    index: SharedSchemaIndex,
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    char_budget: usize,
  ) -> Self {
    Self { index, primary, fallback, top_k, char_budget }
  }

  /// Retrieve the schema fragments most relevant to the question.
  ///
  /// The question is embedded with the primary provider; on unavailability
  /// the fallback provider is tried once, and the index is queried only in
  /// the partition of whichever provider produced the vector. If both fail,
  /// the result is empty and synthesis proceeds without schema context.
  pub async fn retrieve(&self, question: &str) -> RetrievalResult {
    let (vector, provider) = match self.primary.embed(question).await {
      Ok(v) => (v, self.primary.kind()),
      Err(primary_err) => {
        warn!(error = %primary_err, "primary embedder unavailable, trying fallback");
        match self.fallback.embed(question).await {
          Ok(v) => (v, self.fallback.kind()),
          Err(fallback_err) => {
            warn!(error = %fallback_err, "fallback embedder also failed, retrieving nothing");
            return RetrievalResult::default();
          }
        }
      }
    };

    let mut entries = match self.index.query(&vector, provider, self.top_k).await {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "index query failed, retrieving nothing");
        return RetrievalResult::default();
      }
    };

    // Enforce the character budget by dropping the lowest-scored fragments
    // first; entries are already in descending score order.
    let mut total = 0usize;
    let mut kept = 0usize;
    for (fragment, _) in &entries {
      let cost = fragment.text.len() + 1; // joining newline
      if total + cost > self.char_budget {
        break;
      }
      total += cost;
      kept += 1;
    }
    entries.truncate(kept);

    debug!(kept, chars = total, provider = provider.as_str(), "schema context assembled");
    RetrievalResult { entries }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::embeddings::{EmbeddingProvider, LexicalEmbedder, ProviderKind};
  use crate::error::EmbeddingUnavailable;
  use crate::index::{SchemaIndex, SharedSchemaIndex};
  use crate::schema::SchemaCatalog;
  use async_trait::async_trait;

  struct DownEmbedder;

  #[async_trait]
  impl EmbeddingProvider for DownEmbedder {
    fn kind(&self) -> ProviderKind {
      ProviderKind::Gemini
    }
    fn dimension(&self) -> usize {
      768
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
      Err(EmbeddingUnavailable("quota exhausted".to_string()))
    }
  }

  async fn retriever_with_index(top_k: usize, char_budget: usize) -> SchemaRetriever {
    let catalog = SchemaCatalog::load(None).unwrap();
    let fallback = LexicalEmbedder::new();
    let shared = SharedSchemaIndex::new();
    shared.publish(SchemaIndex::build(&catalog, &DownEmbedder, &fallback).await).await;

    SchemaRetriever::new(
      shared,
      Arc::new(DownEmbedder),
      Arc::new(LexicalEmbedder::new()),
      top_k,
      char_budget,
    )
  }

  #[tokio::test]
  async fn falls_back_when_primary_is_down() {
    let retriever = retriever_with_index(5, 4000).await;
    let result = retriever.retrieve("What is the distribution of attendees by profession?").await;

    assert!(!result.is_empty());
    assert!(result.entries.len() <= 5);
    // The profession column should surface for this question.
    assert!(result.entries.iter().any(|(f, _)| f.column.as_deref() == Some("profession")));
  }

  #[tokio::test]
  async fn respects_fragment_count_bound() {
    let retriever = retriever_with_index(2, 100_000).await;
    let result = retriever.retrieve("events").await;
    assert!(result.entries.len() <= 2);
  }

  #[tokio::test]
  async fn respects_character_budget() {
    let budget = 150;
    let retriever = retriever_with_index(10, budget).await;
    let result = retriever.retrieve("attendee profession and county").await;
    assert!(result.context_text().len() <= budget);
  }

  #[tokio::test]
  async fn both_providers_down_yields_empty_result() {
    let catalog = SchemaCatalog::load(None).unwrap();
    let shared = SharedSchemaIndex::new();
    shared.publish(SchemaIndex::build(&catalog, &DownEmbedder, &LexicalEmbedder::new()).await).await;

    let retriever =
      SchemaRetriever::new(shared, Arc::new(DownEmbedder), Arc::new(DownEmbedder), 5, 2000);
    let result = retriever.retrieve("anything").await;
    assert!(result.is_empty());
    assert_eq!(result.context_text(), "");
  }

  #[tokio::test]
  async fn scores_are_descending() {
    let retriever = retriever_with_index(7, 4000).await;
    let result = retriever.retrieve("organization category").await;
    for pair in result.entries.windows(2) {
      assert!(pair[0].1 >= pair[1].1);
    }
  }
}
