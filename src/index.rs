//! In-memory schema vector index.
//!
//! Holds one entry per schema fragment, partitioned by embedding provider so
//! vectors from incompatible spaces are never compared. The index is
//! process-wide, read-mostly state: built once at startup (skipped when the
//! catalog fingerprint already matches) and replaced wholesale by an atomic
//! swap on rebuild, so concurrent readers never observe a partial index.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::embeddings::{cosine_similarity, EmbeddingProvider, EmbeddingVector, ProviderKind};
use crate::error::IndexError;
use crate::schema::{SchemaCatalog, SchemaFragment};

struct IndexEntry {
  fragment: SchemaFragment,
  vector: Vec<f32>,
}

struct Partition {
  dimension: usize,
  entries: Vec<IndexEntry>,
}

/// Immutable-once-published vector index over schema fragments.
#[derive(Default)]
pub struct SchemaIndex {
  fingerprint: u64,
  partitions: HashMap<ProviderKind, Partition>,
}

impl SchemaIndex {
  pub fn new(fingerprint: u64) -> Self {
    Self { fingerprint, partitions: HashMap::new() }
  }

  pub fn fingerprint(&self) -> u64 {
    self.fingerprint
  }

  pub fn is_empty(&self) -> bool {
    self.partitions.values().all(|p| p.entries.is_empty())
  }

  pub fn partition_len(&self, provider: ProviderKind) -> usize {
    self.partitions.get(&provider).map_or(0, |p| p.entries.len())
  }

  /// Insert a fragment's vector into its provider partition. The first
  /// insert fixes the partition's dimensionality to the provider's declared
  /// dimension; later inserts must match it.
  pub fn upsert(
    &mut self,
    fragment: SchemaFragment,
    vector: EmbeddingVector,
    declared_dimension: usize,
  ) -> Result<(), IndexError> {
    let partition = self
      .partitions
      .entry(vector.provider)
      .or_insert_with(|| Partition { dimension: declared_dimension, entries: Vec::new() });

    if vector.values.len() != partition.dimension {
      return Err(IndexError::DimensionMismatch {
        expected: partition.dimension,
        got: vector.values.len(),
      });
    }

    // Replace an existing entry for the same fragment rather than duplicating.
    partition.entries.retain(|e| e.fragment.id != fragment.id);
    partition.entries.push(IndexEntry { fragment, vector: vector.values });
    Ok(())
  }

  /// Top-k fragments by cosine similarity within one provider partition.
  pub fn query(
    &self,
    vector: &[f32],
    provider: ProviderKind,
    k: usize,
  ) -> Result<Vec<(SchemaFragment, f32)>, IndexError> {
    let Some(partition) = self.partitions.get(&provider) else {
      return Ok(Vec::new());
    };

    if vector.len() != partition.dimension {
      return Err(IndexError::DimensionMismatch {
        expected: partition.dimension,
        got: vector.len(),
      });
    }

    let mut scored: Vec<(SchemaFragment, f32)> = partition
      .entries
      .iter()
      .map(|entry| (entry.fragment.clone(), cosine_similarity(vector, &entry.vector)))
      .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
  }

  /// Build a fresh index from the catalog. Every fragment is embedded with
  /// the fallback provider; the primary provider is attempted as well, but
  /// the first unavailability abandons the primary partition for this build
  /// (the fallback partition still serves queries).
  pub async fn build(
    catalog: &SchemaCatalog,
    primary: &dyn EmbeddingProvider,
    fallback: &dyn EmbeddingProvider,
  ) -> Self {
    let fragments = catalog.fragments();
    let mut index = SchemaIndex::new(catalog.fingerprint());
    let mut primary_alive = true;

    for fragment in fragments {
      match fallback.embed(&fragment.text).await {
        Ok(values) => {
          let vector = EmbeddingVector {
            fragment_id: fragment.id.clone(),
            provider: fallback.kind(),
            values,
          };
          if let Err(e) = index.upsert(fragment.clone(), vector, fallback.dimension()) {
            warn!(fragment = %fragment.id, error = %e, "skipping fallback vector");
          }
        }
        Err(e) => warn!(fragment = %fragment.id, error = %e, "fallback embedding failed"),
      }

      if primary_alive {
        match primary.embed(&fragment.text).await {
          Ok(values) => {
            let vector = EmbeddingVector {
              fragment_id: fragment.id.clone(),
              provider: primary.kind(),
              values,
            };
            if let Err(e) = index.upsert(fragment.clone(), vector, primary.dimension()) {
              warn!(fragment = %fragment.id, error = %e, "skipping primary vector");
            }
          }
          Err(e) => {
            warn!(error = %e, "primary embedder unavailable, indexing with fallback only");
            primary_alive = false;
          }
        }
      }
    }

    info!(
      primary = index.partition_len(primary.kind()),
      fallback = index.partition_len(fallback.kind()),
      "schema index built"
    );
    index
  }
}

/// Process-wide handle to the current index. Readers take a short read lock;
/// rebuilds construct the replacement off to the side and publish it with a
/// single swap under the write lock.
#[derive(Clone, Default)]
pub struct SharedSchemaIndex {
  inner: Arc<RwLock<SchemaIndex>>,
}

impl SharedSchemaIndex {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn query(
    &self,
    vector: &[f32],
    provider: ProviderKind,
    k: usize,
  ) -> Result<Vec<(SchemaFragment, f32)>, IndexError> {
    self.inner.read().await.query(vector, provider, k)
  }

  pub async fn publish(&self, index: SchemaIndex) {
    *self.inner.write().await = index;
  }

  pub async fn is_empty(&self) -> bool {
    self.inner.read().await.is_empty()
  }

  pub async fn partition_len(&self, provider: ProviderKind) -> usize {
    self.inner.read().await.partition_len(provider)
  }

  /// Build the index if it is missing or stale for this catalog. Returns
  /// whether a build actually happened.
  pub async fn ensure_built(
    &self,
    catalog: &SchemaCatalog,
    primary: &dyn EmbeddingProvider,
    fallback: &dyn EmbeddingProvider,
  ) -> bool {
    {
      let current = self.inner.read().await;
      if !current.is_empty() && current.fingerprint() == catalog.fingerprint() {
        info!("schema index already matches catalog fingerprint, skipping rebuild");
        return false;
      }
    }

    self.rebuild(catalog, primary, fallback).await;
    true
  }

  /// Rebuild unconditionally, ignoring the fingerprint. This is how a
  /// primary partition left empty by a provider outage gets repopulated
  /// once the provider is back.
  pub async fn rebuild(
    &self,
    catalog: &SchemaCatalog,
    primary: &dyn EmbeddingProvider,
    fallback: &dyn EmbeddingProvider,
  ) {
    let fresh = SchemaIndex::build(catalog, primary, fallback).await;
    self.publish(fresh).await;
  }
}
