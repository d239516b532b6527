//! Component assembly.
//!
//! Builds the pipeline from settings once and hands out cheap clones of the
//! shared pieces to the server and CLI.

use std::sync::Arc;

use anyhow::Result;

use crate::chart::ChartRenderer;
use crate::config::Settings;
use crate::embeddings::{EmbeddingProvider, GeminiEmbedder, LexicalEmbedder};
use crate::explain::Explainer;
use crate::index::SharedSchemaIndex;
use crate::llm::{GeminiModel, LanguageModel};
use crate::pipeline::Orchestrator;
use crate::retriever::SchemaRetriever;
use crate::schema::SchemaCatalog;
use crate::server::AppState;
use crate::synthesis::SqlSynthesizer;
use crate::warehouse::{BigQueryWarehouse, Warehouse};

pub struct App {
  pub settings: Settings,
  pub catalog: SchemaCatalog,
  pub index: SharedSchemaIndex,
  pub orchestrator: Arc<Orchestrator>,
  pub explainer: Arc<Explainer>,
  primary: Arc<dyn EmbeddingProvider>,
  fallback: Arc<dyn EmbeddingProvider>,
}

impl App {
  pub fn from_settings(settings: Settings) -> Result<Self> {
    let catalog = SchemaCatalog::load(settings.schema_path.as_deref())?;

    let primary: Arc<dyn EmbeddingProvider> =
      Arc::new(GeminiEmbedder::new(settings.gemini_api_key.clone(), settings.embed_timeout));
    let fallback: Arc<dyn EmbeddingProvider> = Arc::new(LexicalEmbedder::new());
    let index = SharedSchemaIndex::new();

    let model: Arc<dyn LanguageModel> = Arc::new(GeminiModel::new(
      settings.gemini_api_key.clone(),
      settings.gemini_model.clone(),
      settings.llm_timeout,
    ));

    let retriever = SchemaRetriever::new(
      index.clone(),
      primary.clone(),
      fallback.clone(),
      settings.top_k,
      settings.context_char_budget,
    );
    let synthesizer = SqlSynthesizer::new(model.clone());
    let warehouse: Arc<dyn Warehouse> = Arc::new(BigQueryWarehouse::new(
      settings.bigquery_project_id.clone(),
      settings.bigquery_access_token.clone(),
      settings.max_rows,
      settings.warehouse_timeout,
    ));
    let renderer = ChartRenderer::new(settings.static_dir.clone());

    let orchestrator = Arc::new(Orchestrator::new(
      retriever,
      synthesizer,
      warehouse,
      Explainer::new(model.clone()),
      renderer,
      settings.organization_id.clone(),
    ));
    let explainer = Arc::new(Explainer::new(model));

    Ok(Self { settings, catalog, index, orchestrator, explainer, primary, fallback })
  }

  /// Build the schema index unless the current one already matches the
  /// catalog. Returns whether a build happened.
  pub async fn ensure_index(&self) -> bool {
    self.index.ensure_built(&self.catalog, self.primary.as_ref(), self.fallback.as_ref()).await
  }

  /// Rebuild the schema index unconditionally.
  pub async fn rebuild_index(&self) {
    self.index.rebuild(&self.catalog, self.primary.as_ref(), self.fallback.as_ref()).await
  }

  pub fn state(&self) -> AppState {
    AppState {
      orchestrator: self.orchestrator.clone(),
      explainer: self.explainer.clone(),
      index: self.index.clone(),
    }
  }
}
