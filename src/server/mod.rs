//! REST server exposing the question-answering pipeline.

pub mod handlers;
pub mod routing;
pub mod server;
pub mod types;

use std::sync::Arc;

use crate::explain::Explainer;
use crate::index::SharedSchemaIndex;
use crate::pipeline::Orchestrator;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<Orchestrator>,
  pub explainer: Arc<Explainer>,
  pub index: SharedSchemaIndex,
}
