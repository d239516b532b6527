//! Status and version endpoint handlers.

use axum::{extract::State, response::Json as ResponseJson};

use crate::server::types::{StatusResponse, VersionResponse};
use crate::server::AppState;

/// GET /status - Service health and readiness
pub async fn status(State(state): State<AppState>) -> ResponseJson<StatusResponse> {
  ResponseJson(StatusResponse {
    status: "operational".to_string(),
    service: env!("CARGO_PKG_NAME").to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    index_ready: !state.index.is_empty().await,
  })
}

/// GET /version - Service version
pub async fn version() -> ResponseJson<VersionResponse> {
  ResponseJson(VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() })
}
