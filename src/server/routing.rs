//! Axum router configuration for all endpoints

use axum::{
  routing::{get, post},
  Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

use crate::server::handlers::{chat, status};
use crate::server::AppState;

/// Create the main application router
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
  Router::new()
    // Status and version endpoints
    .route("/status", get(status::status))
    .route("/version", get(status::version))
    // Pipeline endpoints
    .route("/api/chat", post(chat::chat))
    .route("/api/explain-sql", post(chat::explain_sql))
    // Chart artifacts
    .nest_service("/static", ServeDir::new(static_dir))
    .with_state(state)
}
