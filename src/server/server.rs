//! REST server startup and configuration

use anyhow::Result;
use axum::serve;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::server::routing::create_router;
use crate::server::AppState;

/// Start the REST server
pub async fn start_server(addr: SocketAddr, state: AppState, static_dir: &Path) -> Result<()> {
  let app = create_router(state, static_dir).layer(
    ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()), // TODO: Configure CORS properly for production
  );

  let listener = TcpListener::bind(addr).await?;
  info!(%addr, "server listening");

  serve(listener, app).await.map_err(|e| anyhow::anyhow!("server error: {e}"))
}
