//! Command handlers for the binary.

use std::net::SocketAddr;

use anyhow::Result;
use tracing::info;

use crate::app::App;
use crate::config::Settings;
use crate::server::server::start_server;

/// Start the REST server, building the schema index first.
pub async fn serve(addr: SocketAddr) -> Result<()> {
  let app = App::from_settings(Settings::from_env())?;

  info!(tables = app.catalog.tables.len(), "building schema index");
  app.ensure_index().await;

  let static_dir = app.settings.static_dir.clone();
  start_server(addr, app.state(), &static_dir).await
}

/// Answer one question from the command line and print the outcome.
pub async fn ask(question: &str) -> Result<()> {
  let app = App::from_settings(Settings::from_env())?;
  app.ensure_index().await;

  let answer = app.orchestrator.answer(question).await;

  if let Some(sql) = &answer.sql {
    println!("SQL: {sql}");
  }
  if let Some(data) = &answer.data {
    println!("Rows: {}{}", data.rows.len(), if data.truncated { " (truncated)" } else { "" });
  }
  if let Some(url) = &answer.chart_url {
    println!("Chart: {url}");
  }
  println!("{}", answer.explanation);
  Ok(())
}

/// Force a rebuild of the schema index, regardless of the fingerprint.
pub async fn index() -> Result<()> {
  let app = App::from_settings(Settings::from_env())?;
  app.rebuild_index().await;

  println!("Indexed {} schema fragments", app.catalog.fragments().len());
  Ok(())
}
