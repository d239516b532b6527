use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tabletalk::cli::commands;

#[derive(Parser)]
#[command(name = "tabletalk")]
#[command(about = "Tabletalk - Natural-Language Analytics\nAsk plain-English questions about your data warehouse")]
#[command(version)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Start the REST server
  Serve {
    /// Address to bind
    #[arg(long, env = "TABLETALK_ADDR", default_value = "127.0.0.1:8000")]
    addr: SocketAddr,
  },
  /// Answer a single question and print the result
  Ask {
    /// The question to answer
    question: String,
  },
  /// Rebuild the schema vector index
  Index,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();
  match cli.command {
    Command::Serve { addr } => commands::serve(addr).await,
    Command::Ask { question } => commands::ask(&question).await,
    Command::Index => commands::index().await,
  }
}
