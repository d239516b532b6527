//! Tabletalk - Natural-Language Analytics over a Data Warehouse
//!
//! Answers plain-English questions about warehouse data: retrieves relevant
//! schema context, synthesizes a read-only SQL query, executes it, and
//! enriches the result with a chart and a prose explanation.

pub mod app;
pub mod chart;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod explain;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod retriever;
pub mod schema;
pub mod server;
pub mod synthesis;
pub mod warehouse;
