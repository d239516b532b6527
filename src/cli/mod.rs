//! CLI command implementations.

pub mod commands;
