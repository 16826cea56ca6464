//! Subcommand implementations.

pub mod config;
pub mod echo;
pub mod query;
