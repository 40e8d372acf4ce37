//! CLI command implementations for herakles-synthetic-generator.
//!
//! This module provides implementations for all CLI subcommands:
//! - `config`: Configuration file generation
//! - `simulate`: Offline simulation run with a summary report

pub mod config;
pub mod simulate;

// Re-export command functions
pub use config::command_config;
pub use simulate::command_simulate;
