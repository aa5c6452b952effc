//! CLI module for the eCat verification tool.
//!
//! This module provides the command-line interface for verifying
//! infrastructure code and inspecting state documents.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
