//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// eCat - Twin-deployment verification for infrastructure code.
#[derive(Parser, Debug)]
#[command(name = "ecat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "ECAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logging: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a test and a real copy of a project and verify them.
    Verify {
        /// Project id, e.g. `mesa-app1-dev`.
        #[arg(long)]
        project_id: String,

        /// Directory holding the infrastructure code.
        #[arg(long)]
        code_dir: PathBuf,

        /// Directory whose files override those of the code directory.
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },

    /// Validate the configuration.
    Validate,

    /// Print the normalized form of a state document.
    Normalize {
        /// Path to the state JSON file.
        state: PathBuf,
    },

    /// Compare two state documents after normalization.
    Compare {
        /// First state JSON file.
        a: PathBuf,

        /// Second state JSON file.
        b: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
