//! eCat CLI entrypoint.
//!
//! This is the main entrypoint for the ecat command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ecat::cli::{Cli, Commands, OutputFormatter};
use ecat::config::{ConfigParser, ConfigValidator, EcatConfig, find_config_file};
use ecat::deployer::{DeploymentIdentity, FileProvider, LocalDirectoryProvider};
use ecat::error::{EcatError, Result, WrongStateError};
use ecat::reporter::Reporter;
use ecat::state::{StateNormalizer, TerraformState, diff_states};
use ecat::terraform::{CommandRunner, TokioCommandRunner};
use ecat::verifier::DeploymentVerifier;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(
        cli.verbose || config.logging.debug,
        cli.json_logging || config.logging.json,
    );

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli.command, config, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(command: Commands, config: EcatConfig, formatter: &OutputFormatter) -> Result<bool> {
    match command {
        Commands::Verify {
            project_id,
            code_dir,
            config_dir,
        } => cmd_verify(config, &project_id, code_dir, config_dir, formatter).await,
        Commands::Validate => cmd_validate(&config, formatter),
        Commands::Normalize { state } => cmd_normalize(&state, formatter).await,
        Commands::Compare { a, b } => cmd_compare(&a, &b, formatter).await,
    }
}

/// Verify a project.
async fn cmd_verify(
    config: EcatConfig,
    project_id: &str,
    code_dir: PathBuf,
    config_dir: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    ConfigValidator::new().validate(&config)?;
    ConfigValidator::validate_project_id(project_id)?;

    let identity = DeploymentIdentity::real(project_id, config.verification.cloud.as_str())?;

    let mut provider = LocalDirectoryProvider::new(code_dir);
    if let Some(dir) = config_dir {
        provider = provider.with_overlay(dir);
    }
    let files = provider.files().await?;
    info!("Collected {} source file(s)", files.len());

    let runner: Arc<dyn CommandRunner> =
        Arc::new(TokioCommandRunner::new().with_timeout(config.terraform.command_timeout()));
    let reporter = Reporter::from_config(&config.reporting);
    let mut verifier = DeploymentVerifier::new(config, runner, reporter);

    match verifier.verify(&identity, &files).await {
        Ok(report) => {
            println!("{}", formatter.format_report(&report));
            Ok(true)
        }
        Err(e) => {
            if let EcatError::WrongState(WrongStateError::StateDivergence { differences, .. }) = &e {
                println!("{}", formatter.format_comparison(differences));
            }
            match verifier.last_report() {
                Some(report) => println!("{}", formatter.format_report(report)),
                None => eprintln!("{}", formatter.format_error(&e.to_string())),
            }
            Ok(false)
        }
    }
}

/// Validate configuration.
fn cmd_validate(config: &EcatConfig, formatter: &OutputFormatter) -> Result<bool> {
    let result = ConfigValidator::new().validate(config)?;
    println!("{}", formatter.format_validation(&result));
    Ok(result.is_valid())
}

/// Print a normalized state document.
async fn cmd_normalize(path: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let state = read_state(path).await?;
    let normalized = StateNormalizer::new().normalize(&state);
    println!("{}", formatter.format_state(&normalized));
    Ok(true)
}

/// Compare two state documents.
async fn cmd_compare(a: &Path, b: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let normalizer = StateNormalizer::new();
    let a = normalizer.normalize(&read_state(a).await?);
    let b = normalizer.normalize(&read_state(b).await?);

    let differences = diff_states(&a, &b)?;
    println!("{}", formatter.format_comparison(&differences));
    Ok(differences.is_empty())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the configuration, falling back to defaults when no file exists.
fn load_config(config_path: Option<&Path>) -> Result<EcatConfig> {
    let config_file = config_path.map_or_else(|| find_config_file("."), |path| Some(path.to_path_buf()));

    let base = config_file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    if let Some(path) = &config_file {
        debug!("Loading configuration from: {}", path.display());
    }
    parser.load_with_env(config_file.as_deref())
}

/// Reads a state document from disk.
async fn read_state(path: &Path) -> Result<TerraformState> {
    let content = tokio::fs::read_to_string(path).await?;
    TerraformState::from_json(&content)
}
