//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, EcatError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::EcatConfig;

/// Configuration parser for loading eCat configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EcatConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EcatError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EcatError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EcatConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(EcatConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            EcatError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables use the `ECAT_<SECTION>_<KEY>` naming, see
    /// [`ConfigParser::apply_env_overrides`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<EcatConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file, using defaults");
                EcatConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(config: &mut EcatConfig) {
        if let Ok(binary) = std::env::var("ECAT_TERRAFORM_BINARY") {
            debug!("Overriding terraform.binary from environment");
            config.terraform.binary = binary;
        }

        if let Ok(base) = std::env::var("ECAT_WORKING_DIR_BASE") {
            debug!("Overriding terraform.working_dir_base from environment");
            config.terraform.working_dir_base = PathBuf::from(base);
        }

        if let Ok(cloud) = std::env::var("ECAT_CLOUD") {
            debug!("Overriding verification.cloud from environment");
            config.verification.cloud = cloud;
        }

        if let Ok(metrics_file) = std::env::var("ECAT_METRICS_FILE") {
            debug!("Overriding reporting.metrics_file from environment");
            config.reporting.metrics_file = PathBuf::from(metrics_file);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EcatError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["ecat.yaml", "ecat.yml"];

/// Finds the configuration file.
///
/// Searches `start_dir` and its parents first, then the user configuration
/// directory (`~/.config/ecat/` on Linux). Returns `None` when no file
/// exists, in which case defaults apply.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    let user_dir = dirs::config_dir()?.join("ecat");
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|filename| user_dir.join(filename))
        .find(|path| path.exists())
}
