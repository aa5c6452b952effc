//! Configuration validation.
//!
//! This module validates a loaded configuration and the project ids handed
//! to a verification run before any working directory is touched.

use crate::error::{ConfigError, EcatError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::spec::{EcatConfig, ReportBackendKind, ReportingConfig, TerraformConfig, VerificationConfig};

/// Naming convention for project ids: `<team>-<name>-<environment>`.
pub const VALID_PROJECT_ID_FORMAT: &str = "^[a-z]{4}-[a-z0-9]{4,31}-(?:dev|prod|test)$";

#[allow(clippy::expect_used)]
static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VALID_PROJECT_ID_FORMAT).expect("project id pattern is valid"));

/// Cloud targets with a known module layout.
const SUPPORTED_CLOUDS: &[&str] = &["gcp", "aws", "triton"];

/// Validator for eCat configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Known cloud targets.
    known_clouds: HashSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator with the default cloud targets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_clouds: SUPPORTED_CLOUDS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, if any.
    pub fn validate(&self, config: &EcatConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_terraform(&config.terraform, &mut result);
        self.validate_verification(&config.verification, &mut result);
        Self::validate_reporting(&config.reporting, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(EcatError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    /// Checks a project id against [`VALID_PROJECT_ID_FORMAT`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProjectId`] if the id does not match.
    pub fn validate_project_id(project_id: &str) -> Result<()> {
        if PROJECT_ID_RE.is_match(project_id) {
            Ok(())
        } else {
            Err(EcatError::Config(ConfigError::InvalidProjectId {
                project_id: project_id.to_string(),
                pattern: VALID_PROJECT_ID_FORMAT.to_string(),
            }))
        }
    }

    fn validate_terraform(terraform: &TerraformConfig, result: &mut ValidationResult) {
        if terraform.binary.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("terraform.binary"),
                message: String::from("Tool binary cannot be empty"),
            });
        }

        if !terraform.working_dir_base.is_absolute() {
            result.warnings.push(format!(
                "terraform.working_dir_base: '{}' is relative and depends on the current directory",
                terraform.working_dir_base.display()
            ));
        }

        if terraform.command_timeout_secs == Some(0) {
            result.errors.push(ValidationError {
                field: String::from("terraform.command_timeout_secs"),
                message: String::from("Command timeout must be at least 1 second"),
            });
        }

        if terraform.failure_exit_codes.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("terraform.failure_exit_codes"),
                message: String::from("At least one failure exit code is required"),
            });
        }

        if terraform.failure_exit_codes.contains(&0) {
            result.errors.push(ValidationError {
                field: String::from("terraform.failure_exit_codes"),
                message: String::from("Exit code 0 cannot be treated as a failure"),
            });
        }
    }

    fn validate_verification(&self, verification: &VerificationConfig, result: &mut ValidationResult) {
        if !is_valid_name(&verification.cloud) {
            result.errors.push(ValidationError {
                field: String::from("verification.cloud"),
                message: format!(
                    "Cloud target '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    verification.cloud
                ),
            });
        } else if !self.known_clouds.contains(&verification.cloud) {
            result.warnings.push(format!(
                "verification.cloud: Unknown cloud target '{}'",
                verification.cloud
            ));
        }
    }

    fn validate_reporting(reporting: &ReportingConfig, result: &mut ValidationResult) {
        if reporting.backend == ReportBackendKind::Local
            && reporting.metrics_file.as_os_str().is_empty()
        {
            result.errors.push(ValidationError {
                field: String::from("reporting.metrics_file"),
                message: String::from("Metrics file is required for the local backend"),
            });
        }
    }
}

/// Validates that a name is safe to use as a path component and workspace
/// name: lowercase alphanumeric with single hyphens, starting with a letter.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
