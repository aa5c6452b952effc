//! Configuration specification types for eCat.
//!
//! This module defines the structs that map to the `ecat.yaml` file. Every
//! section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EcatConfig {
    /// External tool settings.
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// Verification behaviour.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Reporting backend.
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for invoking the infrastructure tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerraformConfig {
    /// Tool binary name or path.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Base directory under which deployer working directories are created.
    #[serde(default = "default_working_dir_base")]
    pub working_dir_base: PathBuf,
    /// Per-command timeout. `None` blocks until the tool exits.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// Exit codes treated as tool failures.
    #[serde(default = "default_failure_exit_codes")]
    pub failure_exit_codes: Vec<i32>,
}

/// Settings controlling a verification run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationConfig {
    /// Cloud target the deployments are built for.
    #[serde(default = "default_cloud")]
    pub cloud: String,
    /// Whether the test and real applies run one after another or together.
    #[serde(default)]
    pub apply_mode: ApplyMode,
    /// How test and real states are expected to relate.
    #[serde(default)]
    pub comparison: ComparisonPolicy,
    /// What to do with a pre-existing test workspace.
    #[serde(default)]
    pub test_workspace_policy: WorkspacePolicy,
}

/// Scheduling of the two apply steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Apply test, check identity, then apply real.
    #[default]
    Sequential,
    /// Apply test and real in parallel tasks, joined before any assertion.
    Concurrent,
}

/// Expected relation between the normalized test and real states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonPolicy {
    /// Normalized states must be equal.
    #[default]
    Equivalent,
    /// Normalized states must differ.
    Divergent,
}

/// Handling of a workspace that already exists when a deployer starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspacePolicy {
    /// Delete the stale workspace and create a fresh one.
    #[default]
    Recreate,
    /// Select the existing workspace as-is.
    Reuse,
}

/// Reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportingConfig {
    /// Backend selected at startup.
    #[serde(default)]
    pub backend: ReportBackendKind,
    /// Metrics file prefix for the local backend.
    #[serde(default = "default_metrics_file")]
    pub metrics_file: PathBuf,
}

/// Available reporting backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportBackendKind {
    /// Write metrics to a local JSON file.
    #[default]
    Local,
    /// Emit the report as a log event.
    Log,
    /// Drop reports.
    Disabled,
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
    /// Enable debug level.
    #[serde(default)]
    pub debug: bool,
}

fn default_binary() -> String {
    String::from("terraform")
}

fn default_working_dir_base() -> PathBuf {
    std::env::temp_dir()
}

fn default_failure_exit_codes() -> Vec<i32> {
    vec![1]
}

fn default_cloud() -> String {
    String::from("gcp")
}

fn default_metrics_file() -> PathBuf {
    PathBuf::from("/var/log/enterprise_cloud_admin_metrics")
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            working_dir_base: default_working_dir_base(),
            command_timeout_secs: None,
            failure_exit_codes: default_failure_exit_codes(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            cloud: default_cloud(),
            apply_mode: ApplyMode::default(),
            comparison: ComparisonPolicy::default(),
            test_workspace_policy: WorkspacePolicy::default(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            backend: ReportBackendKind::default(),
            metrics_file: default_metrics_file(),
        }
    }
}

impl TerraformConfig {
    /// Returns the command timeout, if one is configured.
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ComparisonPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Equivalent => "equivalent",
            Self::Divergent => "divergent",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EcatConfig::default();
        assert_eq!(config.terraform.binary, "terraform");
        assert_eq!(config.terraform.failure_exit_codes, vec![1]);
        assert!(config.terraform.command_timeout().is_none());
        assert_eq!(config.verification.apply_mode, ApplyMode::Sequential);
        assert_eq!(config.verification.comparison, ComparisonPolicy::Equivalent);
        assert_eq!(config.verification.test_workspace_policy, WorkspacePolicy::Recreate);
        assert_eq!(config.reporting.backend, ReportBackendKind::Local);
    }

    #[test]
    fn test_command_timeout() {
        let config = TerraformConfig {
            command_timeout_secs: Some(90),
            ..TerraformConfig::default()
        };
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(90)));
    }
}
