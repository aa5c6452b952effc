//! Error types for the eCat verification engine.
//!
//! This module provides the error hierarchy for every stage of a
//! verification run: configuration, external tool invocations, deployer
//! lifecycle, state assertions, and reporting.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::TerraformState;

/// The main error type for eCat.
#[derive(Debug, Error)]
pub enum EcatError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The external infrastructure tool reported a failure.
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// A verification assertion failed.
    #[error("Wrong state: {0}")]
    WrongState(#[from] WrongStateError),

    /// Deployer lifecycle errors.
    #[error("Deployer error: {0}")]
    Deploy(#[from] DeployError),

    /// Reporting errors.
    #[error("Reporting error: {0}")]
    Report(#[from] ReportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The project id does not follow the naming convention.
    #[error("Project id '{project_id}' does not match the format {pattern}")]
    InvalidProjectId {
        /// The rejected project id.
        project_id: String,
        /// The expected pattern.
        pattern: String,
    },
}

/// Failures reported by, or while running, the external tool.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The tool exited with a designated failure code.
    #[error("'{command}' failed with exit code {exit_code}: {stderr}")]
    Failed {
        /// The full command line.
        command: String,
        /// Process exit code (`-1` when terminated by a signal).
        exit_code: i32,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The tool did not finish within the configured timeout.
    #[error("'{command}' timed out after {timeout_secs}s")]
    TimedOut {
        /// The full command line.
        command: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// The tool could not be started.
    #[error("Failed to spawn '{command}': {message}")]
    SpawnFailed {
        /// The full command line.
        command: String,
        /// Description of the spawn failure.
        message: String,
    },
}

/// Stage of a verification run at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStage {
    /// Building the test and real deployers.
    Setup,
    /// Applying the test deployment.
    TestApply,
    /// Checking that the test state targets the requested project.
    IdentityCheck,
    /// Applying the real deployment.
    RealApply,
    /// Comparing the normalized test and real states.
    StateComparison,
    /// Destroying the test deployment.
    TestTeardown,
    /// Checking that the test deployment is fully gone.
    TeardownCheck,
}

/// A verification assertion failed.
#[derive(Debug, Error)]
pub enum WrongStateError {
    /// The applied state belongs to a different project.
    #[error("identity mismatch: expected project '{expected}', state reports '{found}'")]
    IdentityMismatch {
        /// The requested project id.
        expected: String,
        /// The project id found in the state outputs.
        found: String,
    },

    /// The test and real states do not compare as the policy requires.
    #[error("state divergence: {detail}")]
    StateDivergence {
        /// Human-readable description.
        detail: String,
        /// JSON paths that differ between the two documents.
        differences: Vec<String>,
        /// Normalized test state.
        test_state: Box<TerraformState>,
        /// Normalized real state.
        real_state: Box<TerraformState>,
    },

    /// Resources or outputs survived the test teardown.
    #[error("incomplete teardown: {outputs} output(s) and {resources} resource(s) remain")]
    IncompleteTeardown {
        /// Number of remaining outputs.
        outputs: usize,
        /// Number of remaining resources.
        resources: usize,
    },
}

/// Deployer lifecycle errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The requested operation is not allowed in the current phase.
    #[error("Cannot {operation} a deployer in phase '{phase}'")]
    InvalidTransition {
        /// The attempted operation.
        operation: String,
        /// The phase the deployer was in.
        phase: String,
    },

    /// A source file path would escape the working directory.
    #[error("Source file path is not a safe relative path: {path}")]
    UnsafeSourcePath {
        /// The rejected path.
        path: String,
    },

    /// A plan produced for another working directory was passed to `run`.
    #[error("Plan {plan} does not belong to working directory {working_dir}")]
    ForeignPlan {
        /// Path of the plan file.
        plan: PathBuf,
        /// Working directory of the deployer.
        working_dir: PathBuf,
    },

    /// Another live deployer holds the working directory.
    #[error("Working directory {path} is locked by {holder} since {since}")]
    WorkingDirLocked {
        /// Path of the lock file.
        path: PathBuf,
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// The tool returned a state document that could not be parsed.
    #[error("Invalid state document: {message}")]
    InvalidState {
        /// Description of the parse error.
        message: String,
    },
}

/// Reporting errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Metric extra data used a reserved key.
    #[error("Metric extra data must not contain the reserved key '{key}'")]
    ReservedKey {
        /// The offending key.
        key: String,
    },

    /// A metric value has the wrong type for its metric.
    #[error("Metric '{metric}' expects a value of type {expected}")]
    InvalidMetricValue {
        /// Metric name.
        metric: String,
        /// Expected value type.
        expected: String,
    },

    /// The metrics file could not be written.
    #[error("Failed to write metrics to {path}: {message}")]
    WriteFailed {
        /// Target path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for eCat operations.
pub type Result<T> = std::result::Result<T, EcatError>;

impl EcatError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is worth retrying by the caller.
    ///
    /// Nothing is retried internally; a timeout is the only failure that
    /// may clear up on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Command(CommandError::TimedOut { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl CommandError {
    /// Returns the command line that failed.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::Failed { command, .. }
            | Self::TimedOut { command, .. }
            | Self::SpawnFailed { command, .. } => command,
        }
    }
}

impl WrongStateError {
    /// Returns the verification stage this assertion belongs to.
    #[must_use]
    pub const fn stage(&self) -> VerificationStage {
        match self {
            Self::IdentityMismatch { .. } => VerificationStage::IdentityCheck,
            Self::StateDivergence { .. } => VerificationStage::StateComparison,
            Self::IncompleteTeardown { .. } => VerificationStage::TeardownCheck,
        }
    }
}

impl std::fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::TestApply => "test_apply",
            Self::IdentityCheck => "identity_check",
            Self::RealApply => "real_apply",
            Self::StateComparison => "state_comparison",
            Self::TestTeardown => "test_teardown",
            Self::TeardownCheck => "teardown_check",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_message_contains_stderr() {
        let err = CommandError::Failed {
            command: String::from("terraform state pull"),
            exit_code: 1,
            stdout: String::new(),
            stderr: String::from("no such resource"),
        };
        assert!(err.to_string().contains("no such resource"));
        assert_eq!(err.command(), "terraform state pull");
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        let timeout = EcatError::Command(CommandError::TimedOut {
            command: String::from("terraform apply"),
            timeout_secs: 10,
        });
        let failed = EcatError::Command(CommandError::Failed {
            command: String::from("terraform apply"),
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
        });
        assert!(timeout.is_retryable());
        assert!(!failed.is_retryable());
    }

    #[test]
    fn test_wrong_state_stage() {
        let err = WrongStateError::IncompleteTeardown {
            outputs: 1,
            resources: 0,
        };
        assert_eq!(err.stage(), VerificationStage::TeardownCheck);
        assert_eq!(err.stage().to_string(), "teardown_check");
    }
}
