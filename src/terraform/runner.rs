//! Subprocess execution for the infrastructure tool.
//!
//! [`CommandRunner`] is the port every tool invocation goes through. The
//! production implementation spawns the binary with Tokio; tests substitute
//! a mock or a scripted runner.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{CommandError, EcatError, Result};

/// Exit code reported for a process terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandResult {
    /// Creates a new command result.
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates a successful result with the given output.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }
}

/// Executes a single tool invocation in a working directory.
///
/// Implementations report how the process ended; they do not decide whether
/// an exit code is a failure. Errors are reserved for processes that could
/// not be started or did not finish in time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `binary` with `args`, using `working_dir` as the current directory.
    async fn run(&self, binary: &str, args: &[String], working_dir: &Path) -> Result<CommandResult>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    /// Optional per-command timeout.
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    /// Creates a runner that waits for every command to exit.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Sets a per-command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, binary: &str, args: &[String], working_dir: &Path) -> Result<CommandResult> {
        let command_line = format_command(binary, args);
        debug!("Running '{}' in {}", command_line, working_dir.display());

        let child = Command::new(binary)
            .args(args)
            .current_dir(working_dir)
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EcatError::Command(CommandError::SpawnFailed {
                    command: command_line.clone(),
                    message: e.to_string(),
                })
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    EcatError::Command(CommandError::TimedOut {
                        command: command_line.clone(),
                        timeout_secs: timeout.as_secs(),
                    })
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            EcatError::Command(CommandError::SpawnFailed {
                command: command_line.clone(),
                message: e.to_string(),
            })
        })?;

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(SIGNAL_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("'{}' exited with code {}", command_line, result.exit_code);
        Ok(result)
    }
}

/// Formats a command line for logs and error messages.
#[must_use]
pub fn format_command(binary: &str, args: &[String]) -> String {
    std::iter::once(binary)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
