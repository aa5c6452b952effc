//! Narrow interface over the infrastructure tool.
//!
//! [`TerraformCli`] exposes only the operations a deployer needs and turns
//! designated failure exit codes into [`CommandError::Failed`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TerraformConfig;
use crate::error::{CommandError, EcatError, Result};

use super::runner::{CommandResult, CommandRunner, SIGNAL_EXIT_CODE, format_command};

/// Name of the workspace every state starts in.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Tool wrapper bound to one working directory.
#[derive(Clone)]
pub struct TerraformCli {
    /// Process runner.
    runner: Arc<dyn CommandRunner>,
    /// Tool binary.
    binary: String,
    /// Working directory for every command.
    working_dir: PathBuf,
    /// Exit codes treated as failures.
    failure_exit_codes: Vec<i32>,
}

impl TerraformCli {
    /// Creates a wrapper for `working_dir`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: &TerraformConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: config.binary.clone(),
            working_dir: working_dir.into(),
            failure_exit_codes: config.failure_exit_codes.clone(),
        }
    }

    /// Gets the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns true if `exit_code` counts as a failure.
    #[must_use]
    pub fn is_failure(&self, exit_code: i32) -> bool {
        exit_code == SIGNAL_EXIT_CODE || self.failure_exit_codes.contains(&exit_code)
    }

    /// Runs the tool with `args` and classifies the result.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Failed`] when the exit code is a designated
    /// failure code, and propagates spawn and timeout errors from the runner.
    pub async fn execute(&self, args: &[String]) -> Result<CommandResult> {
        let result = self.runner.run(&self.binary, args, &self.working_dir).await?;

        if self.is_failure(result.exit_code) {
            let command = format_command(&self.binary, args);
            warn!("'{}' failed with exit code {}", command, result.exit_code);
            return Err(EcatError::Command(CommandError::Failed {
                command,
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            }));
        }

        Ok(result)
    }

    async fn execute_args(&self, args: &[&str]) -> Result<CommandResult> {
        let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        self.execute(&args).await
    }

    /// Downloads modules: `get`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get(&self) -> Result<()> {
        self.execute_args(&["get"]).await.map(drop)
    }

    /// Initializes the working directory: `init`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn init(&self) -> Result<()> {
        self.execute_args(&["init"]).await.map(drop)
    }

    /// Lists workspaces: `workspace list`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn workspace_list(&self) -> Result<Vec<String>> {
        let result = self.execute_args(&["workspace", "list"]).await?;
        let workspaces = parse_workspace_list(&result.stdout);
        debug!("Found {} workspace(s)", workspaces.len());
        Ok(workspaces)
    }

    /// Creates and selects a workspace: `workspace new <name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn workspace_new(&self, name: &str) -> Result<()> {
        self.execute_args(&["workspace", "new", name]).await.map(drop)
    }

    /// Selects a workspace: `workspace select <name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn workspace_select(&self, name: &str) -> Result<()> {
        self.execute_args(&["workspace", "select", name]).await.map(drop)
    }

    /// Deletes a workspace and its state: `workspace delete -force <name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn workspace_delete(&self, name: &str) -> Result<()> {
        self.execute_args(&["workspace", "delete", "-force", name])
            .await
            .map(drop)
    }

    /// Writes a plan file: `plan [-destroy] -input=false -out=<file> -var=...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn plan(&self, destroy: bool, out: &str, variables: &[(String, String)]) -> Result<()> {
        let mut args = vec![String::from("plan")];
        if destroy {
            args.push(String::from("-destroy"));
        }
        args.push(String::from("-input=false"));
        args.push(format!("-out={out}"));
        args.extend(variables.iter().map(|(key, value)| format!("-var={key}={value}")));

        self.execute(&args).await.map(drop)
    }

    /// Applies a plan file: `apply -no-color -input=false -auto-approve=false <file>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn apply(&self, plan_file: &str) -> Result<()> {
        self.execute_args(&[
            "apply",
            "-no-color",
            "-input=false",
            "-auto-approve=false",
            plan_file,
        ])
        .await
        .map(drop)
    }

    /// Reads the current state document: `state pull`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn state_pull(&self) -> Result<String> {
        self.execute_args(&["state", "pull"])
            .await
            .map(|result| result.stdout)
    }
}

/// Parses `workspace list` output; the current workspace is marked with `*`.
fn parse_workspace_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terraform::runner::MockCommandRunner;
    use mockall::predicate::eq;

    fn config() -> TerraformConfig {
        TerraformConfig {
            binary: String::from("terraform"),
            ..TerraformConfig::default()
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_workspace_list() {
        let stdout = "  default\n* mesa-app1-dev-gcp-test\n  mesa-app1-dev-gcp-real\n\n";
        assert_eq!(
            parse_workspace_list(stdout),
            vec!["default", "mesa-app1-dev-gcp-test", "mesa-app1-dev-gcp-real"]
        );
    }

    #[tokio::test]
    async fn test_failure_exit_code_raises_with_stderr() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|binary, args, dir| {
                binary == "terraform" && args == ["state", "pull"] && dir == Path::new("/work")
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandResult::new(1, "", "no such resource")));

        let cli = TerraformCli::new(Arc::new(runner), &config(), "/work");
        let err = cli.state_pull().await.unwrap_err();

        assert!(err.to_string().contains("no such resource"));
        match err {
            EcatError::Command(CommandError::Failed {
                command, exit_code, ..
            }) => {
                assert_eq!(command, "terraform state pull");
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signal_exit_is_failure() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Ok(CommandResult::new(SIGNAL_EXIT_CODE, "", "")));

        let cli = TerraformCli::new(Arc::new(runner), &config(), "/work");
        assert!(cli.init().await.is_err());
    }

    #[tokio::test]
    async fn test_other_exit_codes_pass() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Ok(CommandResult::new(2, "changes", "")));

        let cli = TerraformCli::new(Arc::new(runner), &config(), "/work");
        let result = cli.execute(&strings(&["plan"])).await.unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn test_plan_arguments() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq(String::from("terraform")),
                eq(strings(&[
                    "plan",
                    "-destroy",
                    "-input=false",
                    "-out=destroy_plan",
                    "-var=project_id=mesa-app1-dev",
                ])),
                eq(PathBuf::from("/work")),
            )
            .times(1)
            .returning(|_, _, _| Ok(CommandResult::success("")));

        let cli = TerraformCli::new(Arc::new(runner), &config(), "/work");
        cli.plan(
            true,
            "destroy_plan",
            &[(String::from("project_id"), String::from("mesa-app1-dev"))],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_apply_arguments() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| {
                args == ["apply", "-no-color", "-input=false", "-auto-approve=false", "plan"]
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandResult::success("Apply complete!")));

        let cli = TerraformCli::new(Arc::new(runner), &config(), "/work");
        cli.apply("plan").await.unwrap();
    }
}
