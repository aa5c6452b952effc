//! Plan production.
//!
//! A [`Plan`] is an owned handle to a plan file. It cannot be cloned, and
//! applying it consumes it, so a plan is used at most once.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::deployer::DeploymentIdentity;
use crate::error::Result;

use super::cli::TerraformCli;

/// Kind of change a plan makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Create or update resources.
    Apply,
    /// Remove every resource.
    Destroy,
}

impl PlanKind {
    /// File name of the plan inside the working directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Apply => "plan",
            Self::Destroy => "destroy_plan",
        }
    }

    /// Returns true for a destroy plan.
    #[must_use]
    pub const fn is_destroy(self) -> bool {
        matches!(self, Self::Destroy)
    }
}

/// Handle to a plan file written by [`PlanProducer::create_plan`].
#[derive(Debug)]
pub struct Plan {
    working_dir: PathBuf,
    kind: PlanKind,
}

impl Plan {
    /// Gets the plan kind.
    #[must_use]
    pub const fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Gets the working directory the plan was produced in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// File name passed to the tool, relative to the working directory.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }

    /// Full path of the plan file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.working_dir.join(self.file_name())
    }

    /// Removes the plan file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file exists but cannot be removed.
    pub async fn discard(self) -> Result<()> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {
                debug!("Discarded plan {}", self.path().display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds plans with a fixed, explicit variable set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanProducer;

impl PlanProducer {
    /// Creates a new plan producer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Variables passed to every plan for `identity`.
    ///
    /// `skip_delete` is true only for the test copy. It keeps the provider
    /// away from destructive defaults that would otherwise differ between
    /// the test and real runs.
    #[must_use]
    pub fn variables(identity: &DeploymentIdentity) -> Vec<(String, String)> {
        vec![
            (String::from("project_id"), identity.project_id().to_string()),
            (String::from("project_name"), identity.project_id().to_string()),
            (String::from("skip_delete"), identity.is_test().to_string()),
        ]
    }

    /// Writes an apply or destroy plan in the tool's working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan command fails.
    pub async fn create_plan(&self, cli: &TerraformCli, identity: &DeploymentIdentity, destroy: bool) -> Result<Plan> {
        let kind = if destroy { PlanKind::Destroy } else { PlanKind::Apply };
        info!("Planning {} for {}", kind.file_name(), identity);

        cli.plan(destroy, kind.file_name(), &Self::variables(identity))
            .await?;

        Ok(Plan {
            working_dir: cli.working_dir().to_path_buf(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerraformConfig;
    use crate::terraform::runner::{CommandResult, MockCommandRunner};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_variables() {
        let test = DeploymentIdentity::test("mesa-app1-dev", "gcp").unwrap();
        let real = test.twin();

        let vars = PlanProducer::variables(&test);
        assert_eq!(vars[0], (String::from("project_id"), String::from("mesa-app1-dev")));
        assert_eq!(vars[1], (String::from("project_name"), String::from("mesa-app1-dev")));
        assert_eq!(vars[2], (String::from("skip_delete"), String::from("true")));
        assert_eq!(PlanProducer::variables(&real)[2].1, "false");
    }

    #[tokio::test]
    async fn test_create_plan_arguments() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| {
                args == [
                    "plan",
                    "-input=false",
                    "-out=plan",
                    "-var=project_id=mesa-app1-dev",
                    "-var=project_name=mesa-app1-dev",
                    "-var=skip_delete=false",
                ]
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandResult::success("")));

        let cli = TerraformCli::new(Arc::new(runner), &TerraformConfig::default(), "/work");
        let identity = DeploymentIdentity::real("mesa-app1-dev", "gcp").unwrap();
        let plan = PlanProducer::new().create_plan(&cli, &identity, false).await.unwrap();

        assert_eq!(plan.kind(), PlanKind::Apply);
        assert_eq!(plan.path(), PathBuf::from("/work/plan"));
    }

    #[tokio::test]
    async fn test_create_destroy_plan_arguments() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| {
                args == [
                    "plan",
                    "-destroy",
                    "-input=false",
                    "-out=destroy_plan",
                    "-var=project_id=mesa-app1-dev",
                    "-var=project_name=mesa-app1-dev",
                    "-var=skip_delete=true",
                ]
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandResult::success("")));

        let cli = TerraformCli::new(Arc::new(runner), &TerraformConfig::default(), "/work");
        let identity = DeploymentIdentity::test("mesa-app1-dev", "gcp").unwrap();
        let plan = PlanProducer::new().create_plan(&cli, &identity, true).await.unwrap();

        assert!(plan.kind().is_destroy());
        assert_eq!(plan.file_name(), "destroy_plan");
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("plan"), "binary").unwrap();
        let plan = Plan {
            working_dir: temp.path().to_path_buf(),
            kind: PlanKind::Apply,
        };

        plan.discard().await.unwrap();
        assert!(!temp.path().join("plan").exists());
    }
}
