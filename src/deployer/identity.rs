//! Deployment identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::is_valid_name;
use crate::error::{ConfigError, EcatError, Result};

/// Identifies one deployment: a project, a cloud target, and whether it is
/// the disposable test copy or the real one.
///
/// The identity determines both the working directory and the workspace
/// name. The test and real identities of a project never share either.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    project_id: String,
    cloud_target: String,
    is_test: bool,
}

impl DeploymentIdentity {
    /// Creates a new identity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the project id or cloud target is not
    /// safe to use as a path component and workspace name.
    pub fn new(project_id: impl Into<String>, cloud_target: impl Into<String>, is_test: bool) -> Result<Self> {
        let project_id = project_id.into();
        let cloud_target = cloud_target.into();

        if !is_valid_name(&project_id) {
            return Err(EcatError::Config(ConfigError::validation(
                format!("Project id '{project_id}' must be lowercase alphanumeric with hyphens"),
                "project_id",
            )));
        }

        if !is_valid_name(&cloud_target) {
            return Err(EcatError::Config(ConfigError::validation(
                format!("Cloud target '{cloud_target}' must be lowercase alphanumeric with hyphens"),
                "cloud_target",
            )));
        }

        Ok(Self {
            project_id,
            cloud_target,
            is_test,
        })
    }

    /// Creates the test identity for a project.
    ///
    /// # Errors
    ///
    /// See [`DeploymentIdentity::new`].
    pub fn test(project_id: impl Into<String>, cloud_target: impl Into<String>) -> Result<Self> {
        Self::new(project_id, cloud_target, true)
    }

    /// Creates the real identity for a project.
    ///
    /// # Errors
    ///
    /// See [`DeploymentIdentity::new`].
    pub fn real(project_id: impl Into<String>, cloud_target: impl Into<String>) -> Result<Self> {
        Self::new(project_id, cloud_target, false)
    }

    /// Returns the identity of the other side of the twin.
    #[must_use]
    pub fn twin(&self) -> Self {
        Self {
            project_id: self.project_id.clone(),
            cloud_target: self.cloud_target.clone(),
            is_test: !self.is_test,
        }
    }

    /// Gets the project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Gets the cloud target.
    #[must_use]
    pub fn cloud_target(&self) -> &str {
        &self.cloud_target
    }

    /// Returns true for the disposable test copy.
    #[must_use]
    pub const fn is_test(&self) -> bool {
        self.is_test
    }

    /// `test` or `real`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        if self.is_test { "test" } else { "real" }
    }

    /// Working directory under `base`: `<base>/<project_id>/<cloud>/<kind>`.
    #[must_use]
    pub fn working_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.project_id)
            .join(&self.cloud_target)
            .join(self.kind())
    }

    /// Workspace name: `<project_id>-<cloud>-<kind>`.
    #[must_use]
    pub fn workspace_name(&self) -> String {
        format!("{}-{}-{}", self.project_id, self.cloud_target, self.kind())
    }
}

impl fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.workspace_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_paths() {
        let test = DeploymentIdentity::test("mesa-app1-dev", "gcp").unwrap();
        let real = test.twin();

        assert!(test.is_test());
        assert!(!real.is_test());
        assert_eq!(test.workspace_name(), "mesa-app1-dev-gcp-test");
        assert_eq!(real.workspace_name(), "mesa-app1-dev-gcp-real");
        assert_eq!(
            test.working_dir(Path::new("/srv/ecat")),
            PathBuf::from("/srv/ecat/mesa-app1-dev/gcp/test")
        );
        assert_ne!(
            test.working_dir(Path::new("/srv/ecat")),
            real.working_dir(Path::new("/srv/ecat"))
        );
    }

    #[test]
    fn test_rejects_unsafe_components() {
        assert!(DeploymentIdentity::test("../etc", "gcp").is_err());
        assert!(DeploymentIdentity::test("mesa-app1-dev", "g/cp").is_err());
        assert!(DeploymentIdentity::real("", "gcp").is_err());
    }
}
