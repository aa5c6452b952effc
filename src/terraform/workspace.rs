//! Workspace management.
//!
//! Each deployment identity gets its own named workspace, so the test and
//! real copies of a project never share a state.

use tracing::{debug, info};

use crate::config::WorkspacePolicy;
use crate::deployer::DeploymentIdentity;
use crate::error::Result;

use super::cli::{DEFAULT_WORKSPACE, TerraformCli};

/// What [`WorkspaceManager::ensure_workspace`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    /// The workspace did not exist and was created.
    Created,
    /// A stale workspace was deleted and created again.
    Recreated,
    /// The existing workspace was selected.
    Selected,
}

/// Creates or selects the workspace for an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceManager {
    /// Policy for pre-existing test workspaces.
    test_policy: WorkspacePolicy,
}

impl WorkspaceManager {
    /// Creates a manager applying `test_policy` to test workspaces.
    #[must_use]
    pub const fn new(test_policy: WorkspacePolicy) -> Self {
        Self { test_policy }
    }

    /// Returns the policy applied to `identity`.
    ///
    /// Real workspaces are always reused; their state is never discarded.
    #[must_use]
    pub const fn policy_for(&self, identity: &DeploymentIdentity) -> WorkspacePolicy {
        if identity.is_test() {
            self.test_policy
        } else {
            WorkspacePolicy::Reuse
        }
    }

    /// Makes the identity's workspace exist and be selected.
    ///
    /// Calling this twice leaves the same workspace selected.
    ///
    /// # Errors
    ///
    /// Returns an error if any workspace command fails.
    pub async fn ensure_workspace(&self, cli: &TerraformCli, identity: &DeploymentIdentity) -> Result<WorkspaceAction> {
        let name = identity.workspace_name();
        let existing = cli.workspace_list().await?;

        if !existing.iter().any(|w| *w == name) {
            info!("Creating workspace {}", name);
            cli.workspace_new(&name).await?;
            return Ok(WorkspaceAction::Created);
        }

        match self.policy_for(identity) {
            WorkspacePolicy::Recreate => {
                info!("Recreating stale workspace {}", name);
                cli.workspace_select(DEFAULT_WORKSPACE).await?;
                cli.workspace_delete(&name).await?;
                cli.workspace_new(&name).await?;
                Ok(WorkspaceAction::Recreated)
            }
            WorkspacePolicy::Reuse => {
                debug!("Selecting existing workspace {}", name);
                cli.workspace_select(&name).await?;
                Ok(WorkspaceAction::Selected)
            }
        }
    }
}
