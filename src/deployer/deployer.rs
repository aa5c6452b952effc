//! Deployer lifecycle.
//!
//! A deployer owns one working directory and drives one deployment
//! identity through `Initialized -> Applied -> Destroyed`, with `Failed`
//! reachable whenever a tool command fails.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::EcatConfig;
use crate::error::{DeployError, EcatError, Result};
use crate::state::{TerraformState, WorkingDirLock};
use crate::terraform::{CommandRunner, Plan, PlanKind, PlanProducer, TerraformCli, WorkspaceManager};

use super::files::SourceFile;
use super::identity::DeploymentIdentity;

/// Lifecycle phase of a deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployerPhase {
    /// Working directory prepared, nothing applied by this deployer yet.
    Initialized,
    /// An apply plan was applied.
    Applied,
    /// A destroy plan was applied. Terminal.
    Destroyed,
    /// The last operation failed. The deployer may be run again.
    Failed,
}

impl fmt::Display for DeployerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::Applied => "applied",
            Self::Destroyed => "destroyed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Drives one deployment identity in its own working directory.
pub struct Deployer {
    identity: DeploymentIdentity,
    cli: TerraformCli,
    plans: PlanProducer,
    phase: DeployerPhase,
    previous_state: Option<TerraformState>,
    current_state: TerraformState,
    lock: WorkingDirLock,
}

impl Deployer {
    /// Prepares a deployer for `identity`.
    ///
    /// Creates and locks the working directory, writes every source file,
    /// runs `get` and `init`, ensures the workspace, and captures the
    /// baseline state.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another deployer, a
    /// file cannot be written, or any tool command fails.
    pub async fn construct(
        identity: DeploymentIdentity,
        files: &[SourceFile],
        config: &EcatConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let working_dir = identity.working_dir(&config.terraform.working_dir_base);
        info!("Preparing {} in {}", identity, working_dir.display());

        tokio::fs::create_dir_all(&working_dir).await?;
        let lock = WorkingDirLock::acquire(&working_dir).await?;

        for file in files {
            file.write_to(&working_dir).await?;
        }

        let cli = TerraformCli::new(runner, &config.terraform, &working_dir);
        cli.get().await?;
        cli.init().await?;

        let workspaces = WorkspaceManager::new(config.verification.test_workspace_policy);
        let action = workspaces.ensure_workspace(&cli, &identity).await?;
        info!("Workspace {} ready ({:?})", identity.workspace_name(), action);

        let mut deployer = Self {
            identity,
            cli,
            plans: PlanProducer::new(),
            phase: DeployerPhase::Initialized,
            previous_state: None,
            current_state: TerraformState::empty(),
            lock,
        };
        deployer.current_state = deployer.get_state().await?;

        Ok(deployer)
    }

    /// Gets the deployment identity.
    #[must_use]
    pub const fn identity(&self) -> &DeploymentIdentity {
        &self.identity
    }

    /// Gets the current phase.
    #[must_use]
    pub const fn phase(&self) -> DeployerPhase {
        self.phase
    }

    /// Gets the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.cli.working_dir()
    }

    /// State captured after the last successful operation.
    #[must_use]
    pub const fn current_state(&self) -> &TerraformState {
        &self.current_state
    }

    /// State captured before the last successful operation.
    #[must_use]
    pub const fn previous_state(&self) -> Option<&TerraformState> {
        self.previous_state.as_ref()
    }

    /// Identifier of the working directory lock held by this deployer.
    #[must_use]
    pub fn lock_id(&self) -> &str {
        &self.lock.info().lock_id
    }

    /// Reads the state from the tool. Nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if `state pull` fails or prints an invalid document.
    pub async fn get_state(&self) -> Result<TerraformState> {
        let raw = self.cli.state_pull().await?;
        TerraformState::from_json(&raw)
    }

    /// Produces an apply or destroy plan for this deployer.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan command fails.
    pub async fn create_plan(&self, destroy: bool) -> Result<Plan> {
        self.plans.create_plan(&self.cli, &self.identity, destroy).await
    }

    /// Applies `plan`, or a fresh apply plan when `None`.
    ///
    /// The state is pulled before planning and again after apply. On
    /// success the first becomes `previous_state` and the second
    /// `current_state`. On failure both are left untouched and the phase
    /// becomes [`DeployerPhase::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidTransition`] after teardown,
    /// [`DeployError::ForeignPlan`] for a plan from another working
    /// directory, or the failing tool command's error.
    pub async fn run(&mut self, plan: Option<Plan>) -> Result<()> {
        self.ensure_not_destroyed("run")?;

        if let Some(plan) = &plan {
            if plan.working_dir() != self.working_dir() {
                return Err(EcatError::Deploy(DeployError::ForeignPlan {
                    plan: plan.path(),
                    working_dir: self.working_dir().to_path_buf(),
                }));
            }
        }

        self.execute(plan, false).await
    }

    /// Destroys everything this deployer applied.
    ///
    /// Same as [`Deployer::run`] with a fresh destroy plan, produced after
    /// the state is pulled.
    ///
    /// # Errors
    ///
    /// See [`Deployer::run`].
    pub async fn delete(&mut self) -> Result<()> {
        self.ensure_not_destroyed("delete")?;
        self.execute(None, true).await
    }

    async fn execute(&mut self, plan: Option<Plan>, destroy: bool) -> Result<()> {
        match self.apply(plan, destroy).await {
            Ok((kind, before, after)) => {
                self.previous_state = Some(before);
                self.current_state = after;
                self.phase = if kind.is_destroy() {
                    DeployerPhase::Destroyed
                } else {
                    DeployerPhase::Applied
                };
                info!("{} is now {}", self.identity, self.phase);
                Ok(())
            }
            Err(e) => {
                error!("Run failed for {}: {}", self.identity, e);
                self.phase = DeployerPhase::Failed;
                Err(e)
            }
        }
    }

    /// Pulls the state, plans when no plan is given, applies, and pulls the
    /// state again. Returns the plan kind with the states before and after.
    async fn apply(&self, plan: Option<Plan>, destroy: bool) -> Result<(PlanKind, TerraformState, TerraformState)> {
        let before = match self.get_state().await {
            Ok(state) => state,
            Err(e) => {
                if let Some(plan) = plan {
                    plan.discard().await?;
                }
                return Err(e);
            }
        };

        let plan = match plan {
            Some(plan) => plan,
            None => self.create_plan(destroy).await?,
        };
        let kind = plan.kind();

        let applied = self.cli.apply(plan.file_name()).await;
        let discarded = plan.discard().await;
        applied?;
        discarded?;

        let after = self.get_state().await?;
        Ok((kind, before, after))
    }

    fn ensure_not_destroyed(&self, operation: &str) -> Result<()> {
        if self.phase == DeployerPhase::Destroyed {
            return Err(EcatError::Deploy(DeployError::InvalidTransition {
                operation: operation.to_string(),
                phase: self.phase.to_string(),
            }));
        }
        Ok(())
    }
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("identity", &self.identity)
            .field("working_dir", &self.working_dir())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
