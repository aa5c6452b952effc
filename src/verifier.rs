//! Twin-deployment verification.
//!
//! The verifier deploys a disposable test copy and the real copy of a
//! project from the same source files, checks that the test copy targets
//! the requested project, compares the two normalized states, and tears the
//! test copy down. The first failing step aborts the run. The real copy is
//! never rolled back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{ApplyMode, ComparisonPolicy, EcatConfig, SourceHasher};
use crate::deployer::{Deployer, DeploymentIdentity, SourceFile};
use crate::error::{EcatError, Result, VerificationStage, WrongStateError};
use crate::reporter::Reporter;
use crate::state::{StateNormalizer, TerraformState, diff_states};
use crate::terraform::CommandRunner;

/// Progress of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierStage {
    /// Nothing started.
    Idle,
    /// The test copy is applied and targets the requested project.
    TestApplied,
    /// The real copy is applied.
    RealApplied,
    /// The test copy is destroyed.
    TestDestroyed,
    /// Every check passed.
    Verified,
    /// The run stopped at the given stage.
    Failed(VerificationStage),
}

/// Outcome of one verification run, as sent to the reporting backend.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Project that was verified.
    pub project_id: String,
    /// Cloud target.
    pub cloud_target: String,
    /// Whether every check passed.
    pub success: bool,
    /// Stage that failed, if any.
    pub stage_on_failure: Option<VerificationStage>,
    /// Error message of the failure, if any.
    pub error: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Run duration in seconds.
    pub duration_secs: f64,
    /// SHA-256 fingerprint of the source files.
    pub source_digest: String,
    /// Apply scheduling used.
    pub apply_mode: ApplyMode,
    /// Comparison policy used.
    pub comparison: ComparisonPolicy,
}

type StageResult<T> = std::result::Result<T, (VerificationStage, EcatError)>;

/// Tags an error with the stage it happened in.
fn at(stage: VerificationStage) -> impl FnOnce(EcatError) -> (VerificationStage, EcatError) {
    move |e| (stage, e)
}

/// Orchestrates twin deployments.
pub struct DeploymentVerifier {
    config: EcatConfig,
    runner: Arc<dyn CommandRunner>,
    reporter: Reporter,
    normalizer: StateNormalizer,
    hasher: SourceHasher,
    stage: VerifierStage,
    last_report: Option<VerificationReport>,
}

impl DeploymentVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(config: EcatConfig, runner: Arc<dyn CommandRunner>, reporter: Reporter) -> Self {
        Self {
            config,
            runner,
            reporter,
            normalizer: StateNormalizer::new(),
            hasher: SourceHasher::new(),
            stage: VerifierStage::Idle,
            last_report: None,
        }
    }

    /// Gets the stage reached by the last run.
    #[must_use]
    pub const fn stage(&self) -> VerifierStage {
        self.stage
    }

    /// Gets the report of the last run, successful or not.
    #[must_use]
    pub const fn last_report(&self) -> Option<&VerificationReport> {
        self.last_report.as_ref()
    }

    /// Verifies a project by deploying its test and real copies.
    ///
    /// `identity` names the project and cloud; both the test and the real
    /// side are derived from it. The report is sent to the reporting
    /// backend before this returns, on success and on failure.
    ///
    /// # Errors
    ///
    /// Returns the first failure: a setup or tool error, or a
    /// [`WrongStateError`] from one of the checks.
    pub async fn verify(&mut self, identity: &DeploymentIdentity, files: &[SourceFile]) -> Result<VerificationReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let source_digest = self.hasher.hash_sources(files);
        self.stage = VerifierStage::Idle;

        info!(
            "Verifying {} on {} (sources {})",
            identity.project_id(),
            identity.cloud_target(),
            self.hasher.short_hash(&source_digest)
        );

        let outcome = self.run_stages(identity, files).await;

        let (stage_on_failure, error) = match &outcome {
            Ok(()) => (None, None),
            Err((stage, e)) => {
                error!("Verification failed at {}: {}", stage, e);
                self.stage = VerifierStage::Failed(*stage);
                (Some(*stage), Some(e.to_string()))
            }
        };

        let report = VerificationReport {
            project_id: identity.project_id().to_string(),
            cloud_target: identity.cloud_target().to_string(),
            success: outcome.is_ok(),
            stage_on_failure,
            error,
            started_at,
            finished_at: Utc::now(),
            duration_secs: timer.elapsed().as_secs_f64(),
            source_digest,
            apply_mode: self.config.verification.apply_mode,
            comparison: self.config.verification.comparison,
        };

        if let Err(e) = self.reporter.report(&report).await {
            warn!("Failed to report verification result: {}", e);
        }
        self.last_report = Some(report.clone());

        match outcome {
            Ok(()) => {
                info!("Verification of {} succeeded", identity.project_id());
                Ok(report)
            }
            Err((_, e)) => Err(e),
        }
    }

    async fn run_stages(&mut self, identity: &DeploymentIdentity, files: &[SourceFile]) -> StageResult<()> {
        let test_identity = if identity.is_test() { identity.clone() } else { identity.twin() };
        let real_identity = test_identity.twin();

        let mut test = Deployer::construct(test_identity, files, &self.config, Arc::clone(&self.runner))
            .await
            .map_err(at(VerificationStage::Setup))?;
        let mut real = Deployer::construct(real_identity, files, &self.config, Arc::clone(&self.runner))
            .await
            .map_err(at(VerificationStage::Setup))?;

        match self.config.verification.apply_mode {
            ApplyMode::Sequential => {
                test.run(None).await.map_err(at(VerificationStage::TestApply))?;
                self.check_test_identity(&test)?;
                real.run(None).await.map_err(at(VerificationStage::RealApply))?;
            }
            ApplyMode::Concurrent => {
                (test, real) = Self::apply_concurrently(test, real).await?;
                self.check_test_identity(&test)?;
            }
        }
        self.stage = VerifierStage::RealApplied;

        self.compare_states(test.current_state(), real.current_state())
            .map_err(at(VerificationStage::StateComparison))?;

        test.delete().await.map_err(at(VerificationStage::TestTeardown))?;
        self.stage = VerifierStage::TestDestroyed;

        check_teardown(test.current_state()).map_err(at(VerificationStage::TeardownCheck))?;
        self.stage = VerifierStage::Verified;

        debug!("Real deployment left live in {}", real.working_dir().display());
        Ok(())
    }

    fn check_test_identity(&mut self, test: &Deployer) -> StageResult<()> {
        check_identity(test.identity().project_id(), test.current_state())
            .map_err(at(VerificationStage::IdentityCheck))?;
        self.stage = VerifierStage::TestApplied;
        Ok(())
    }

    /// Runs both applies as tasks and waits for both before returning.
    async fn apply_concurrently(test: Deployer, real: Deployer) -> StageResult<(Deployer, Deployer)> {
        let test_task = tokio::spawn(async move {
            let mut test = test;
            let result = test.run(None).await;
            (test, result)
        });
        let real_task = tokio::spawn(async move {
            let mut real = real;
            let result = real.run(None).await;
            (real, result)
        });

        let (test_joined, real_joined) = tokio::join!(test_task, real_task);

        let (test, test_result) = test_joined
            .map_err(|e| EcatError::internal(format!("test apply task failed: {e}")))
            .map_err(at(VerificationStage::TestApply))?;
        let (real, real_result) = real_joined
            .map_err(|e| EcatError::internal(format!("real apply task failed: {e}")))
            .map_err(at(VerificationStage::RealApply))?;

        test_result.map_err(at(VerificationStage::TestApply))?;
        real_result.map_err(at(VerificationStage::RealApply))?;

        Ok((test, real))
    }

    /// Compares normalized states according to the configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`WrongStateError::StateDivergence`] if the states do not
    /// relate as the policy requires.
    pub fn compare_states(&self, test: &TerraformState, real: &TerraformState) -> Result<()> {
        let test = self.normalizer.normalize(test);
        let real = self.normalizer.normalize(real);
        let equal = test == real;

        match (self.config.verification.comparison, equal) {
            (ComparisonPolicy::Equivalent, true) | (ComparisonPolicy::Divergent, false) => Ok(()),
            (ComparisonPolicy::Equivalent, false) => {
                let differences = diff_states(&test, &real)?;
                Err(WrongStateError::StateDivergence {
                    detail: format!("{} path(s) differ after normalization", differences.len()),
                    differences,
                    test_state: Box::new(test),
                    real_state: Box::new(real),
                }
                .into())
            }
            (ComparisonPolicy::Divergent, true) => Err(WrongStateError::StateDivergence {
                detail: String::from("normalized states are identical but were expected to differ"),
                differences: Vec::new(),
                test_state: Box::new(test),
                real_state: Box::new(real),
            }
            .into()),
        }
    }
}

/// Checks that the `project_id` output, when present, is `expected`.
///
/// # Errors
///
/// Returns [`WrongStateError::IdentityMismatch`] for any other value,
/// including non-string values.
pub fn check_identity(expected: &str, state: &TerraformState) -> Result<()> {
    match state.project_id_output() {
        None => Ok(()),
        Some(Value::String(found)) if found == expected => Ok(()),
        Some(other) => Err(WrongStateError::IdentityMismatch {
            expected: expected.to_string(),
            found: other.as_str().map_or_else(|| other.to_string(), String::from),
        }
        .into()),
    }
}

/// Checks that nothing remains: no outputs and no resources.
///
/// # Errors
///
/// Returns [`WrongStateError::IncompleteTeardown`] otherwise.
pub fn check_teardown(state: &TerraformState) -> Result<()> {
    if state.is_torn_down() {
        Ok(())
    } else {
        Err(WrongStateError::IncompleteTeardown {
            outputs: state.outputs.len(),
            resources: state.resources.len(),
        }
        .into())
    }
}
