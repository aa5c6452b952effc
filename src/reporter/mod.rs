//! Reporting backends for verification results.
//!
//! The backend is chosen once from configuration and passed to the
//! verifier; there is no global lookup.

mod local;
mod metrics;

pub use local::LocalReporter;
pub use metrics::{Metric, MetricKind, MetricType, MetricValue, MetricsRegistry};

use tracing::{info, warn};

use crate::config::{ReportBackendKind, ReportingConfig};
use crate::error::Result;
use crate::verifier::VerificationReport;

/// Destination for verification reports.
#[derive(Debug, Clone, Default)]
pub enum Reporter {
    /// Write metrics to a local JSON file.
    Local(LocalReporter),
    /// Emit the report as a log event.
    Log,
    /// Drop reports.
    #[default]
    Disabled,
}

impl Reporter {
    /// Builds the backend selected in `config`.
    #[must_use]
    pub fn from_config(config: &ReportingConfig) -> Self {
        match config.backend {
            ReportBackendKind::Local => Self::Local(LocalReporter::new(&config.metrics_file)),
            ReportBackendKind::Log => Self::Log,
            ReportBackendKind::Disabled => Self::Disabled,
        }
    }

    /// Sends a report to the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the local backend cannot write its file.
    pub async fn report(&self, report: &VerificationReport) -> Result<()> {
        match self {
            Self::Local(local) => local.send(report).await.map(drop),
            Self::Log => {
                if report.success {
                    info!(
                        project_id = %report.project_id,
                        cloud = %report.cloud_target,
                        duration_secs = report.duration_secs,
                        source_digest = %report.source_digest,
                        "Verification succeeded"
                    );
                } else {
                    warn!(
                        project_id = %report.project_id,
                        cloud = %report.cloud_target,
                        duration_secs = report.duration_secs,
                        stage = ?report.stage_on_failure,
                        error = report.error.as_deref().unwrap_or_default(),
                        "Verification failed"
                    );
                }
                Ok(())
            }
            Self::Disabled => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApplyMode, ComparisonPolicy};
    use crate::error::VerificationStage;
    use chrono::Utc;
    use serde_json::Value;
    use tempfile::TempDir;

    fn report(success: bool) -> VerificationReport {
        let now = Utc::now();
        VerificationReport {
            project_id: String::from("mesa-app1-dev"),
            cloud_target: String::from("gcp"),
            success,
            stage_on_failure: (!success).then_some(VerificationStage::StateComparison),
            error: (!success).then(|| String::from("state divergence")),
            started_at: now,
            finished_at: now,
            duration_secs: 4.25,
            source_digest: String::from("abc123"),
            apply_mode: ApplyMode::Sequential,
            comparison: ComparisonPolicy::Equivalent,
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = ReportingConfig::default();
        assert!(matches!(Reporter::from_config(&config), Reporter::Local(_)));

        config.backend = ReportBackendKind::Log;
        assert!(matches!(Reporter::from_config(&config), Reporter::Log));

        config.backend = ReportBackendKind::Disabled;
        assert!(matches!(Reporter::from_config(&config), Reporter::Disabled));
    }

    #[test]
    fn test_target_path() {
        let local = LocalReporter::new("/var/log/ecat_metrics");
        assert_eq!(
            local.target_path("mesa-app1-dev"),
            std::path::PathBuf::from("/var/log/ecat_metrics.mesa-app1-dev")
        );
    }

    #[tokio::test]
    async fn test_local_backend_writes_metrics() {
        let temp = TempDir::new().unwrap();
        let reporter = Reporter::Local(LocalReporter::new(temp.path().join("metrics")));

        reporter.report(&report(false)).await.unwrap();

        let path = temp.path().join("metrics.mesa-app1-dev");
        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["deployment_time"]["value"], 4.25);
        assert_eq!(written["deployment_time"]["unit"], "s");
        assert_eq!(written["deployment_time"]["success"], false);
        assert_eq!(written["deployment_time"]["stage_on_failure"], "state_comparison");
        assert_eq!(written["deployments_rate"]["value"], 1);
        assert!(!temp.path().join("metrics.mesa-app1-dev.tmp").exists());
    }

    #[tokio::test]
    async fn test_local_backend_reports_write_failure() {
        let reporter = Reporter::Local(LocalReporter::new("/nonexistent-dir/metrics"));
        assert!(reporter.report(&report(true)).await.is_err());
    }

    #[tokio::test]
    async fn test_log_and_disabled_backends() {
        assert!(Reporter::Log.report(&report(true)).await.is_ok());
        assert!(Reporter::Log.report(&report(false)).await.is_ok());
        assert!(Reporter::Disabled.report(&report(true)).await.is_ok());
    }
}
