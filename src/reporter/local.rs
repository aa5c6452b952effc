//! Local file reporting backend.

use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EcatError, ReportError, Result};
use crate::verifier::VerificationReport;

use super::metrics::{MetricKind, MetricValue, MetricsRegistry};

/// Writes prepared metrics as JSON to `<metrics_file>.<metric_set>`.
#[derive(Debug, Clone)]
pub struct LocalReporter {
    metrics_file: PathBuf,
}

impl LocalReporter {
    /// Creates a reporter writing next to `metrics_file`.
    #[must_use]
    pub fn new(metrics_file: impl Into<PathBuf>) -> Self {
        Self {
            metrics_file: metrics_file.into(),
        }
    }

    /// Target path for a metric set.
    #[must_use]
    pub fn target_path(&self, metric_set: &str) -> PathBuf {
        let mut name = self.metrics_file.clone().into_os_string();
        name.push(".");
        name.push(metric_set);
        PathBuf::from(name)
    }

    /// Builds the registry for a report.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric is rejected by the registry.
    pub fn registry_for(report: &VerificationReport) -> Result<MetricsRegistry> {
        let mut registry = MetricsRegistry::new(report.project_id.clone());

        let mut extra = Map::new();
        extra.insert(String::from("success"), json!(report.success));
        extra.insert(String::from("stage_on_failure"), json!(report.stage_on_failure));
        extra.insert(String::from("source_digest"), json!(report.source_digest));
        extra.insert(String::from("finished_at"), json!(report.finished_at.to_rfc3339()));
        registry.add_metric(
            MetricKind::DeploymentTime,
            MetricValue::Float(report.duration_secs),
            Some(extra),
        )?;

        let mut extra = Map::new();
        extra.insert(String::from("cloud"), Value::from(report.cloud_target.as_str()));
        registry.add_metric(MetricKind::DeploymentsRate, MetricValue::Integer(1), Some(extra))?;

        Ok(registry)
    }

    /// Writes the metrics for `report`, replacing the previous file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::WriteFailed`] if the file cannot be written.
    pub async fn send(&self, report: &VerificationReport) -> Result<PathBuf> {
        let registry = Self::registry_for(report)?;
        let target = self.target_path(registry.metric_set());

        let content = serde_json::to_vec_pretty(&registry.prepared())
            .map_err(|e| write_failed(&target, &e))?;
        write_atomic(&target, &content).await?;

        info!("Metrics written to {}", target.display());
        Ok(target)
    }
}

async fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let mut temp = target.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| write_failed(target, &e))?;
    tokio::fs::rename(&temp, target)
        .await
        .map_err(|e| write_failed(target, &e))?;

    debug!("Replaced {}", target.display());
    Ok(())
}

fn write_failed(path: &Path, error: &dyn std::fmt::Display) -> EcatError {
    EcatError::Report(ReportError::WriteFailed {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}
