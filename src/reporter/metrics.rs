//! Metrics registry.
//!
//! A registry collects typed metrics for one metric set and prepares them
//! for a backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{ReportError, Result};

/// Keys reserved by every metric.
const RESERVED_KEYS: &[&str] = &["type", "unit", "value"];

/// Metrics a registry accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Wall-clock duration of a verification run, in seconds.
    DeploymentTime,
    /// Number of deployments per hour.
    DeploymentsRate,
}

/// Value type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Floating point.
    Float,
    /// Integer.
    Integer,
}

/// A metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
}

/// A recorded metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Value type.
    #[serde(rename = "type", serialize_with = "serialize_type")]
    pub metric_type: MetricType,
    /// Unit.
    pub unit: &'static str,
    /// Value.
    pub value: MetricValue,
    /// Additional data, flattened next to the value.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed metrics for one metric set.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    metric_set: String,
    metrics: BTreeMap<MetricKind, Metric>,
}

impl MetricKind {
    /// Metric name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DeploymentTime => "deployment_time",
            Self::DeploymentsRate => "deployments_rate",
        }
    }

    /// Expected value type.
    #[must_use]
    pub const fn metric_type(self) -> MetricType {
        match self {
            Self::DeploymentTime => MetricType::Float,
            Self::DeploymentsRate => MetricType::Integer,
        }
    }

    /// Unit of the value.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::DeploymentTime => "s",
            Self::DeploymentsRate => "h",
        }
    }
}

impl MetricType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "int",
        }
    }
}

impl MetricValue {
    /// Value type of this value.
    #[must_use]
    pub const fn metric_type(self) -> MetricType {
        match self {
            Self::Integer(_) => MetricType::Integer,
            Self::Float(_) => MetricType::Float,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_type<S: serde::Serializer>(metric_type: &MetricType, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(metric_type.as_str())
}

impl MetricsRegistry {
    /// Creates an empty registry for `metric_set`.
    #[must_use]
    pub fn new(metric_set: impl Into<String>) -> Self {
        Self {
            metric_set: metric_set.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Gets the metric set name.
    #[must_use]
    pub fn metric_set(&self) -> &str {
        &self.metric_set
    }

    /// Records a metric, replacing any earlier value for the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidMetricValue`] if the value type does not
    /// match the metric, or [`ReportError::ReservedKey`] if `extra` uses a
    /// reserved key.
    pub fn add_metric(&mut self, kind: MetricKind, value: MetricValue, extra: Option<Map<String, Value>>) -> Result<()> {
        if value.metric_type() != kind.metric_type() {
            return Err(ReportError::InvalidMetricValue {
                metric: kind.name().to_string(),
                expected: kind.metric_type().as_str().to_string(),
            }
            .into());
        }

        let extra = extra.unwrap_or_default();
        if let Some(key) = extra.keys().find(|key| RESERVED_KEYS.contains(&key.as_str())) {
            return Err(ReportError::ReservedKey { key: key.clone() }.into());
        }

        self.metrics.insert(
            kind,
            Metric {
                metric_type: kind.metric_type(),
                unit: kind.unit(),
                value,
                extra,
            },
        );
        Ok(())
    }

    /// Gets a recorded metric.
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> Option<&Metric> {
        self.metrics.get(&kind)
    }

    /// Prepares the metrics for output: one entry per metric name, holding
    /// value, unit and extra data. The type tag is dropped.
    #[must_use]
    pub fn prepared(&self) -> Value {
        let prepared: Map<String, Value> = self
            .metrics
            .iter()
            .map(|(kind, metric)| {
                let mut entry = metric.extra.clone();
                entry.insert(String::from("unit"), Value::from(metric.unit));
                let value = match metric.value {
                    MetricValue::Integer(v) => Value::from(v),
                    MetricValue::Float(v) => Value::from(v),
                };
                entry.insert(String::from("value"), value);
                (kind.name().to_string(), Value::Object(entry))
            })
            .collect();

        Value::Object(prepared)
    }
}
