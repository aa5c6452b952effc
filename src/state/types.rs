//! State document types.
//!
//! These types mirror the JSON document returned by `state pull`. Known
//! fields are typed; anything else is preserved verbatim so a document
//! survives a decode/encode cycle without loss.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{DeployError, EcatError, Result};

/// Output key carrying the project id a deployment targets.
pub const PROJECT_ID_OUTPUT: &str = "project_id";

/// A full state snapshot for one deployment identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformState {
    /// State format version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Version of the tool that wrote the state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// Monotonic write counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u64>,
    /// Unique id assigned when the state was first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<String>,
    /// Root module outputs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: BTreeMap<String, OutputValue>,
    /// Managed and data resources.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<Resource>,
    /// Unknown top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single root module output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    /// Output value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Output type expression.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<Value>,
    /// Unknown keys such as `sensitive`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A resource block in the state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// `managed` or `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Resource type, e.g. `google_project`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Resource name in the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Provider address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Instances of this resource.
    #[serde(default, deserialize_with = "null_as_default")]
    pub instances: Vec<ResourceInstance>,
    /// Unknown keys such as `module` or `each`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One instance of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstance {
    /// Provider schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u64>,
    /// Resource attributes. Never absent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
    /// Unknown keys such as `private` or `dependencies`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TerraformState {
    /// Returns a state with no outputs and no resources.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a state document.
    ///
    /// Blank input yields an empty state, which is what `state pull` prints
    /// for a workspace that has never been applied.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidState`] if the document is not valid JSON
    /// or does not have the expected shape.
    pub fn from_json(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::empty());
        }

        serde_json::from_str(content).map_err(|e| {
            EcatError::Deploy(DeployError::InvalidState {
                message: e.to_string(),
            })
        })
    }

    /// Serializes the state as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| EcatError::internal(e.to_string()))
    }

    /// Serializes the state as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EcatError::internal(e.to_string()))
    }

    /// Returns the value of the `project_id` output, if present.
    #[must_use]
    pub fn project_id_output(&self) -> Option<&Value> {
        self.outputs
            .get(PROJECT_ID_OUTPUT)
            .and_then(|output| output.value.as_ref())
    }

    /// Returns true if nothing remains: no outputs and no resources.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.outputs.is_empty() && self.resources.is_empty()
    }

    /// Counts instances across all resources.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.resources.iter().map(|r| r.instances.len()).sum()
    }
}
