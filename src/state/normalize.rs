//! State normalization.
//!
//! Two deployments built from the same source never produce byte-identical
//! states: ids, names, serials and lineages are assigned per deployment.
//! Normalization strips those fields so that equivalent deployments compare
//! equal.

use serde_json::{Map, Value};

use super::types::{PROJECT_ID_OUTPUT, TerraformState};

/// Instance attributes expected to differ between equivalent deployments.
///
/// `billing_account` is assigned per project.
pub const VOLATILE_ATTRIBUTES: &[&str] = &[
    "billing_account",
    "id",
    "name",
    "number",
    "project",
    "project_id",
    "skip_delete",
];

/// Attribute coerced to an empty map when null or absent.
const LABELS_ATTRIBUTE: &str = "labels";

/// Strips volatile fields from state snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateNormalizer;

impl StateNormalizer {
    /// Creates a new normalizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns a normalized copy of `state`.
    ///
    /// The result has no `serial` or `lineage`, no `project_id` output value,
    /// no volatile instance attributes, and a `labels` map on every instance.
    /// Applying it twice gives the same result as applying it once.
    #[must_use]
    pub fn normalize(&self, state: &TerraformState) -> TerraformState {
        let mut normalized = state.clone();

        normalized.serial = None;
        normalized.lineage = None;

        if let Some(output) = normalized.outputs.get_mut(PROJECT_ID_OUTPUT) {
            output.value = None;
        }

        for instance in normalized
            .resources
            .iter_mut()
            .flat_map(|resource| resource.instances.iter_mut())
        {
            for key in VOLATILE_ATTRIBUTES {
                instance.attributes.remove(*key);
            }

            let labels = instance
                .attributes
                .entry(LABELS_ATTRIBUTE)
                .or_insert(Value::Null);
            if labels.is_null() {
                *labels = Value::Object(Map::new());
            }
        }

        normalized
    }

    /// Returns true if both states normalize to the same document.
    #[must_use]
    pub fn equivalent(&self, a: &TerraformState, b: &TerraformState) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}
