//! Structural diff between state documents.
//!
//! Used to explain a failed comparison: the output lists every JSON path
//! at which two documents disagree.

use serde_json::Value;

use crate::error::Result;

use super::types::TerraformState;

/// Returns the JSON paths at which two states differ.
///
/// # Errors
///
/// Returns an error if either state cannot be serialized.
pub fn diff_states(a: &TerraformState, b: &TerraformState) -> Result<Vec<String>> {
    Ok(diff_values(&a.to_value()?, &b.to_value()?))
}

/// Returns the JSON paths at which two values differ, in document order.
///
/// Paths use `$` for the root, `.key` for object members and `[i]` for
/// array elements. A key present on one side only is reported at its own
/// path; arrays of different length report the missing indices.
#[must_use]
pub fn diff_values(a: &Value, b: &Value) -> Vec<String> {
    let mut differences = Vec::new();
    walk(a, b, String::from("$"), &mut differences);
    differences
}

fn walk(a: &Value, b: &Value, path: String, differences: &mut Vec<String>) {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                let child = format!("{path}.{key}");
                match right.get(key) {
                    Some(right_value) => walk(left_value, right_value, child, differences),
                    None => differences.push(child),
                }
            }
            for key in right.keys().filter(|key| !left.contains_key(*key)) {
                differences.push(format!("{path}.{key}"));
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            for index in 0..left.len().max(right.len()) {
                let child = format!("{path}[{index}]");
                match (left.get(index), right.get(index)) {
                    (Some(l), Some(r)) => walk(l, r, child, differences),
                    _ => differences.push(child),
                }
            }
        }
        _ if a != b => differences.push(path),
        _ => {}
    }
}
