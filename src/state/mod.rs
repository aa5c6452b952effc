//! State handling for the eCat verification engine.
//!
//! This module models the state documents produced by the infrastructure
//! tool, normalizes them for comparison, explains differences, and guards
//! working directories against concurrent use.

mod types;
mod normalize;
mod diff;
mod lock;

pub use types::{OutputValue, PROJECT_ID_OUTPUT, Resource, ResourceInstance, TerraformState};
pub use normalize::{StateNormalizer, VOLATILE_ATTRIBUTES};
pub use diff::{diff_states, diff_values};
pub use lock::{LOCK_FILE_NAME, LockInfo, WorkingDirLock, generate_holder_id};
