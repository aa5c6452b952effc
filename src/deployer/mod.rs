//! Deployers and their inputs.
//!
//! This module provides:
//! - Deployment identities, which fix working directory and workspace names
//! - Source files and the providers that supply them
//! - The deployer state machine

mod identity;
mod files;
#[allow(clippy::module_inception)]
mod deployer;

pub use identity::DeploymentIdentity;
pub use files::{FileProvider, LocalDirectoryProvider, SourceFile};
pub use deployer::{Deployer, DeployerPhase};
