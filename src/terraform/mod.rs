//! Infrastructure tool integration.
//!
//! This module drives the Terraform-compatible CLI as a subprocess:
//! - Process execution behind the [`CommandRunner`] port
//! - A narrow wrapper exposing only the commands a deployer uses
//! - Workspace selection per deployment identity
//! - Plan production with a deterministic variable set

mod runner;
mod cli;
mod workspace;
mod plan;

pub use runner::{CommandResult, CommandRunner, SIGNAL_EXIT_CODE, TokioCommandRunner, format_command};
pub use cli::{DEFAULT_WORKSPACE, TerraformCli};
pub use workspace::{WorkspaceAction, WorkspaceManager};
pub use plan::{Plan, PlanKind, PlanProducer};
