// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # eCat
//!
//! Verifies infrastructure code by deploying it twice: once as a disposable
//! test copy and once for real.
//!
//! ## Overview
//!
//! A verification run:
//!
//! 1. Builds a test and a real deployer from the same source files, each in
//!    its own working directory and workspace
//! 2. Applies the test copy and checks that it targets the requested project
//! 3. Applies the real copy
//! 4. Compares both states after stripping the fields that legitimately
//!    differ between them
//! 5. Destroys the test copy and checks that nothing is left
//!
//! The real copy stays deployed. The outcome is sent to a reporting backend.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`terraform`]: Tool invocation, workspaces and plans
//! - [`state`]: State documents, normalization and working directory locks
//! - [`deployer`]: One side of a twin deployment
//! - [`verifier`]: The verification workflow
//! - [`reporter`]: Reporting backends and metrics
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! terraform:
//!   binary: terraform
//!   working_dir_base: /var/lib/ecat
//!   command_timeout_secs: 1800
//!
//! verification:
//!   cloud: gcp
//!   apply_mode: sequential
//!   comparison: equivalent
//!
//! reporting:
//!   backend: local
//!   metrics_file: /var/log/ecat/metrics
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployer;
pub mod error;
pub mod reporter;
pub mod state;
pub mod terraform;
pub mod verifier;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, EcatConfig, SourceHasher};
pub use deployer::{Deployer, DeployerPhase, DeploymentIdentity, FileProvider, LocalDirectoryProvider, SourceFile};
pub use error::{EcatError, Result};
pub use reporter::{MetricsRegistry, Reporter};
pub use state::{StateNormalizer, TerraformState, WorkingDirLock};
pub use terraform::{CommandResult, CommandRunner, TerraformCli, TokioCommandRunner};
pub use verifier::{DeploymentVerifier, VerificationReport, VerifierStage};
