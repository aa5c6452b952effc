//! Configuration module for the eCat verification engine.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `ecat.yaml`
//! - Validation of configuration values and project ids
//! - Fingerprinting source files for reports

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    ApplyMode, ComparisonPolicy, EcatConfig, LoggingConfig, ReportBackendKind, ReportingConfig,
    TerraformConfig, VerificationConfig, WorkspacePolicy,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, VALID_PROJECT_ID_FORMAT, ValidationError, ValidationResult};
pub use hash::SourceHasher;

pub(crate) use validator::is_valid_name;
