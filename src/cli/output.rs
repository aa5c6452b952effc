//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::state::TerraformState;
use crate::verifier::VerificationReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Report field row for table display.
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Difference row for table display.
#[derive(Tabled)]
struct DifferenceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Path")]
    path: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a verification report.
    #[must_use]
    pub fn format_report(&self, report: &VerificationReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &VerificationReport) -> String {
        let mut output = String::new();

        if report.success {
            let _ = writeln!(
                output,
                "{} {} verified on {}",
                "✓".green(),
                report.project_id.bold(),
                report.cloud_target
            );
        } else {
            let _ = writeln!(
                output,
                "{} {} failed verification on {}",
                "✗".red(),
                report.project_id.bold(),
                report.cloud_target
            );
        }

        let mut rows = vec![
            ReportRow {
                field: "Duration",
                value: format!("{:.1}s", report.duration_secs),
            },
            ReportRow {
                field: "Sources",
                value: Self::truncate(&report.source_digest, 12),
            },
            ReportRow {
                field: "Apply mode",
                value: report.apply_mode.to_string(),
            },
            ReportRow {
                field: "Comparison",
                value: report.comparison.to_string(),
            },
        ];
        if let Some(stage) = report.stage_on_failure {
            rows.push(ReportRow {
                field: "Failed stage",
                value: stage.to_string(),
            });
        }
        if let Some(error) = &report.error {
            rows.push(ReportRow {
                field: "Error",
                value: error.clone(),
            });
        }

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        output
    }

    /// Formats a configuration validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Configuration is invalid", "✗".red());
                }
                for error in &result.errors {
                    let _ = writeln!(output, "   {} {error}", "error:".red());
                }
                for warning in &result.warnings {
                    let _ = writeln!(output, "   {} {warning}", "warning:".yellow());
                }
                output
            }
        }
    }

    /// Formats a state document.
    ///
    /// The document is printed as JSON in both formats.
    #[must_use]
    pub fn format_state(&self, state: &TerraformState) -> String {
        state.to_pretty_json().unwrap_or_default()
    }

    /// Formats the result of comparing two normalized states.
    #[must_use]
    pub fn format_comparison(&self, differences: &[String]) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ComparisonJson::from(differences)).unwrap_or_default()
            }
            OutputFormat::Text => {
                if differences.is_empty() {
                    return format!("{} States are equivalent\n", "✓".green());
                }

                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "{} States differ at {} path(s)",
                    "✗".red(),
                    differences.len().to_string().yellow()
                );
                let rows: Vec<DifferenceRow> = differences
                    .iter()
                    .enumerate()
                    .map(|(i, path)| DifferenceRow {
                        index: i + 1,
                        path: path.clone(),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats an error.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            format!("{}...", &s[..max_len])
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct ComparisonJson<'a> {
    equivalent: bool,
    differences: &'a [String],
}

impl<'a> From<&'a [String]> for ComparisonJson<'a> {
    fn from(differences: &'a [String]) -> Self {
        Self {
            equivalent: differences.is_empty(),
            differences,
        }
    }
}
