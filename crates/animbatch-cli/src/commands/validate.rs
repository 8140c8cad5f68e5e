//! Validate command implementation
//!
//! Loads a batch config and checks it, including that every referenced path
//! exists, without touching any scene.

use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_spec::{validate_for_run, BatchConfig, ValidationResult};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use super::reporting;

#[derive(Debug, Serialize)]
struct JsonIssue {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    ok: bool,
    errors: Vec<JsonIssue>,
    warnings: Vec<JsonIssue>,
}

/// Renders a validation result as pretty JSON.
pub(crate) fn validation_json(validation: &ValidationResult) -> Result<String> {
    let output = ValidateOutput {
        ok: validation.is_ok(),
        errors: validation
            .errors
            .iter()
            .map(|e| JsonIssue {
                code: e.code.to_string(),
                message: e.message.clone(),
                path: e.path.clone(),
            })
            .collect(),
        warnings: validation
            .warnings
            .iter()
            .map(|w| JsonIssue {
                code: w.code.to_string(),
                message: w.message.clone(),
                path: w.path.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&output).context("Failed to serialize validation result")
}

/// Run the validate command
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid
pub fn run(config_path: &str, json_output: bool) -> Result<ExitCode> {
    let config = BatchConfig::from_file(Path::new(config_path))
        .with_context(|| format!("Failed to load batch config: {}", config_path))?;
    let validation = validate_for_run(&config);

    if json_output {
        println!("{}", validation_json(&validation)?);
    } else {
        println!("{} {}", "Validating:".cyan().bold(), config_path);
        reporting::print_validation(&validation);
        if validation.is_ok() {
            println!(
                "{} {} warning(s)",
                "VALID".green().bold(),
                validation.warnings.len()
            );
        } else {
            println!(
                "{} {} error(s), {} warning(s)",
                "INVALID".red().bold(),
                validation.errors.len(),
                validation.warnings.len()
            );
        }
    }

    Ok(if validation.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
