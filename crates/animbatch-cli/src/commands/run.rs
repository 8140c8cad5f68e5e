//! Run command implementation
//!
//! Loads a batch config, retargets every discovered clip onto the target
//! armature and exports one GLB per group.

use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_core::{default_scene, run_batch};
use animbatch_spec::{validate_for_run, BatchConfig};
use std::path::Path;
use std::process::ExitCode;

use super::reporting;

/// Run the batch
///
/// # Arguments
/// * `config_path` - Path to the batch config (JSON)
/// * `report_path` - Optional path for the run report
/// * `json_output` - Print the run report as JSON on stdout
///
/// # Returns
/// Exit code: 0 if every clip and group succeeded, 1 otherwise
pub fn run(config_path: &str, report_path: Option<&str>, json_output: bool) -> Result<ExitCode> {
    let config = BatchConfig::from_file(Path::new(config_path))
        .with_context(|| format!("Failed to load batch config: {}", config_path))?;

    let validation = validate_for_run(&config);
    if !validation.is_ok() {
        if json_output {
            println!("{}", super::validate::validation_json(&validation)?);
        } else {
            println!("{} {}", "Invalid config:".red().bold(), config_path);
            reporting::print_validation(&validation);
        }
        return Ok(ExitCode::from(1));
    }

    if !json_output {
        println!("{}", "======================================".cyan());
        println!("{}", "  animbatch retarget run".cyan());
        println!("{}", "======================================".cyan());
        println!();
        println!("{} {}", "Config:".blue().bold(), config_path);
        println!("{} {}", "Target:".blue().bold(), config.target_armature);
        println!(
            "{} {}",
            "Export directory:".blue().bold(),
            config.export.export_dir.display()
        );
        for warning in &validation.warnings {
            println!("{} {}", "WARN".yellow().bold(), warning);
        }
        println!();
    }

    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).context("Batch run aborted")?;

    if let Some(path) = report_path {
        reporting::write_report(&report, Path::new(path))?;
    }

    if json_output {
        println!(
            "{}",
            report
                .to_json_pretty()
                .context("Failed to serialize run report")?
        );
    } else {
        reporting::print_run_report(&report);
        reporting::print_summary(&report);
        if let Some(path) = report_path {
            println!("{} {}", "Report:".blue().bold(), path);
        }
    }

    Ok(if report.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
