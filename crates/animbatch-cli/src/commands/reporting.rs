use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_spec::{LoopSource, RunReport, ValidationResult};
use std::fs;
use std::path::Path;

pub(crate) fn loop_source_label(source: LoopSource) -> &'static str {
    match source {
        LoopSource::Metadata => "metadata",
        LoopSource::ExportSet => "export set",
        LoopSource::Heuristic => "name",
    }
}

/// Print validation errors and warnings in the same shape as the validate command.
pub(crate) fn print_validation(validation: &ValidationResult) {
    for err in &validation.errors {
        println!("  {} {}", "x".red(), err);
    }
    for warn in &validation.warnings {
        println!("  {} {}", "!".yellow(), warn);
    }
}

/// Print per-group and per-clip outcomes of a run.
pub(crate) fn print_run_report(report: &RunReport) {
    for group in &report.groups {
        let status = if group.is_ok() {
            "OK".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!(
            "{} {} ({} track(s), {}ms)",
            status, group.name, group.track_count, group.duration_ms
        );
        if let Some(ref path) = group.output_path {
            println!("     {}", path.dimmed());
        }
        if let Some(ref err) = group.error {
            println!("     {} {}: {}", "x".red(), err.code, err.message);
        }

        for clip in &group.clips {
            match clip.error {
                None => {
                    let frames = match (clip.frame_start, clip.frame_end) {
                        (Some(a), Some(b)) => format!("{}..{}", a, b),
                        _ => "-".to_string(),
                    };
                    println!(
                        "  {} {} -> {} [{}] {}",
                        "ok".green(),
                        clip.source,
                        clip.track_name.as_deref().unwrap_or("?"),
                        frames,
                        format!("loop from {}", loop_source_label(clip.loop_source)).dimmed()
                    );
                    if let Some(ref path) = clip.output_path {
                        println!("     {}", path.dimmed());
                    }
                    if !clip.missing_bones.is_empty() {
                        println!(
                            "     {} {} bone(s) not on target: {}",
                            "!".yellow(),
                            clip.missing_bones.len(),
                            clip.missing_bones.join(", ")
                        );
                    }
                }
                Some(ref err) => {
                    println!(
                        "  {} {} - {}: {}",
                        "FAILED".red(),
                        clip.source,
                        err.code,
                        err.message
                    );
                }
            }
        }
    }
}

/// Print the summary block at the end of a run.
pub(crate) fn print_summary(report: &RunReport) {
    println!();
    println!("{} {}", "Groups:".bold(), report.groups.len());
    println!(
        "{} {}",
        "Clips:".green().bold(),
        report.total_clips() - report.failed_clips()
    );
    println!("{} {}", "Failed:".red().bold(), report.failed_clips());
    println!("{} {}", "Purged:".dimmed(), report.purged);
    println!(
        "{} {:.2}s",
        "Runtime:".blue().bold(),
        report.duration_ms as f64 / 1000.0
    );
    println!();
    if report.ok {
        println!("{} All groups exported.", "SUCCESS".green().bold());
    } else {
        println!(
            "{} Some clips or groups failed. See above for details.",
            "WARNING".yellow().bold()
        );
    }
}

pub(crate) fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = report
        .to_json_pretty()
        .context("Failed to serialize run report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    fs::write(path, json)
        .with_context(|| format!("Failed to write report to: {}", path.display()))?;
    Ok(())
}
