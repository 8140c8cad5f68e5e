//! Doctor command: checks whether a batch can run on this machine.
//!
//! Without a config only Blender is checked. With one, the source folder,
//! target model and export folder it names are checked as well.

use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_core::io::blender::BlenderConverter;
use animbatch_core::{discover, DiscoveryFilter};
use animbatch_spec::BatchConfig;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug)]
struct Finding {
    what: &'static str,
    level: Level,
    detail: String,
}

impl Finding {
    fn new(what: &'static str, level: Level, detail: impl Into<String>) -> Self {
        Self {
            what,
            level,
            detail: detail.into(),
        }
    }
}

pub fn run(config_path: Option<&str>) -> Result<ExitCode> {
    let config = config_path
        .map(|p| {
            BatchConfig::from_file(Path::new(p))
                .with_context(|| format!("Failed to load batch config: {}", p))
        })
        .transpose()?;

    let findings = collect(config.as_ref());
    println!("{} animbatch {}", "doctor".cyan().bold(), env!("CARGO_PKG_VERSION"));
    for finding in &findings {
        let tag = match finding.level {
            Level::Ok => "ok".green(),
            Level::Warn => "warn".yellow(),
            Level::Fail => "fail".red(),
        };
        println!("  {:>4} {:<8} {}", tag, finding.what, finding.detail);
    }

    if findings.iter().any(|f| f.level == Level::Fail) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn collect(config: Option<&BatchConfig>) -> Vec<Finding> {
    let Some(config) = config else {
        return vec![check_blender(&BlenderConverter::new(), false)];
    };
    let needs_blender = config.source.extension.trim_start_matches('.').eq_ignore_ascii_case("fbx");
    let mut findings = vec![
        check_blender(&BlenderConverter::from_config(&config.blender), needs_blender),
        check_sources(config),
    ];
    if let Some(ref model) = config.target_model {
        findings.push(if model.is_file() {
            Finding::new("target", Level::Ok, model.display().to_string())
        } else {
            Finding::new("target", Level::Fail, format!("{} does not exist", model.display()))
        });
    }
    findings.push(check_export_dir(&config.export.export_dir));
    findings
}

/// Missing Blender only fails when the sources are FBX.
fn check_blender(converter: &BlenderConverter, required: bool) -> Finding {
    let missing = if required { Level::Fail } else { Level::Warn };
    let path = match converter.locate() {
        Ok(path) => path,
        Err(_) => {
            return Finding::new(
                "blender",
                missing,
                "not found (set BLENDER_PATH or blender.blender_path)",
            )
        }
    };
    match blender_version(&path) {
        Ok(version) => Finding::new("blender", Level::Ok, format!("{} ({})", version, path.display())),
        Err(e) => Finding::new("blender", missing, format!("{}: {}", path.display(), e)),
    }
}

fn blender_version(path: &Path) -> std::io::Result<String> {
    let output = Command::new(path).arg("--version").output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!("--version exited with {}", output.status)));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_blender_version(&stdout).unwrap_or_else(|| "unknown version".to_string()))
}

fn parse_blender_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Blender "))
        .map(|v| v.trim().to_string())
}

fn check_sources(config: &BatchConfig) -> Finding {
    let root = &config.source.import_root;
    match discover(root, &DiscoveryFilter::from_source(&config.source)) {
        Ok(entries) if entries.is_empty() => Finding::new(
            "sources",
            Level::Warn,
            format!("no .{} files under {}", config.source.extension, root.display()),
        ),
        Ok(entries) => Finding::new(
            "sources",
            Level::Ok,
            format!("{} file(s) under {}", entries.len(), root.display()),
        ),
        Err(e) => Finding::new("sources", Level::Fail, e.to_string()),
    }
}

/// The export folder may not exist yet; its nearest existing ancestor must
/// be a writable directory.
fn check_export_dir(dir: &Path) -> Finding {
    let Some(existing) = nearest_existing(dir) else {
        return Finding::new("export", Level::Fail, format!("{} has no existing ancestor", dir.display()));
    };
    match existing.metadata() {
        Ok(meta) if !meta.is_dir() => Finding::new(
            "export",
            Level::Fail,
            format!("{} is not a directory", existing.display()),
        ),
        Ok(meta) if meta.permissions().readonly() => Finding::new(
            "export",
            Level::Fail,
            format!("{} is read-only", existing.display()),
        ),
        Ok(_) if existing == dir => Finding::new("export", Level::Ok, dir.display().to_string()),
        Ok(_) => Finding::new("export", Level::Ok, format!("{} (will be created)", dir.display())),
        Err(e) => Finding::new("export", Level::Fail, e.to_string()),
    }
}

fn nearest_existing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
