//! Discover command implementation
//!
//! Lists the source files a run would pick up, arranged into export groups, with
//! the track name and loop flag each clip would get.

use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_core::grouping::group_entries;
use animbatch_core::{discover, resolve_loop, DiscoveryFilter, ExportGroup, LoopClassifier, MetadataTable};
use animbatch_spec::{track_name, GroupingConfig, LoopSource, DEFAULT_EXPORT_SET_NAME};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use super::reporting::loop_source_label;

/// Options of the discover command.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub root: String,
    pub extension: String,
    pub must_have: Option<String>,
    pub must_not_have: Option<String>,
    /// `single`, `directory` or `metadata`.
    pub group_by: String,
    pub group_name: Option<String>,
    pub metadata: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredClip {
    pub path: String,
    pub track_name: String,
    pub looping: bool,
    pub loop_source: LoopSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredGroup {
    pub name: String,
    pub output: String,
    pub clips: Vec<DiscoveredClip>,
}

fn grouping_config(group_by: &str, group_name: Option<&str>) -> Result<GroupingConfig> {
    let name = group_name.unwrap_or(DEFAULT_EXPORT_SET_NAME).to_string();
    match group_by {
        "single" => Ok(GroupingConfig::Single { name }),
        "directory" => Ok(GroupingConfig::Directory),
        "metadata" => Ok(GroupingConfig::Metadata { default_group: name }),
        other => anyhow::bail!(
            "unknown grouping: {} (expected single, directory, or metadata)",
            other
        ),
    }
}

fn describe(group: &ExportGroup, classifier: &LoopClassifier) -> DiscoveredGroup {
    let clips = group
        .entries
        .iter()
        .map(|item| {
            let (looping, loop_source) = resolve_loop(
                item.loop_override,
                group.loop_mode,
                classifier,
                &item.entry.base_name,
            );
            DiscoveredClip {
                path: item.entry.relative_path.display().to_string(),
                track_name: track_name(&item.entry.base_name, looping),
                looping,
                loop_source,
                tags: item.tags.clone(),
            }
        })
        .collect();
    DiscoveredGroup {
        name: group.name.clone(),
        output: group.file_name(),
        clips,
    }
}

/// Discovers and groups source files.
pub fn plan(options: &DiscoverOptions) -> Result<Vec<DiscoveredGroup>> {
    let grouping = grouping_config(&options.group_by, options.group_name.as_deref())?;
    let metadata = match options.metadata {
        Some(ref csv) => MetadataTable::from_file(Path::new(csv))
            .with_context(|| format!("Failed to load metadata CSV: {}", csv))?,
        None => MetadataTable::default(),
    };

    let filter = DiscoveryFilter::new(&options.extension)
        .must_have(options.must_have.as_deref())
        .must_not_have(options.must_not_have.as_deref());
    let entries = discover(Path::new(&options.root), &filter)
        .with_context(|| format!("Failed to scan: {}", options.root))?;

    let classifier = LoopClassifier::default();
    Ok(group_entries(metadata.annotate(entries), &grouping)
        .iter()
        .map(|g| describe(g, &classifier))
        .collect())
}

/// Run the discover command
///
/// # Returns
/// Exit code: always 0 unless scanning fails
pub fn run(options: &DiscoverOptions) -> Result<ExitCode> {
    let groups = plan(options)?;

    if options.json {
        let json = serde_json::to_string_pretty(&groups).context("Failed to serialize groups")?;
        println!("{}", json);
        return Ok(ExitCode::SUCCESS);
    }

    let total: usize = groups.iter().map(|g| g.clips.len()).sum();
    println!(
        "{} Found {} clip(s) in {} group(s) under {}",
        "INFO".blue().bold(),
        total,
        groups.len(),
        options.root
    );
    for group in &groups {
        println!();
        println!("{} -> {}", group.name.bold(), group.output.dimmed());
        for clip in &group.clips {
            let flag = if clip.looping {
                "loop".green()
            } else {
                "once".normal()
            };
            println!(
                "  {} {} -> {} {}",
                flag,
                clip.path,
                clip.track_name,
                format!("({})", loop_source_label(clip.loop_source)).dimmed()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
