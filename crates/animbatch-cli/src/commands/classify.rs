//! Classify command implementation
//!
//! Shows whether clip names would be marked as looping, and which keyword decided.

use anyhow::{Context, Result};
use colored::Colorize;
use animbatch_core::LoopClassifier;
use animbatch_spec::{track_name, LoopPolicy, LoopPreset};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub name: String,
    pub looping: bool,
    pub track_name: String,
    pub reason: String,
}

/// Builds the classifier for a preset name and optional keyword overrides.
pub fn classifier(preset: &str, include: &[String], exclude: &[String]) -> Result<LoopClassifier> {
    let preset: LoopPreset = preset.parse().map_err(anyhow::Error::msg)?;
    let mut policy = LoopPolicy::preset(preset);
    if !include.is_empty() {
        policy = policy.with_include(include);
    }
    if !exclude.is_empty() {
        policy = policy.with_exclude(exclude);
    }
    Ok(LoopClassifier::from_policy(&policy))
}

/// Classifies one name. File paths are reduced to their stem.
pub fn classify_name(classifier: &LoopClassifier, name: &str) -> Classification {
    let base = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let decision = classifier.explain(&base);
    let looping = decision.looping();
    Classification {
        track_name: track_name(&base, looping),
        name: base,
        looping,
        reason: decision.to_string(),
    }
}

/// Run the classify command
pub fn run(
    names: &[String],
    preset: &str,
    include: &[String],
    exclude: &[String],
    json_output: bool,
) -> Result<ExitCode> {
    let classifier = classifier(preset, include, exclude)?;
    let results: Vec<Classification> = names
        .iter()
        .map(|n| classify_name(&classifier, n))
        .collect();

    if json_output {
        let json =
            serde_json::to_string_pretty(&results).context("Failed to serialize classification")?;
        println!("{}", json);
        return Ok(ExitCode::SUCCESS);
    }

    for result in &results {
        let flag = if result.looping {
            "loop".green().bold()
        } else {
            "once".normal()
        };
        println!(
            "{} {} -> {} {}",
            flag,
            result.name,
            result.track_name,
            format!("({})", result.reason).dimmed()
        );
    }
    Ok(ExitCode::SUCCESS)
}
