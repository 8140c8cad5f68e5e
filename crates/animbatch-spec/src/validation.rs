//! Batch config validation.
//!
//! [`validate_config`] checks the structure of a config without touching the file
//! system. [`validate_for_run`] additionally checks that every referenced path exists;
//! it is what a run calls before any scene mutation happens.

use std::collections::HashMap;

use crate::config::{BatchConfig, GroupingConfig};
use crate::error::{ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode};
use crate::naming::sanitize_group_name;

/// Validates the structure of a batch config.
pub fn validate_config(config: &BatchConfig) -> ValidationResult {
    let mut result = ValidationResult::success();

    if config.target_armature.trim().is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::EmptyTargetArmature,
            "target_armature cannot be empty",
            "target_armature",
        ));
    }

    if config.export_sets.is_empty() && config.source.import_root.as_os_str().is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::MissingImportRoot,
            "import path not specified",
            "source.import_root",
        ));
    }

    if config.export.export_dir.as_os_str().is_empty() {
        result.add_error(ValidationError::with_path(
            ErrorCode::MissingExportDir,
            "export path not specified",
            "export.export_dir",
        ));
    }

    validate_extension(&config.source.extension, &mut result);

    if !(config.export.fps.is_finite() && config.export.fps > 0.0) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidFps,
            format!("fps must be a positive number, got {}", config.export.fps),
            "export.fps",
        ));
    }

    let influence = config.rig.influence;
    if !(0.0..=1.0).contains(&influence) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidInfluence,
            format!("influence must be within 0..=1, got {}", influence),
            "rig.influence",
        ));
    }

    if config.rig.anchor_bones.is_empty() {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::NoAnchorBones,
            "no anchor bones configured; skeleton offsets will not be applied",
            "rig.anchor_bones",
        ));
    }

    validate_loop_policy(config, &mut result);
    validate_fixups(config, &mut result);
    validate_export_sets(config, &mut result);

    result
}

/// Validates a config and checks that every referenced path exists.
pub fn validate_for_run(config: &BatchConfig) -> ValidationResult {
    let mut result = validate_config(config);

    if config.export_sets.is_empty()
        && !config.source.import_root.as_os_str().is_empty()
        && !config.source.import_root.is_dir()
    {
        result.add_error(ValidationError::with_path(
            ErrorCode::ImportRootNotFound,
            format!(
                "import path does not exist: {}",
                config.source.import_root.display()
            ),
            "source.import_root",
        ));
    }

    for (i, set) in config.export_sets.iter().enumerate() {
        if !set.root.is_dir() {
            result.add_error(ValidationError::with_path(
                ErrorCode::ImportRootNotFound,
                format!("export set root does not exist: {}", set.root.display()),
                format!("export_sets[{}].root", i),
            ));
        }
    }

    if !config.export.export_dir.as_os_str().is_empty() && !config.export.export_dir.is_dir() {
        result.add_error(ValidationError::with_path(
            ErrorCode::ExportDirNotFound,
            format!(
                "export path does not exist: {}",
                config.export.export_dir.display()
            ),
            "export.export_dir",
        ));
    }

    if let Some(ref csv) = config.metadata_csv {
        if !csv.is_file() {
            result.add_error(ValidationError::with_path(
                ErrorCode::MetadataNotFound,
                format!("metadata CSV does not exist: {}", csv.display()),
                "metadata_csv",
            ));
        }
    }

    match config.target_model {
        Some(ref model) if !model.is_file() => {
            result.add_error(ValidationError::with_path(
                ErrorCode::TargetModelNotFound,
                format!("target model does not exist: {}", model.display()),
                "target_model",
            ));
        }
        Some(_) => {}
        None => {
            result.add_error(ValidationError::with_path(
                ErrorCode::TargetModelNotFound,
                "target_model is required to run a batch",
                "target_model",
            ));
        }
    }

    result
}

fn validate_extension(extension: &str, result: &mut ValidationResult) {
    let trimmed = extension.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains(|c: char| matches!(c, '/' | '\\' | '.')) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidExtension,
            format!("invalid source extension '{}'", extension),
            "source.extension",
        ));
    }
}

fn validate_loop_policy(config: &BatchConfig, result: &mut ValidationResult) {
    let include = config.loop_policy.include_keywords();
    let exclude = config.loop_policy.exclude_keywords();

    let non_empty = |keywords: &[String]| keywords.iter().any(|k| !k.trim().is_empty());
    if !non_empty(&include) && !non_empty(&exclude) {
        result.add_error(ValidationError::with_path(
            ErrorCode::EmptyLoopPolicy,
            "loop policy has no include or exclude keywords",
            "loop_policy",
        ));
    }

    for keyword in &include {
        if exclude.iter().any(|e| e.eq_ignore_ascii_case(keyword)) {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::OverlappingKeywords,
                format!(
                    "keyword '{}' is both included and excluded; exclusion wins",
                    keyword
                ),
                "loop_policy",
            ));
        }
    }
}

fn validate_fixups(config: &BatchConfig, result: &mut ValidationResult) {
    for (i, fixup) in config.fixups.iter().enumerate() {
        if fixup.bone.trim().is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidFixup,
                "fixup bone cannot be empty",
                format!("fixups[{}].bone", i),
            ));
        }
        if fixup.bone.contains('"') {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidFixup,
                format!("fixup bone name cannot contain quotes: {}", fixup.bone),
                format!("fixups[{}].bone", i),
            ));
        }
        if !fixup.angle_degrees.is_finite() {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidFixup,
                "fixup angle must be finite",
                format!("fixups[{}].angle_degrees", i),
            ));
        }
    }
}

fn validate_export_sets(config: &BatchConfig, result: &mut ValidationResult) {
    if config.export_sets.is_empty() {
        return;
    }

    if config.grouping != GroupingConfig::default() {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::ExportSetsOverrideGrouping,
            "export_sets are present; grouping is ignored",
            "grouping",
        ));
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (i, set) in config.export_sets.iter().enumerate() {
        let file_stem = sanitize_group_name(&set.name);
        if let Some(first) = seen.insert(file_stem.clone(), i) {
            result.add_error(ValidationError::with_path(
                ErrorCode::DuplicateGroupName,
                format!(
                    "export sets {} and {} both write {}.glb",
                    first, i, file_stem
                ),
                format!("export_sets[{}].name", i),
            ));
        }
    }
}
