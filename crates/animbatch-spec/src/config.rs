//! Batch configuration types.
//!
//! A batch config is a JSON document describing one retargeting run: which target
//! skeleton receives the clips, where source clips are found, how they are grouped
//! into output files and how each clip is transferred.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fixup::CurveFixupSpec;
use crate::frame::FrameBoundary;
use crate::loop_policy::{LoopMode, LoopPolicy};

/// Group name used when every clip goes into one export group.
pub const DEFAULT_EXPORT_SET_NAME: &str = "anim_export_set";

/// Default Blender timeout in seconds.
pub const DEFAULT_BLENDER_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Top-level config
// =============================================================================

/// A complete batch retargeting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Name of the target skeleton object.
    pub target_armature: String,
    /// glTF/GLB file holding the target skeleton.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_model: Option<PathBuf>,
    /// Where source clips are discovered.
    pub source: SourceConfig,
    /// Where and how export groups are written.
    pub export: ExportConfig,
    /// How discovered clips are grouped.
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// Explicit export sets. When non-empty, `grouping` is ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_sets: Vec<ExportSetSpec>,
    /// Optional CSV with per-file group/loop/tags metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_csv: Option<PathBuf>,
    /// Loop classification keywords.
    #[serde(default)]
    pub loop_policy: LoopPolicy,
    /// Constraint rig settings.
    #[serde(default)]
    pub rig: RigConfig,
    /// Baking settings.
    #[serde(default)]
    pub bake: BakeConfig,
    /// Rotation fixups applied once to every baked clip.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixups: Vec<CurveFixupSpec>,
    /// Blender settings used for FBX conversion.
    #[serde(default)]
    pub blender: BlenderConfig,
}

impl BatchConfig {
    /// Creates a config with defaults for everything but the required fields.
    pub fn new(
        target_armature: impl Into<String>,
        import_root: impl Into<PathBuf>,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target_armature: target_armature.into(),
            target_model: None,
            source: SourceConfig::new(import_root),
            export: ExportConfig::new(export_dir),
            grouping: GroupingConfig::default(),
            export_sets: Vec::new(),
            metadata_csv: None,
            loop_policy: LoopPolicy::default(),
            rig: RigConfig::default(),
            bake: BakeConfig::default(),
            fixups: Vec::new(),
            blender: BlenderConfig::default(),
        }
    }

    /// Parses a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a config file.
    ///
    /// Relative paths inside the config are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Serializes the config to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolves every relative path in the config against `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.source.import_root);
        resolve(&mut self.export.export_dir);
        if let Some(ref mut model) = self.target_model {
            resolve(model);
        }
        if let Some(ref mut csv) = self.metadata_csv {
            resolve(csv);
        }
        for set in &mut self.export_sets {
            resolve(&mut set.root);
        }
        if let Some(ref mut blender) = self.blender.blender_path {
            if blender.components().count() > 1 {
                resolve(blender);
            }
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Source discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Root directory scanned recursively.
    pub import_root: PathBuf,
    /// File extension to collect (case-insensitive, leading dot optional).
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Only file names containing this substring are collected (case-insensitive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_must_have: Option<String>,
    /// File names containing this substring are skipped (case-insensitive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_must_not_have: Option<String>,
}

fn default_extension() -> String {
    "fbx".to_string()
}

impl SourceConfig {
    /// Creates source settings for a root directory.
    pub fn new(import_root: impl Into<PathBuf>) -> Self {
        Self {
            import_root: import_root.into(),
            extension: default_extension(),
            filename_must_have: None,
            filename_must_not_have: None,
        }
    }
}

/// Which animations an artifact export writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Every packed track becomes one animation.
    #[default]
    NlaTracks,
    /// Only the currently active action is written.
    ActiveActions,
}

impl ExportMode {
    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::NlaTracks => "nla_tracks",
            ExportMode::ActiveActions => "active_actions",
        }
    }
}

/// How retargeted clips are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportLayout {
    /// One `<group>.glb` per export group, one animation per packed track.
    #[default]
    Groups,
    /// One GLB per source file, mirroring its path under the import root.
    PerFile,
}

impl ExportLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportLayout::Groups => "groups",
            ExportLayout::PerFile => "per_file",
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory receiving the exported `.glb` files.
    pub export_dir: PathBuf,
    /// Frames per second used to convert frames to seconds.
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub layout: ExportLayout,
}

fn default_fps() -> f32 {
    30.0
}

impl ExportConfig {
    /// Creates export settings for a directory.
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            fps: default_fps(),
            layout: ExportLayout::default(),
        }
    }
}

/// How discovered clips are split into export groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum GroupingConfig {
    /// All clips go into one group.
    Single {
        /// Group name.
        #[serde(default = "default_export_set_name")]
        name: String,
    },
    /// One group per directory containing clips.
    Directory,
    /// Clips sharing a CSV `group` value form one group.
    Metadata {
        /// Group for clips without a `group` value.
        #[serde(default = "default_export_set_name")]
        default_group: String,
    },
}

fn default_export_set_name() -> String {
    DEFAULT_EXPORT_SET_NAME.to_string()
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig::Single {
            name: default_export_set_name(),
        }
    }
}

/// A named export set: its own root, filters and loop behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSetSpec {
    /// Group name, also the output file stem after sanitizing.
    pub name: String,
    /// Root directory scanned for this set.
    pub root: PathBuf,
    /// Loop behaviour for the whole set.
    #[serde(default, rename = "loop")]
    pub loop_mode: LoopMode,
    /// Only file names containing this substring are collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_must_have: Option<String>,
    /// File names containing this substring are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_must_not_have: Option<String>,
}

impl ExportSetSpec {
    /// Creates an export set with automatic loop detection and no filters.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            loop_mode: LoopMode::Auto,
            filename_must_have: None,
            filename_must_not_have: None,
        }
    }

    /// Sets the loop mode.
    pub fn with_loop(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Sets the required substring.
    pub fn must_have(mut self, needle: impl Into<String>) -> Self {
        self.filename_must_have = Some(needle.into());
        self
    }

    /// Sets the forbidden substring.
    pub fn must_not_have(mut self, needle: impl Into<String>) -> Self {
        self.filename_must_not_have = Some(needle.into());
        self
    }
}

/// Coordinate space in which constraint links match transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSpace {
    /// Match world transforms; the result is written into the target's local pose.
    World,
    /// Copy the source's local pose channels directly.
    #[default]
    Local,
}

/// Constraint rig settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigConfig {
    /// Bones whose location links are biased by the skeleton offset.
    #[serde(default = "default_anchor_bones")]
    pub anchor_bones: Vec<String>,
    /// Matching space.
    #[serde(default)]
    pub space: ConstraintSpace,
    /// Link influence in `0..=1`.
    #[serde(default = "default_influence")]
    pub influence: f32,
}

fn default_anchor_bones() -> Vec<String> {
    vec!["Root".to_string(), "Hips".to_string()]
}

fn default_influence() -> f32 {
    1.0
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            anchor_bones: default_anchor_bones(),
            space: ConstraintSpace::default(),
            influence: default_influence(),
        }
    }
}

/// Baking settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BakeConfig {
    /// Frame range boundary convention.
    #[serde(default)]
    pub boundary: FrameBoundary,
}

/// Blender settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlenderConfig {
    /// Explicit Blender executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blender_path: Option<PathBuf>,
    /// Timeout for one conversion, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_BLENDER_TIMEOUT_SECS
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            blender_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixup::Axis;
    use crate::loop_policy::LoopPreset;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_config_defaults() {
        let config = BatchConfig::from_json(
            r#"{
                "target_armature": "Armature",
                "source": { "import_root": "anims" },
                "export": { "export_dir": "out" }
            }"#,
        )
        .unwrap();

        assert_eq!(config, BatchConfig::new("Armature", "anims", "out"));
        assert_eq!(config.source.extension, "fbx");
        assert_eq!(config.rig.anchor_bones, vec!["Root", "Hips"]);
        assert_eq!(config.rig.space, ConstraintSpace::Local);
        assert_eq!(config.bake.boundary, FrameBoundary::Inclusive);
        assert_eq!(
            config.grouping,
            GroupingConfig::Single {
                name: DEFAULT_EXPORT_SET_NAME.to_string()
            }
        );
    }

    #[test]
    fn test_full_config() {
        let config = BatchConfig::from_json(
            r#"{
                "target_armature": "Armature",
                "target_model": "rigs/target.glb",
                "source": {
                    "import_root": "anims",
                    "extension": ".FBX",
                    "filename_must_not_have": "RootMotion"
                },
                "export": { "export_dir": "out", "fps": 24 },
                "grouping": { "mode": "metadata", "default_group": "misc" },
                "export_sets": [
                    { "name": "locomotion", "root": "anims/loco", "loop": "always", "filename_must_have": "RootMotion" }
                ],
                "metadata_csv": "meta.csv",
                "loop_policy": { "preset": "strict" },
                "rig": { "anchor_bones": ["Hips"], "space": "world", "influence": 0.5 },
                "bake": { "boundary": "exclusive" },
                "fixups": [ { "bone": "Finger_03", "angle_degrees": 180, "axis": "Y" } ],
                "blender": { "timeout_secs": 60 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.export.fps, 24.0);
        assert_eq!(
            config.grouping,
            GroupingConfig::Metadata {
                default_group: "misc".to_string()
            }
        );
        assert_eq!(config.export_sets[0].loop_mode, LoopMode::Always);
        assert_eq!(config.loop_policy.preset, LoopPreset::Strict);
        assert_eq!(config.rig.space, ConstraintSpace::World);
        assert_eq!(config.bake.boundary, FrameBoundary::Exclusive);
        assert_eq!(config.fixups[0], CurveFixupSpec::new("Finger_03", 180.0, Axis::Y));
        assert_eq!(config.blender.timeout_secs, 60);
    }

    #[test]
    fn test_export_mode_serde() {
        let json = serde_json::to_string(&ExportMode::ActiveActions).unwrap();
        assert_eq!(json, "\"active_actions\"");
        assert_eq!(ExportMode::default().as_str(), "nla_tracks");
    }

    #[test]
    fn test_export_layout() {
        let config = BatchConfig::from_json(
            r#"{
                "target_armature": "Armature",
                "source": { "import_root": "anims" },
                "export": { "export_dir": "out", "layout": "per_file" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.export.layout, ExportLayout::PerFile);
        assert_eq!(ExportLayout::default().as_str(), "groups");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = BatchConfig::from_json(
            r#"{
                "target_armature": "Armature",
                "source": { "import_root": "anims" },
                "export": { "export_dir": "out" },
                "exports": []
            }"#,
        );
        assert!(matches!(err, Err(ConfigError::JsonParse(_))));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let mut config = BatchConfig::new("Armature", "anims", "/abs/out");
        config.metadata_csv = Some(PathBuf::from("meta.csv"));
        config.export_sets.push(ExportSetSpec::new("set", "sets/a"));
        config.resolve_relative_to(Path::new("/project"));

        assert_eq!(config.source.import_root, PathBuf::from("/project/anims"));
        assert_eq!(config.export.export_dir, PathBuf::from("/abs/out"));
        assert_eq!(config.metadata_csv, Some(PathBuf::from("/project/meta.csv")));
        assert_eq!(config.export_sets[0].root, PathBuf::from("/project/sets/a"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = BatchConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_roundtrip_json() {
        let mut config = BatchConfig::new("Armature", "anims", "out");
        config.export_sets.push(
            ExportSetSpec::new("masc_root", "anims/masc")
                .with_loop(LoopMode::Always)
                .must_have("RootMotion"),
        );
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"loop\": \"always\""));
        let parsed = BatchConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
