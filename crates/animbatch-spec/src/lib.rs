//! animbatch Batch Configuration Library
//!
//! This crate provides the data side of animbatch: the JSON batch configuration,
//! its validation, and the report types produced by a retargeting run.
//!
//! # Overview
//!
//! A batch run retargets every discovered source clip onto one target skeleton and
//! packs the results into named export groups, one GLB per group. The configuration
//! decides:
//!
//! - **Where** clips come from (`source`, `export_sets`, `metadata_csv`)
//! - **How** they are grouped (`grouping`)
//! - **How** they are transferred (`rig`, `bake`, `fixups`)
//! - **Which** clips loop (`loop_policy`)
//!
//! # Example
//!
//! ```
//! use animbatch_spec::{BatchConfig, validate_config};
//!
//! let config = BatchConfig::from_json(r#"{
//!     "target_armature": "Armature",
//!     "source": { "import_root": "anims" },
//!     "export": { "export_dir": "out" }
//! }"#).unwrap();
//!
//! let result = validate_config(&config);
//! assert!(result.is_ok());
//! ```
//!
//! # Modules
//!
//! - [`config`]: Batch configuration types
//! - [`error`]: Error and warning types for validation
//! - [`fixup`]: Rotation fixup descriptions
//! - [`frame`]: Frame ranges and boundary conventions
//! - [`loop_policy`]: Loop keyword policies
//! - [`naming`]: Group-name sanitizing and track naming
//! - [`report`]: Run report types
//! - [`validation`]: Config validation functions

pub mod config;
pub mod error;
pub mod fixup;
pub mod frame;
pub mod loop_policy;
pub mod naming;
pub mod report;
pub mod validation;

// Re-export commonly used types at the crate root
pub use config::{
    BakeConfig, BatchConfig, BlenderConfig, ConstraintSpace, ExportConfig, ExportLayout,
    ExportMode, ExportSetSpec, GroupingConfig, RigConfig, SourceConfig,
    DEFAULT_BLENDER_TIMEOUT_SECS, DEFAULT_EXPORT_SET_NAME,
};
pub use error::{
    BackendError, ConfigError, ErrorCode, ValidationError, ValidationResult, ValidationWarning,
    WarningCode,
};
pub use fixup::{Axis, CurveFixupSpec};
pub use frame::{FrameBoundary, FrameRange};
pub use loop_policy::{LoopMode, LoopPolicy, LoopPreset};
pub use naming::{is_safe_group_name, sanitize_group_name, track_name, LOOP_SUFFIX};
pub use report::{ClipReport, GroupReport, LoopSource, ReportError, RunReport};
pub use validation::{validate_config, validate_for_run};
