//! Error types for the retargeting pipeline.

use std::path::PathBuf;

use animbatch_spec::{BackendError, ReportError};
use thiserror::Error;

/// Result type for pipeline operations.
pub type RetargetResult<T> = Result<T, RetargetError>;

/// Errors that can occur while retargeting and exporting clips.
#[derive(Debug, Error)]
pub enum RetargetError {
    /// The run configuration is unusable.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The scene does not have the expected shape; nothing was modified.
    #[error("Scene sanity check failed: {message}")]
    SanityCheckFailed { message: String },

    /// An object the pipeline depends on is not in the scene.
    #[error("Object not found: {name}")]
    ObjectNotFound { name: String },

    /// The object exists but is not an armature.
    #[error("Object '{name}' is not an armature")]
    NotAnArmature { name: String },

    /// Baking was requested on an armature that is not in pose mode.
    #[error("Armature '{armature}' is not in pose mode")]
    NotInPoseMode { armature: String },

    /// Packing was requested but the armature has no active action.
    #[error("Armature '{armature}' has no active action to pack")]
    NoActiveAction { armature: String },

    /// A rotation fixup targets a curve the action does not have.
    #[error("Curve '{data_path}'[{index}] not found in action '{action}'")]
    CurveMissing {
        action: String,
        data_path: String,
        index: usize,
    },

    /// The quaternion component curves of a fixup target disagree on their keys.
    #[error("Quaternion curves of '{data_path}' are not aligned: {message}")]
    CurveMisaligned { data_path: String, message: String },

    /// A bone was referenced that the skeleton does not have.
    #[error("Bone '{bone}' not found on '{armature}'")]
    BoneNotFound { armature: String, bone: String },

    /// Source clip import failed.
    #[error("Failed to import {path}: {message}")]
    ImportFailed { path: PathBuf, message: String },

    /// Artifact export failed.
    #[error("Failed to export {path}: {message}")]
    ExportFailed { path: PathBuf, message: String },

    /// Source format is not supported by the importer.
    #[error("Unsupported source format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Blender executable not found.
    #[error("Blender executable not found. Ensure Blender is installed and in PATH, or set BLENDER_PATH environment variable")]
    BlenderNotFound,

    /// Blender process timed out.
    #[error("Blender process timed out after {timeout_secs} seconds")]
    BlenderTimeout { timeout_secs: u64 },

    /// Blender process exited with non-zero status.
    #[error("Blender process exited with status {exit_code}: {stderr}")]
    BlenderFailed { exit_code: i32, stderr: String },

    /// Metadata CSV could not be parsed.
    #[error("Metadata error at line {line}: {message}")]
    Metadata { line: usize, message: String },

    /// Directory walk failed.
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetargetError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new sanity check error.
    pub fn sanity_check(message: impl Into<String>) -> Self {
        Self::SanityCheckFailed {
            message: message.into(),
        }
    }

    /// Creates a new object-not-found error.
    pub fn object_not_found(name: impl Into<String>) -> Self {
        Self::ObjectNotFound { name: name.into() }
    }

    /// Creates a new import error.
    pub fn import_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ImportFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new export error.
    pub fn export_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ExportFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that must abort a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RetargetError::Configuration { .. } | RetargetError::SanityCheckFailed { .. }
        )
    }

    /// Converts the error into a report entry.
    pub fn to_report(&self) -> ReportError {
        ReportError::new(self.code(), self.message())
    }
}

impl BackendError for RetargetError {
    fn code(&self) -> &'static str {
        match self {
            RetargetError::Configuration { .. } => "RETARGET_001",
            RetargetError::SanityCheckFailed { .. } => "RETARGET_002",
            RetargetError::ObjectNotFound { .. } => "RETARGET_003",
            RetargetError::NotAnArmature { .. } => "RETARGET_004",
            RetargetError::NotInPoseMode { .. } => "RETARGET_005",
            RetargetError::NoActiveAction { .. } => "RETARGET_006",
            RetargetError::CurveMissing { .. } => "RETARGET_007",
            RetargetError::CurveMisaligned { .. } => "RETARGET_008",
            RetargetError::BoneNotFound { .. } => "RETARGET_009",
            RetargetError::ImportFailed { .. } => "RETARGET_010",
            RetargetError::ExportFailed { .. } => "RETARGET_011",
            RetargetError::UnsupportedFormat { .. } => "RETARGET_012",
            RetargetError::BlenderNotFound => "RETARGET_013",
            RetargetError::BlenderTimeout { .. } => "RETARGET_014",
            RetargetError::BlenderFailed { .. } => "RETARGET_015",
            RetargetError::Metadata { .. } => "RETARGET_016",
            RetargetError::Walk { .. } => "RETARGET_017",
            RetargetError::Io(_) => "RETARGET_018",
        }
    }

    fn category(&self) -> &'static str {
        "retarget"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetargetError::CurveMissing {
            action: "A_Walk".to_string(),
            data_path: "pose.bones[\"Finger_03\"].rotation_quaternion".to_string(),
            index: 0,
        };
        assert!(err.to_string().contains("Finger_03"));
        assert_eq!(err.code(), "RETARGET_007");

        let err = RetargetError::BlenderTimeout { timeout_secs: 300 };
        assert!(err.to_string().contains("300 seconds"));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(RetargetError::sanity_check("two top-level objects").is_fatal());
        assert!(RetargetError::configuration("missing target").is_fatal());
        assert!(!RetargetError::NoActiveAction {
            armature: "Armature".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_to_report() {
        let report = RetargetError::NotInPoseMode {
            armature: "Armature".to_string(),
        }
        .to_report();
        assert_eq!(report.code, "RETARGET_005");
        assert!(report.message.contains("pose mode"));
        assert_eq!(RetargetError::BlenderNotFound.category(), "retarget");
    }
}
