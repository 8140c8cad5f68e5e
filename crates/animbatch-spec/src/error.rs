//! Error types for config validation and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for batch config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Structural errors (E001-E009)
    /// E001: Target armature name is empty
    EmptyTargetArmature,
    /// E002: Import root is empty
    MissingImportRoot,
    /// E003: Export directory is empty
    MissingExportDir,
    /// E004: Source extension is empty or contains a path separator
    InvalidExtension,
    /// E005: Loop policy has no keywords at all
    EmptyLoopPolicy,
    /// E006: Rotation fixup is malformed
    InvalidFixup,
    /// E007: Two export sets sanitize to the same output file
    DuplicateGroupName,
    /// E008: Constraint influence outside 0..=1
    InvalidInfluence,
    /// E009: Export fps is not a positive finite number
    InvalidFps,

    // Run-time path errors (E010-E013)
    /// E010: Import root does not exist
    ImportRootNotFound,
    /// E011: Export directory does not exist
    ExportDirNotFound,
    /// E012: Metadata CSV does not exist
    MetadataNotFound,
    /// E013: Target model file is missing or does not exist
    TargetModelNotFound,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::EmptyTargetArmature => "E001",
            ErrorCode::MissingImportRoot => "E002",
            ErrorCode::MissingExportDir => "E003",
            ErrorCode::InvalidExtension => "E004",
            ErrorCode::EmptyLoopPolicy => "E005",
            ErrorCode::InvalidFixup => "E006",
            ErrorCode::DuplicateGroupName => "E007",
            ErrorCode::InvalidInfluence => "E008",
            ErrorCode::InvalidFps => "E009",
            ErrorCode::ImportRootNotFound => "E010",
            ErrorCode::ExportDirNotFound => "E011",
            ErrorCode::MetadataNotFound => "E012",
            ErrorCode::TargetModelNotFound => "E013",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Warning codes for batch config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: No anchor bones, so no offsets will be applied
    NoAnchorBones,
    /// W002: A keyword is in both the include and exclude sets
    OverlappingKeywords,
    /// W003: Export sets are present, so `grouping` is ignored
    ExportSetsOverrideGrouping,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::NoAnchorBones => "W001",
            WarningCode::OverlappingKeywords => "W002",
            WarningCode::ExportSetsOverrideGrouping => "W003",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// JSON path to the problematic field (e.g., "fixups\[0\].bone").
    pub path: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation error with a JSON path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validation warning with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable warning message.
    pub message: String,
    /// JSON path to the problematic field.
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Creates a new validation warning.
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation warning with a JSON path.
    pub fn with_path(
        code: WarningCode,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Top-level error type for loading a batch config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config validation failed with one or more errors.
    #[error("config validation failed with {0} error(s)")]
    ValidationFailed(usize),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Failed to read the config file.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of config validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether validation passed (no errors).
    pub ok: bool,
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of validation warnings.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Creates a successful validation result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Creates a failed validation result.
    pub fn failure(errors: Vec<ValidationError>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.ok = false;
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merges another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        for error in other.errors {
            self.add_error(error);
        }
        self.warnings.extend(other.warnings);
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns true if any error carries the given code.
    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Returns true if any warning carries the given code.
    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Converts to a Result, returning Err if there are errors.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        if self.ok {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}

/// Common trait for pipeline errors.
///
/// Every error surfaced in a run report goes through this trait so that reports
/// carry a stable code next to the human-readable message.
///
/// # Example
///
/// ```ignore
/// use animbatch_spec::error::BackendError;
///
/// fn handle_error<E: BackendError>(err: E) {
///     eprintln!("[{}] {}", err.code(), err.message());
/// }
/// ```
pub trait BackendError: std::error::Error {
    /// Get the error code for reporting.
    ///
    /// Returns a static string like "RETARGET_001".
    fn code(&self) -> &'static str;

    /// Get a human-readable message describing the error.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Get the error category for grouping related errors.
    fn category(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::EmptyTargetArmature.code(), "E001");
        assert_eq!(ErrorCode::InvalidFps.code(), "E009");
        assert_eq!(ErrorCode::TargetModelNotFound.code(), "E013");
        assert_eq!(WarningCode::ExportSetsOverrideGrouping.to_string(), "W003");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::with_path(ErrorCode::InvalidFixup, "bone is empty", "fixups[0].bone");
        assert_eq!(err.to_string(), "E006: bone is empty (at fixups[0].bone)");

        let err = ValidationError::new(ErrorCode::MissingExportDir, "export_dir is empty");
        assert_eq!(err.to_string(), "E003: export_dir is empty");
    }

    #[test]
    fn test_result_merge() {
        let mut result = ValidationResult::success();
        let mut other = ValidationResult::success();
        other.add_warning(ValidationWarning::new(WarningCode::NoAnchorBones, "none"));
        other.add_error(ValidationError::new(ErrorCode::InvalidFps, "fps"));

        result.merge(other);
        assert!(!result.is_ok());
        assert!(result.has_error(ErrorCode::InvalidFps));
        assert!(result.has_warning(WarningCode::NoAnchorBones));
        assert_eq!(result.into_result().unwrap_err().len(), 1);
    }
}
