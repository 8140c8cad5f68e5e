//! Recursive discovery of source clip files.

use std::path::{Path, PathBuf};

use animbatch_spec::SourceConfig;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{RetargetError, RetargetResult};

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnimFileEntry {
    pub full_path: PathBuf,
    /// Path relative to the import root.
    pub relative_path: PathBuf,
    /// File stem, used as the clip name.
    pub base_name: String,
}

impl AnimFileEntry {
    pub fn new(root: &Path, full_path: PathBuf) -> Self {
        let relative_path = full_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| full_path.clone());
        let base_name = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            full_path,
            relative_path,
            base_name,
        }
    }

    pub fn file_name(&self) -> String {
        self.full_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Name of the directory containing the file, relative to the import root.
    /// Files at the root yield `None`.
    pub fn parent_dir_name(&self) -> Option<String> {
        self.relative_path
            .parent()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    extension: String,
    must_have: Option<String>,
    must_not_have: Option<String>,
}

impl DiscoveryFilter {
    /// A leading dot on `extension` is ignored.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
            must_have: None,
            must_not_have: None,
        }
    }

    pub fn from_source(config: &SourceConfig) -> Self {
        Self::new(&config.extension)
            .must_have(config.filename_must_have.as_deref())
            .must_not_have(config.filename_must_not_have.as_deref())
    }

    pub fn must_have(mut self, needle: Option<&str>) -> Self {
        self.must_have = needle.filter(|n| !n.is_empty()).map(str::to_lowercase);
        self
    }

    pub fn must_not_have(mut self, needle: Option<&str>) -> Self {
        self.must_not_have = needle.filter(|n| !n.is_empty()).map(str::to_lowercase);
        self
    }

    /// Extension and substring filters, all case-insensitive.
    pub fn matches(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !extension_ok {
            return false;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(ref needle) = self.must_have {
            if !name.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ref needle) = self.must_not_have {
            if name.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Walks `root` and returns every matching file, sorted by path.
///
/// An empty result is not an error.
pub fn discover(root: &Path, filter: &DiscoveryFilter) -> RetargetResult<Vec<AnimFileEntry>> {
    if !root.is_dir() {
        return Err(RetargetError::configuration(format!(
            "import root '{}' is not a directory",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| RetargetError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && filter.matches(entry.path()) {
            entries.push(AnimFileEntry::new(root, entry.into_path()));
        }
    }
    entries.sort();

    if entries.is_empty() {
        warn!(
            "no .{} files found under {}",
            filter.extension,
            root.display()
        );
    } else {
        debug!("discovered {} file(s) under {}", entries.len(), root.display());
    }
    Ok(entries)
}
