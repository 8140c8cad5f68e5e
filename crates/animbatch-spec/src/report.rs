//! Run report types.
//!
//! A run report records what happened to every clip and every export group, so a
//! batch that absorbed per-clip failures still tells the user exactly which clips
//! are missing from which file.

use serde::{Deserialize, Serialize};

/// Where a clip's loop flag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopSource {
    /// CSV metadata override.
    Metadata,
    /// Export-set loop mode.
    ExportSet,
    /// Keyword heuristic.
    Heuristic,
}

/// A coded error attached to a report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    /// Stable error code (e.g. "RETARGET_004").
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ReportError {
    /// Creates a new report error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of retargeting one source armature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipReport {
    /// Source file, relative to its import root.
    pub source: String,
    /// Packed track name, if packing succeeded. With the per-file layout, the
    /// name of the exported animation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    /// File written for this clip alone (per-file layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Whether the clip was marked as looping.
    pub looping: bool,
    /// Where the loop flag came from.
    pub loop_source: LoopSource,
    /// First frame of the source action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_start: Option<i32>,
    /// Last frame of the source action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_end: Option<i32>,
    /// Number of frames baked.
    pub frames_baked: usize,
    /// Number of bones that received constraint links.
    pub linked_bones: usize,
    /// Source bones with no counterpart on the target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_bones: Vec<String>,
    /// Number of rotation fixups applied.
    pub fixups_applied: usize,
    /// Error, if this clip failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl ClipReport {
    /// Creates an empty report for a source file.
    pub fn new(source: impl Into<String>, looping: bool, loop_source: LoopSource) -> Self {
        Self {
            source: source.into(),
            track_name: None,
            output_path: None,
            looping,
            loop_source,
            frame_start: None,
            frame_end: None,
            frames_baked: 0,
            linked_bones: 0,
            missing_bones: Vec::new(),
            fixups_applied: 0,
            error: None,
        }
    }

    /// Returns true if the clip was packed without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.track_name.is_some()
    }
}

/// Outcome of one export group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Group name as configured.
    pub name: String,
    /// Written artifact path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Number of animations written.
    pub track_count: usize,
    /// Per-clip outcomes.
    pub clips: Vec<ClipReport>,
    /// Group-level error (e.g. the export failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
    /// Time spent on the group in milliseconds.
    pub duration_ms: u64,
}

impl GroupReport {
    /// Creates an empty group report.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output_path: None,
            track_count: 0,
            clips: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    /// Returns the number of clips that failed.
    pub fn failed_clips(&self) -> usize {
        self.clips.iter().filter(|c| c.error.is_some()).count()
    }

    /// Returns true if the group exported and no clip failed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.failed_clips() == 0
    }
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Tool identifier and version.
    pub tool_version: String,
    /// Whether every group and clip succeeded.
    pub ok: bool,
    /// Per-group outcomes in run order.
    pub groups: Vec<GroupReport>,
    /// Data blocks freed by the final purge.
    pub purged: usize,
    /// Total run time in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Creates an empty report.
    pub fn new(tool_version: impl Into<String>) -> Self {
        Self {
            tool_version: tool_version.into(),
            ok: true,
            groups: Vec::new(),
            purged: 0,
            duration_ms: 0,
        }
    }

    /// Appends a group report, updating the overall status.
    pub fn push_group(&mut self, group: GroupReport) {
        if !group.is_ok() {
            self.ok = false;
        }
        self.groups.push(group);
    }

    /// Total number of clips across groups.
    pub fn total_clips(&self) -> usize {
        self.groups.iter().map(|g| g.clips.len()).sum()
    }

    /// Total number of failed clips across groups.
    pub fn failed_clips(&self) -> usize {
        self.groups.iter().map(GroupReport::failed_clips).sum()
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
