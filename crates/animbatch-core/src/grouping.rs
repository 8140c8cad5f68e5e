//! Building export groups from discovered files.

use std::collections::BTreeMap;

use animbatch_spec::{
    sanitize_group_name, ExportSetSpec, GroupingConfig, LoopMode, SourceConfig,
    DEFAULT_EXPORT_SET_NAME,
};
use log::{debug, warn};

use crate::discovery::{discover, DiscoveryFilter};
use crate::error::RetargetResult;
use crate::metadata::{AnimFileEntryMetadata, MetadataTable};

/// Clips destined for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportGroup {
    /// Group name as configured or derived.
    pub name: String,
    /// Sanitized name used for `<file_stem>.glb`.
    pub file_stem: String,
    pub entries: Vec<AnimFileEntryMetadata>,
    pub loop_mode: LoopMode,
}

impl ExportGroup {
    pub fn new(name: impl Into<String>, loop_mode: LoopMode) -> Self {
        let name = name.into();
        Self {
            file_stem: sanitize_group_name(&name),
            name,
            entries: Vec::new(),
            loop_mode,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.glb", self.file_stem)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits entries into groups per the grouping mode. Groups are ordered by file
/// stem; names that sanitize to the same stem share one group. Empty input yields
/// no groups.
pub fn group_entries(
    entries: Vec<AnimFileEntryMetadata>,
    grouping: &GroupingConfig,
) -> Vec<ExportGroup> {
    let mut groups: BTreeMap<String, ExportGroup> = BTreeMap::new();
    for item in entries {
        let name = match grouping {
            GroupingConfig::Single { name } => name.clone(),
            GroupingConfig::Directory => item
                .entry
                .parent_dir_name()
                .unwrap_or_else(|| DEFAULT_EXPORT_SET_NAME.to_string()),
            GroupingConfig::Metadata { default_group } => {
                item.group.clone().unwrap_or_else(|| default_group.clone())
            }
        };
        let stem = sanitize_group_name(&name);
        let group = groups.entry(stem).or_insert_with(|| ExportGroup::new(name.clone(), LoopMode::Auto));
        if group.name != name {
            warn!(
                "groups '{}' and '{}' share the file name {}; merged",
                group.name,
                name,
                group.file_name()
            );
        }
        group.entries.push(item);
    }
    debug!("built {} group(s)", groups.len());
    groups.into_values().collect()
}

/// Discovers one group per export set, in configuration order.
///
/// Each set is searched under its own root with the source extension; the set's
/// filters replace the source filters. Sets that find nothing are kept so that
/// the report lists them.
pub fn export_set_groups(
    sets: &[ExportSetSpec],
    source: &SourceConfig,
    metadata: &MetadataTable,
) -> RetargetResult<Vec<ExportGroup>> {
    let mut groups = Vec::with_capacity(sets.len());
    for set in sets {
        let filter = DiscoveryFilter::new(&source.extension)
            .must_have(set.filename_must_have.as_deref())
            .must_not_have(set.filename_must_not_have.as_deref());
        let entries = discover(&set.root, &filter)?;
        let mut group = ExportGroup::new(&set.name, set.loop_mode);
        group.entries = metadata.annotate(entries);
        debug!("export set '{}': {} clip(s)", set.name, group.len());
        groups.push(group);
    }
    Ok(groups)
}
