//! The batch driver.
//!
//! A run validates the config, checks the scene, plans the export groups and
//! then, group by group, retargets every clip onto the target armature and
//! exports the packed tracks:
//!
//! ```text
//! reset target -> per clip: import -> offsets -> rig -> bake -> teardown
//!                           -> fixups -> classify -> pack -> remove import
//!              -> export <group>.glb -> purge
//! ```
//!
//! With the per-file layout a clip is exported on its own right after its
//! fixups, to `<export_dir>/<relative path>.glb`, instead of being packed.
//!
//! Configuration and sanity failures abort before the scene is touched. Clip
//! failures are recorded in the report and the batch continues.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use animbatch_spec::{
    track_name, validate_config, BatchConfig, ClipReport, ExportLayout, ExportMode, FrameRange,
    GroupReport, RunReport,
};
use log::{debug, info, warn};

use crate::action::Action;
use crate::bake::bake;
use crate::classify::{resolve_loop, LoopClassifier};
use crate::discovery::{discover, DiscoveryFilter};
use crate::error::{RetargetError, RetargetResult};
use crate::fixup::apply_fixups;
use crate::grouping::{export_set_groups, group_entries, ExportGroup};
use crate::metadata::{AnimFileEntryMetadata, MetadataTable};
use crate::offsets::compute_bone_offsets;
use crate::rig::{RigGuard, RigOptions};
use crate::scene::{ObjectId, SceneHost};
use crate::skeleton::ArmatureMode;
use crate::tracks::{clear_action, clear_tracks, pack};

/// A configured batch run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: BatchConfig,
    classifier: LoopClassifier,
    rig: RigOptions,
    metadata: MetadataTable,
}

impl Pipeline {
    /// Validates the config and loads the metadata sheet, if any.
    pub fn from_config(config: BatchConfig) -> RetargetResult<Self> {
        let validation = validate_config(&config);
        for warning in &validation.warnings {
            warn!("{}", warning);
        }
        if !validation.is_ok() {
            let messages: Vec<String> = validation.errors.iter().map(|e| e.to_string()).collect();
            return Err(RetargetError::configuration(messages.join("; ")));
        }

        let metadata = match config.metadata_csv {
            Some(ref csv) => MetadataTable::from_file(csv)?,
            None => MetadataTable::default(),
        };

        Ok(Self {
            classifier: LoopClassifier::from_policy(&config.loop_policy),
            rig: RigOptions::from_config(&config.rig),
            metadata,
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn classifier(&self) -> &LoopClassifier {
        &self.classifier
    }

    /// Imports the configured target model and returns the target armature.
    pub fn load_target<H: SceneHost + ?Sized>(&self, host: &mut H) -> RetargetResult<ObjectId> {
        let model = self.config.target_model.as_ref().ok_or_else(|| {
            RetargetError::configuration("target_model is required to load the target")
        })?;
        host.import_clip(model)?;
        let target = host
            .find_object(&self.config.target_armature)
            .ok_or_else(|| RetargetError::object_not_found(&self.config.target_armature))?;
        host.armature(target)?;
        info!("loaded target '{}' from {}", self.config.target_armature, model.display());
        Ok(target)
    }

    /// Checks the scene before anything is mutated: the target armature exists
    /// and is the only top-level object, and the export directory exists.
    pub fn sanity_check<H: SceneHost + ?Sized>(&self, host: &H) -> RetargetResult<ObjectId> {
        let name = &self.config.target_armature;
        let target = host
            .find_object(name)
            .ok_or_else(|| RetargetError::sanity_check(format!("target armature '{}' not found", name)))?;
        if host.armature(target).is_err() {
            return Err(RetargetError::sanity_check(format!("'{}' is not an armature", name)));
        }

        let top_level = host.top_level_objects();
        if top_level != [target] {
            let names: Vec<String> = top_level.iter().map(|id| host.object_name(*id)).collect();
            return Err(RetargetError::sanity_check(format!(
                "'{}' must be the only top-level object, found: {}",
                name,
                names.join(", ")
            )));
        }

        let export_dir = &self.config.export.export_dir;
        if !export_dir.is_dir() {
            return Err(RetargetError::sanity_check(format!(
                "export directory does not exist: {}",
                export_dir.display()
            )));
        }
        Ok(target)
    }

    /// Discovers source files and arranges them into export groups.
    pub fn plan(&self) -> RetargetResult<Vec<ExportGroup>> {
        if !self.config.export_sets.is_empty() {
            return export_set_groups(&self.config.export_sets, &self.config.source, &self.metadata);
        }
        let filter = DiscoveryFilter::from_source(&self.config.source);
        let entries = discover(&self.config.source.import_root, &filter)?;
        Ok(group_entries(self.metadata.annotate(entries), &self.config.grouping))
    }

    /// Output path of a group.
    pub fn output_path(&self, group: &ExportGroup) -> PathBuf {
        self.config.export.export_dir.join(group.file_name())
    }

    /// Per-file output path of the `index`th armature retargeted from a source
    /// file. Later armatures of the same file get a `.001`-style suffix.
    pub fn clip_output_path(&self, relative_path: &Path, index: usize) -> PathBuf {
        let path = self.config.export.export_dir.join(relative_path).with_extension("glb");
        if index == 0 {
            return path;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{}.{:03}.glb", stem, index))
    }

    /// Runs the whole batch against a host that already holds the target.
    pub fn run<H: SceneHost + ?Sized>(&self, host: &mut H) -> RetargetResult<RunReport> {
        let started = Instant::now();
        let target = self.sanity_check(host)?;
        let groups = self.plan()?;
        info!(
            "{} group(s), {} clip(s)",
            groups.len(),
            groups.iter().map(ExportGroup::len).sum::<usize>()
        );

        let mut report = RunReport::new(format!("animbatch v{}", env!("CARGO_PKG_VERSION")));
        for group in &groups {
            let group_report = self.run_group(host, target, group);
            report.push_group(group_report);
        }
        report.purged = host.purge_unused();
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Retargets and exports one group. Failures end up in the report.
    pub fn run_group<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        target: ObjectId,
        group: &ExportGroup,
    ) -> GroupReport {
        let started = Instant::now();
        let mut report = GroupReport::new(&group.name);
        info!("group '{}': {} clip(s)", group.name, group.len());

        if let Ok(skeleton) = host.armature_mut(target) {
            let cleared = clear_tracks(skeleton);
            clear_action(skeleton);
            if cleared > 0 {
                debug!("cleared {} leftover track(s)", cleared);
            }
        }
        host.purge_unused();

        for item in &group.entries {
            let clips = self.process_file(host, target, group, item);
            report.clips.extend(clips);
        }

        if self.config.export.layout == ExportLayout::PerFile {
            report.track_count = report.clips.iter().filter(|c| c.output_path.is_some()).count();
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        let path = self.output_path(group);
        match host.export_artifact(&path, &[target], ExportMode::NlaTracks) {
            Ok(summary) => {
                info!(
                    "exported {} ({} animation(s))",
                    summary.path.display(),
                    summary.animations
                );
                report.output_path = Some(summary.path.display().to_string());
                report.track_count = summary.animations;
            }
            Err(e) => {
                warn!("export of group '{}' failed: {}", group.name, e);
                report.error = Some(e.to_report());
            }
        }
        host.purge_unused();

        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Imports one source file and retargets every animated armature in it.
    fn process_file<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        target: ObjectId,
        group: &ExportGroup,
        item: &AnimFileEntryMetadata,
    ) -> Vec<ClipReport> {
        let entry = &item.entry;
        let source_label = entry.relative_path.display().to_string();
        let (looping, loop_source) =
            resolve_loop(item.loop_override, group.loop_mode, &self.classifier, &entry.base_name);
        let failed = |error: RetargetError| {
            warn!("{}: {}", source_label, error);
            let mut clip = ClipReport::new(&source_label, looping, loop_source);
            clip.error = Some(error.to_report());
            clip
        };

        let before: BTreeSet<ObjectId> = host.top_level_objects().into_iter().collect();
        if let Err(e) = host.import_clip(&entry.full_path) {
            return vec![failed(e)];
        }
        let imported: Vec<ObjectId> = host
            .top_level_objects()
            .into_iter()
            .filter(|id| !before.contains(id))
            .collect();

        let sources: Vec<ObjectId> = imported
            .iter()
            .copied()
            .filter(|id| host.armature(*id).is_ok_and(|s| s.action.is_some()))
            .collect();

        let mut clips = Vec::new();
        if sources.is_empty() {
            clips.push(failed(RetargetError::import_failed(
                &entry.full_path,
                "no animated armature in file",
            )));
        }
        let name = track_name(&entry.base_name, looping);
        let per_file = self.config.export.layout == ExportLayout::PerFile;
        for (index, source) in sources.into_iter().enumerate() {
            let mut clip = ClipReport::new(&source_label, looping, loop_source);
            let output = per_file.then(|| self.clip_output_path(&entry.relative_path, index));
            let result = self.retarget(host, source, target, &name, output.as_deref(), &mut clip);
            if let Err(e) = result {
                warn!("{}: {}", source_label, e);
                clip.error = Some(e.to_report());
            }
            self.reset_target(host, target);
            clips.push(clip);
        }

        for id in imported {
            host.remove_object(id);
        }
        if per_file {
            // Nothing is packed, so drop the exported actions before the next file.
            host.purge_unused();
        }
        clips
    }

    /// The per-clip critical section: rig, bake, teardown, fixup, then pack,
    /// or export on its own when `output` is set.
    fn retarget<H: SceneHost + ?Sized>(
        &self,
        host: &mut H,
        source: ObjectId,
        target: ObjectId,
        name: &str,
        output: Option<&Path>,
        clip: &mut ClipReport,
    ) -> RetargetResult<()> {
        let source_name = host.object_name(source);
        let action = host
            .armature(source)?
            .action
            .ok_or_else(|| RetargetError::NoActiveAction {
                armature: source_name.clone(),
            })?;
        let range = host
            .action(action)
            .and_then(bake_range)
            .ok_or_else(|| RetargetError::NoActiveAction {
                armature: source_name.clone(),
            })?;
        clip.frame_start = Some(range.start);
        clip.frame_end = Some(range.end);

        // Offsets are taken in the rest pose of both armatures.
        host.armature_mut(source)?.reset_pose();
        host.armature_mut(target)?.reset_pose();
        let offsets = compute_bone_offsets(
            host.armature(source)?,
            host.object_world(source),
            host.armature(target)?,
            host.object_world(target),
        );

        host.armature_mut(target)?.mode = ArmatureMode::Pose;
        let mut guard = RigGuard::build(host, source, target, &offsets, &self.rig)?;
        let baked = bake(&mut *guard, target, range, self.config.bake.boundary, name)?;
        let rig = guard.release();
        clip.frames_baked = baked.frames;
        clip.linked_bones = rig.linked.len();
        clip.missing_bones = rig.missing_in_target;
        host.armature_mut(target)?.mode = ArmatureMode::Object;

        if !self.config.fixups.is_empty() {
            let baked_action = host
                .action_mut(baked.action)
                .ok_or_else(|| RetargetError::NoActiveAction {
                    armature: source_name.clone(),
                })?;
            apply_fixups(baked_action, &self.config.fixups)?;
            clip.fixups_applied = self.config.fixups.len();
        }

        if let Some(path) = output {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let summary = host.export_artifact(path, &[target], ExportMode::ActiveActions)?;
            info!(
                "{} -> {} ({} frames)",
                source_name,
                summary.path.display(),
                baked.frames
            );
            clip.track_name = host.action(baked.action).map(|a| a.name.clone());
            clip.output_path = Some(summary.path.display().to_string());
            return Ok(());
        }

        let track = pack(host, target, name)?;
        info!("{} -> track '{}' ({} frames)", source_name, track, baked.frames);
        clip.track_name = Some(track);
        Ok(())
    }

    /// Leaves the target ready for the next clip whatever happened before.
    fn reset_target<H: SceneHost + ?Sized>(&self, host: &mut H, target: ObjectId) {
        if let Ok(skeleton) = host.armature_mut(target) {
            crate::rig::teardown(skeleton);
            if clear_action(skeleton) {
                debug!("dropped unpacked action from target");
            }
            skeleton.mode = ArmatureMode::Object;
            skeleton.reset_pose();
        }
    }
}

/// Integer frame range of a source action. Fractional ends are truncated, so
/// a trailing partial frame is not baked.
fn bake_range(action: &Action) -> Option<FrameRange> {
    let (start, end) = action.frame_range()?;
    FrameRange::from_f32(start, end)
}

/// Runs a config end to end: load the target model into `host`, then run.
pub fn run_batch<H: SceneHost + ?Sized>(config: BatchConfig, host: &mut H) -> RetargetResult<RunReport> {
    let pipeline = Pipeline::from_config(config)?;
    pipeline.load_target(host)?;
    pipeline.run(host)
}
