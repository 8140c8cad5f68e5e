//! End-to-end batch runs over synthetic GLB clips.

use std::fs;
use std::path::{Path, PathBuf};

use animbatch_core::action::{bone_data_path, Action, Channel};
use animbatch_core::io::{ArtifactExporter, ExportAnimation, ExportArmature, ExportRequest, GlbExporter};
use animbatch_core::math::{quat_to_wxyz, Transform};
use animbatch_core::{default_scene, run_batch, SceneHost, Skeleton};
use animbatch_spec::{
    Axis, BatchConfig, CurveFixupSpec, ExportLayout, ExportSetSpec, GroupingConfig, LoopMode,
    LoopSource,
};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;

const FPS: f32 = 30.0;

fn humanoid() -> Skeleton {
    let mut skeleton = Skeleton::new();
    skeleton.add_bone("Root", None, Transform::IDENTITY).unwrap();
    skeleton
        .add_bone("Hips", Some("Root"), Transform::from_translation(Vec3::Y))
        .unwrap();
    skeleton
        .add_bone("Spine", Some("Hips"), Transform::from_translation(Vec3::Y * 0.5))
        .unwrap();
    skeleton
        .add_bone("Head", Some("Spine"), Transform::from_translation(Vec3::Y * 0.5))
        .unwrap();
    skeleton
}

/// Hips slide along X by 0.1 per frame; Spine bends around Z.
fn walk_action(name: &str, frames: u32) -> Action {
    let mut action = Action::new(name);
    let location = bone_data_path("Hips", Channel::Location);
    let rotation = bone_data_path("Spine", Channel::RotationQuaternion);
    for f in 1..=frames {
        let frame = f as f32;
        action.ensure(&location, 0).insert(frame, (f - 1) as f32 * 0.1);
        action.ensure(&location, 1).insert(frame, 0.0);
        action.ensure(&location, 2).insert(frame, 0.0);
        let q = Quat::from_rotation_z((f - 1) as f32 * 0.05);
        for (i, v) in quat_to_wxyz(q).into_iter().enumerate() {
            action.ensure(&rotation, i).insert(frame, v);
        }
    }
    action
}

fn write_glb(path: &Path, skeleton: &Skeleton, actions: &[Action]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let request = ExportRequest {
        armatures: vec![ExportArmature {
            name: "Armature",
            origin: Transform::IDENTITY,
            skeleton,
        }],
        animations: actions
            .iter()
            .map(|a| ExportAnimation {
                name: a.name.clone(),
                channels: vec![(0, a)],
            })
            .collect(),
    };
    GlbExporter::new(FPS).export(path, &request).unwrap();
}

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("in")).unwrap();
        fs::create_dir_all(root.join("out")).unwrap();
        write_glb(&root.join("target.glb"), &humanoid(), &[]);
        Self { _dir: dir, root }
    }

    fn clip(&self, relative: &str, frames: u32) {
        let name = Path::new(relative).file_stem().unwrap().to_string_lossy().into_owned();
        write_glb(
            &self.root.join("in").join(relative),
            &humanoid(),
            &[walk_action(&name, frames)],
        );
    }

    fn config(&self) -> BatchConfig {
        let mut config = BatchConfig::new("Armature", self.root.join("in"), self.root.join("out"));
        config.target_model = Some(self.root.join("target.glb"));
        config.source.extension = "glb".to_string();
        config
    }

    fn out(&self, name: &str) -> PathBuf {
        self.root.join("out").join(name)
    }
}

/// Animation names in an exported file.
fn animation_names(path: &Path) -> Vec<String> {
    let (doc, _, _) = gltf::import(path).unwrap();
    let mut names: Vec<String> = doc
        .animations()
        .map(|a| a.name().unwrap_or_default().to_string())
        .collect();
    names.sort();
    names
}

/// Last translation sample of `node` in `animation`.
fn last_translation(path: &Path, animation: &str, node: &str) -> (usize, Vec3) {
    let (doc, buffers, _) = gltf::import(path).unwrap();
    let anim = doc
        .animations()
        .find(|a| a.name() == Some(animation))
        .unwrap();
    for channel in anim.channels() {
        if channel.target().node().name() != Some(node)
            || channel.target().property() != gltf::animation::Property::Translation
        {
            continue;
        }
        let reader = channel.reader(|b| buffers.get(b.index()).map(|bb| bb.0.as_slice()));
        let count = reader.read_inputs().unwrap().count();
        if let Some(gltf::animation::util::ReadOutputs::Translations(it)) = reader.read_outputs() {
            let last = it.last().unwrap();
            return (count, Vec3::from(last));
        }
    }
    panic!("no translation channel for {}", node);
}

#[test]
fn test_directory_groups_end_to_end() {
    let ws = Workspace::new();
    ws.clip("Locomotion/A_Walk_F.glb", 10);
    ws.clip("Locomotion/A_Walk_To_Run.glb", 6);
    ws.clip("Combat/A_Attack.glb", 4);
    fs::write(ws.root.join("in/Combat/A_Broken.glb"), b"not a glb").unwrap();

    let mut config = ws.config();
    config.grouping = GroupingConfig::Directory;
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();

    let names: Vec<&str> = report.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Combat", "Locomotion"]);
    assert!(!report.ok);
    assert_eq!(report.total_clips(), 4);
    assert_eq!(report.failed_clips(), 1);

    let combat = &report.groups[0];
    assert_eq!(combat.track_count, 1);
    let broken = combat.clips.iter().find(|c| c.source.contains("A_Broken")).unwrap();
    assert_eq!(broken.error.as_ref().unwrap().code, "RETARGET_010");

    assert_eq!(
        animation_names(&ws.out("Locomotion.glb")),
        vec!["A_Walk_F-loop".to_string(), "A_Walk_To_Run".to_string()]
    );
    assert_eq!(animation_names(&ws.out("Combat.glb")), vec!["A_Attack".to_string()]);

    let walk = report.groups[1]
        .clips
        .iter()
        .find(|c| c.source.contains("A_Walk_F"))
        .unwrap();
    assert!(walk.looping);
    assert_eq!(walk.loop_source, LoopSource::Heuristic);
    assert_eq!(walk.frames_baked, 10);
    assert_eq!(walk.linked_bones, 4);
    assert!(walk.missing_bones.is_empty());

    // The target only holds its own armature again, with no live links.
    let top = scene.top_level_objects();
    assert_eq!(top.len(), 1);
    let target = scene.armature(top[0]).unwrap();
    assert_eq!(target.constraint_count(), 0);
    assert!(target.action.is_none());
}

#[test]
fn test_baked_motion_matches_source() {
    let ws = Workspace::new();
    ws.clip("A_Walk_F.glb", 10);

    let config = ws.config();
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();
    assert!(report.ok, "{:#?}", report);

    let output = ws.out("anim_export_set.glb");
    let (samples, hips) = last_translation(&output, "A_Walk_F-loop", "Hips");
    assert_eq!(samples, 10);
    // Rest offset (0, 1, 0) plus nine frames of 0.1 along X.
    assert!(hips.abs_diff_eq(Vec3::new(0.9, 1.0, 0.0), 1e-3), "{:?}", hips);
}

#[test]
fn test_export_sets_force_loop_flags() {
    let ws = Workspace::new();
    ws.clip("RootMotion/A_Jump_RootMotion.glb", 3);
    ws.clip("InPlace/A_Idle.glb", 3);

    let mut config = ws.config();
    config.export_sets = vec![
        ExportSetSpec::new("Rooted", ws.root.join("in/RootMotion")).with_loop(LoopMode::Always),
        ExportSetSpec::new("InPlace", ws.root.join("in/InPlace")).with_loop(LoopMode::Never),
    ];
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();
    assert!(report.ok, "{:#?}", report);

    assert_eq!(
        animation_names(&ws.out("Rooted.glb")),
        vec!["A_Jump_RootMotion-loop".to_string()]
    );
    assert_eq!(animation_names(&ws.out("InPlace.glb")), vec!["A_Idle".to_string()]);
    assert_eq!(report.groups[1].clips[0].loop_source, LoopSource::ExportSet);
}

#[test]
fn test_metadata_overrides_loop_and_group() {
    let ws = Workspace::new();
    ws.clip("A_Walk_F.glb", 3);
    ws.clip("A_Dance.glb", 3);
    let csv = ws.root.join("meta.csv");
    fs::write(&csv, "file,group,loop\nA_Walk_F,Moves,false\nA_Dan*,Moves,true\n").unwrap();

    let mut config = ws.config();
    config.metadata_csv = Some(csv);
    config.grouping = GroupingConfig::Metadata {
        default_group: "Misc".to_string(),
    };
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();
    assert!(report.ok, "{:#?}", report);

    assert_eq!(report.groups.len(), 1);
    assert_eq!(
        animation_names(&ws.out("Moves.glb")),
        vec!["A_Dance-loop".to_string(), "A_Walk_F".to_string()]
    );
}

#[test]
fn test_groups_do_not_leak_tracks() {
    let ws = Workspace::new();
    ws.clip("First/A_Idle.glb", 3);
    ws.clip("Second/A_Run.glb", 3);

    let mut config = ws.config();
    config.grouping = GroupingConfig::Directory;
    let mut scene = default_scene(&config);
    run_batch(config, &mut scene).unwrap();

    assert_eq!(animation_names(&ws.out("First.glb")), vec!["A_Idle-loop".to_string()]);
    assert_eq!(animation_names(&ws.out("Second.glb")), vec!["A_Run".to_string()]);
}

#[test]
fn test_missing_fixup_curve_fails_clip_only() {
    let ws = Workspace::new();
    ws.clip("A_Walk_F.glb", 3);
    ws.clip("A_Idle.glb", 3);

    let mut config = ws.config();
    config.fixups = vec![CurveFixupSpec::new("Tail", 90.0, Axis::Y)];
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();

    assert_eq!(report.failed_clips(), 2);
    for clip in &report.groups[0].clips {
        assert_eq!(clip.error.as_ref().unwrap().code, "RETARGET_007");
    }
    assert_eq!(report.groups[0].track_count, 0);
    let top = scene.top_level_objects();
    assert_eq!(scene.armature(top[0]).unwrap().constraint_count(), 0);
}

#[test]
fn test_stray_object_aborts_before_mutation() {
    let ws = Workspace::new();
    ws.clip("A_Walk_F.glb", 3);
    // A second model in the scene breaks the single-top-level invariant.
    let config = ws.config();
    let mut scene = default_scene(&config);
    scene.import_clip(&ws.root.join("target.glb")).unwrap();

    let err = run_batch(config, &mut scene).unwrap_err();
    assert!(err.is_fatal());
    assert!(!ws.out("anim_export_set.glb").exists());
}

#[test]
fn test_per_file_layout_mirrors_source_tree() {
    let ws = Workspace::new();
    ws.clip("Male/A_Walk_F.glb", 5);
    ws.clip("Female/A_Walk_F.glb", 4);
    ws.clip("A_Attack.glb", 3);

    let mut config = ws.config();
    config.export.layout = ExportLayout::PerFile;
    let mut scene = default_scene(&config);
    let report = run_batch(config, &mut scene).unwrap();
    assert!(report.ok, "{:#?}", report);

    assert!(!ws.out("anim_export_set.glb").exists());
    assert_eq!(
        animation_names(&ws.out("Male/A_Walk_F.glb")),
        vec!["A_Walk_F-loop".to_string()]
    );
    assert_eq!(
        animation_names(&ws.out("Female/A_Walk_F.glb")),
        vec!["A_Walk_F-loop".to_string()]
    );
    assert_eq!(animation_names(&ws.out("A_Attack.glb")), vec!["A_Attack".to_string()]);

    let group = &report.groups[0];
    assert_eq!(group.output_path, None);
    assert_eq!(group.track_count, 3);
    let female = group
        .clips
        .iter()
        .find(|c| c.source.starts_with("Female"))
        .unwrap();
    assert_eq!(
        female.output_path,
        Some(ws.out("Female/A_Walk_F.glb").display().to_string())
    );
    let (samples, _) = last_translation(&ws.out("Female/A_Walk_F.glb"), "A_Walk_F-loop", "Hips");
    assert_eq!(samples, 4);

    // Nothing was packed onto the target.
    let top = scene.top_level_objects();
    assert_eq!(top.len(), 1);
    let target = scene.armature(top[0]).unwrap();
    assert!(target.tracks.is_empty());
    assert!(target.action.is_none());
}
