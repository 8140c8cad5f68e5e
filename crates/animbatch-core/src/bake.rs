//! Per-frame baking of the evaluated pose into keyframes.

use animbatch_spec::{FrameBoundary, FrameRange};
use glam::Quat;
use log::debug;

use crate::action::{bone_data_path, ActionId, Channel};
use crate::error::{RetargetError, RetargetResult};
use crate::math::{align_hemisphere, quat_to_wxyz, Transform};
use crate::scene::{ObjectId, SceneHost};

/// Result of one bake.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeReport {
    pub range: FrameRange,
    pub frames: usize,
    pub bones: usize,
    pub action: ActionId,
}

/// Steps the host through `range` and keys every bone's evaluated location and
/// rotation on the target's active action, creating one named `action_name` if
/// the slot is empty.
///
/// The target must be in pose mode. Frames are visited in increasing order.
pub fn bake<H: SceneHost + ?Sized>(
    host: &mut H,
    target: ObjectId,
    range: FrameRange,
    boundary: FrameBoundary,
    action_name: &str,
) -> RetargetResult<BakeReport> {
    let armature_name = host.object_name(target);
    let skeleton = host.armature(target)?;
    if !skeleton.is_pose_mode() {
        return Err(RetargetError::NotInPoseMode {
            armature: armature_name,
        });
    }
    let bone_names: Vec<String> = skeleton.bones().iter().map(|b| b.name.clone()).collect();
    let active = skeleton.action;

    let action_id = match active {
        Some(id) => id,
        None => {
            let id = host.new_action(action_name);
            host.armature_mut(target)?.action = Some(id);
            id
        }
    };

    let mut previous: Vec<Option<Quat>> = vec![None; bone_names.len()];
    let mut frames = 0;
    for frame in range.frames(boundary) {
        host.set_frame(frame);
        let pose: Vec<Transform> = host.armature(target)?.bones().iter().map(|b| b.pose).collect();

        let Some(action) = host.action_mut(action_id) else {
            return Err(RetargetError::NoActiveAction {
                armature: armature_name,
            });
        };
        for (i, (name, basis)) in bone_names.iter().zip(&pose).enumerate() {
            let location = bone_data_path(name, Channel::Location);
            for (index, value) in basis.translation.to_array().into_iter().enumerate() {
                action.ensure(&location, index).insert(frame as f32, value);
            }

            let rotation = match previous[i] {
                Some(prev) => align_hemisphere(prev, basis.rotation),
                None => basis.rotation,
            };
            previous[i] = Some(rotation);
            let path = bone_data_path(name, Channel::RotationQuaternion);
            for (index, value) in quat_to_wxyz(rotation).into_iter().enumerate() {
                action.ensure(&path, index).insert(frame as f32, value);
            }
        }
        frames += 1;
    }

    debug!(
        "baked {} frame(s) of {} bone(s) on '{}' ({})",
        frames,
        bone_names.len(),
        armature_name,
        range
    );
    Ok(BakeReport {
        range,
        frames,
        bones: bone_names.len(),
        action: action_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintKind, ConstraintLink};
    use crate::math::quat_approx_eq;
    use crate::scene::{MemoryScene, SceneObject};
    use crate::skeleton::tests::humanoid;
    use crate::skeleton::ArmatureMode;
    use glam::Vec3;

    fn scene() -> (MemoryScene, ObjectId, ObjectId) {
        let mut scene = MemoryScene::new();
        let target = scene.add_object(SceneObject::armature("Armature", humanoid()));
        let source = scene.add_object(SceneObject::armature("Source", humanoid()));

        let clip = scene.new_action("Clip");
        let action = scene.action_mut(clip).unwrap();
        let path = bone_data_path("Hips", Channel::Location);
        action.ensure(&path, 0).insert(1.0, 0.0);
        action.ensure(&path, 0).insert(5.0, 4.0);
        let rot = bone_data_path("Spine", Channel::RotationQuaternion);
        let q = Quat::from_rotation_z(0.5);
        for (i, v) in quat_to_wxyz(q).into_iter().enumerate() {
            action.ensure(&rot, i).insert(1.0, v);
        }
        scene.armature_mut(source).unwrap().action = Some(clip);

        let skeleton = scene.armature_mut(target).unwrap();
        for name in ["Root", "Hips", "Spine", "Head", "Leg"] {
            let bone = skeleton.bone_mut(name).unwrap();
            bone.constraints
                .push(ConstraintLink::new(ConstraintKind::CopyRotation, source, name));
            bone.constraints
                .push(ConstraintLink::new(ConstraintKind::CopyLocation, source, name));
        }
        (scene, source, target)
    }

    #[test]
    fn test_bake_requires_pose_mode() {
        let (mut scene, _, target) = scene();
        let range = FrameRange::new(1, 5).unwrap();
        let err = bake(&mut scene, target, range, FrameBoundary::Inclusive, "Bake").unwrap_err();
        assert!(matches!(err, RetargetError::NotInPoseMode { .. }));
    }

    #[test]
    fn test_bake_keys_every_frame() {
        let (mut scene, _, target) = scene();
        scene.armature_mut(target).unwrap().mode = ArmatureMode::Pose;
        let range = FrameRange::new(1, 5).unwrap();
        let report = bake(&mut scene, target, range, FrameBoundary::Inclusive, "Bake").unwrap();
        assert_eq!(report.frames, 5);
        assert_eq!(report.bones, 5);

        let action = scene.action(report.action).unwrap();
        let x = action.find(&bone_data_path("Hips", Channel::Location), 0).unwrap();
        assert_eq!(x.len(), 5);
        assert!((x.evaluate(3.0).unwrap() - 2.0).abs() < 1e-4);
        // 5 bones, 3 location + 4 rotation curves each.
        assert_eq!(action.fcurves().len(), 35);
    }

    #[test]
    fn test_baked_action_reproduces_pose_without_links() {
        let (mut scene, source, target) = scene();
        scene.armature_mut(target).unwrap().mode = ArmatureMode::Pose;
        let range = FrameRange::new(1, 5).unwrap();
        let report = bake(&mut scene, target, range, FrameBoundary::Inclusive, "Bake").unwrap();
        crate::rig::teardown(scene.armature_mut(target).unwrap());

        let clip = scene.armature(source).unwrap().action.unwrap();
        let expected_x = scene
            .action(clip)
            .unwrap()
            .find(&bone_data_path("Hips", Channel::Location), 0)
            .unwrap()
            .evaluate(4.0)
            .unwrap();

        let action = scene.action(report.action).unwrap().clone();
        let mut skeleton = scene.armature(target).unwrap().clone();
        skeleton.reset_pose();
        skeleton.apply_action(&action, 4.0);
        let hips = skeleton.bone("Hips").unwrap();
        assert!(hips.pose.translation.abs_diff_eq(Vec3::new(expected_x, 0.0, 0.0), 1e-4));
        let spine = skeleton.bone("Spine").unwrap();
        assert!(quat_approx_eq(spine.pose.rotation, Quat::from_rotation_z(0.5), 1e-4));
    }

    #[test]
    fn test_exclusive_boundary_skips_last_frame() {
        let (mut scene, _, target) = scene();
        scene.armature_mut(target).unwrap().mode = ArmatureMode::Pose;
        let range = FrameRange::new(1, 5).unwrap();
        let report = bake(&mut scene, target, range, FrameBoundary::Exclusive, "Bake").unwrap();
        assert_eq!(report.frames, 4);
        let action = scene.action(report.action).unwrap();
        assert_eq!(action.frame_range(), Some((1.0, 4.0)));
    }
}
