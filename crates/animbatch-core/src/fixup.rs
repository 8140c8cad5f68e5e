//! Rotation fixups applied to baked quaternion curves.
//!
//! A fixup post-multiplies every key of a bone's rotation curves by a fixed
//! axis-angle rotation, which corrects bones whose rest orientation differs
//! between the source rig and the target rig.

use animbatch_spec::CurveFixupSpec;
use glam::{Quat, Vec3};
use log::debug;

use crate::action::{bone_data_path, Action, Channel, FCurve};
use crate::error::{RetargetError, RetargetResult};
use crate::math::{quat_from_wxyz, quat_to_wxyz};

/// Distance of the flat handles set on rewritten keys, in frames.
pub const FIXUP_HANDLE_OFFSET: f32 = 0.4;

/// Rotates every key of the four quaternion curves at `data_path` by `angle`
/// radians around `axis`. Returns the number of keys rewritten.
///
/// All four curves must exist and share the same key frames.
pub fn rotate_bone_curve(
    action: &mut Action,
    data_path: &str,
    angle: f32,
    axis: Vec3,
) -> RetargetResult<usize> {
    for index in 0..4 {
        if action.find(data_path, index).is_none() {
            return Err(RetargetError::CurveMissing {
                action: action.name.clone(),
                data_path: data_path.to_string(),
                index,
            });
        }
    }

    let action_name = action.name.clone();
    let mut curves: Vec<&mut FCurve> = action
        .fcurves_mut()
        .iter_mut()
        .filter(|c| c.data_path == data_path && c.array_index < 4)
        .collect();
    curves.sort_by_key(|c| c.array_index);

    let count = curves[0].len();
    for curve in &curves[1..] {
        if curve.len() != count {
            return Err(RetargetError::CurveMisaligned {
                data_path: data_path.to_string(),
                message: format!(
                    "component {} has {} keys, component 0 has {}",
                    curve.array_index,
                    curve.len(),
                    count
                ),
            });
        }
        let misaligned = curve
            .keyframes()
            .iter()
            .zip(curves[0].keyframes())
            .position(|(a, b)| (a.frame() - b.frame()).abs() > 1e-4);
        if let Some(key) = misaligned {
            return Err(RetargetError::CurveMisaligned {
                data_path: data_path.to_string(),
                message: format!("component {} key {} is on a different frame", curve.array_index, key),
            });
        }
    }

    let delta = Quat::from_axis_angle(axis.normalize(), angle);
    for key in 0..count {
        let wxyz = [
            curves[0].keyframes()[key].value(),
            curves[1].keyframes()[key].value(),
            curves[2].keyframes()[key].value(),
            curves[3].keyframes()[key].value(),
        ];
        let rotated = quat_to_wxyz(quat_from_wxyz(wxyz) * delta);
        for (curve, value) in curves.iter_mut().zip(rotated) {
            let keyframe = &mut curve.keyframes_mut()[key];
            keyframe.co.y = value;
            keyframe.set_flat_handles(FIXUP_HANDLE_OFFSET);
        }
    }

    debug!(
        "rotated {} key(s) of {} in '{}' by {:.3} rad",
        count, data_path, action_name, angle
    );
    Ok(count)
}

/// Applies each fixup to the bone's rotation curves, in order.
pub fn apply_fixups(action: &mut Action, fixups: &[CurveFixupSpec]) -> RetargetResult<usize> {
    let mut total = 0;
    for fixup in fixups {
        let path = bone_data_path(&fixup.bone, Channel::RotationQuaternion);
        total += rotate_bone_curve(
            action,
            &path,
            fixup.angle_radians(),
            Vec3::from(fixup.axis.unit()),
        )?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_approx_eq;
    use animbatch_spec::Axis;
    use proptest::prelude::*;

    fn keyed(path: &str, rotations: &[(f32, Quat)]) -> Action {
        let mut action = Action::new("Bake");
        for (frame, q) in rotations {
            for (i, v) in quat_to_wxyz(*q).into_iter().enumerate() {
                action.ensure(path, i).insert(*frame, v);
            }
        }
        action
    }

    fn read(action: &Action, path: &str, key: usize) -> Quat {
        let c: Vec<f32> = (0..4)
            .map(|i| action.find(path, i).unwrap().keyframes()[key].value())
            .collect();
        quat_from_wxyz([c[0], c[1], c[2], c[3]])
    }

    #[test]
    fn test_rotate_bone_curve() {
        let path = bone_data_path("Arm", Channel::RotationQuaternion);
        let mut action = keyed(&path, &[(1.0, Quat::IDENTITY), (2.0, Quat::from_rotation_x(0.3))]);
        let n = rotate_bone_curve(&mut action, &path, std::f32::consts::FRAC_PI_2, Vec3::Y).unwrap();
        assert_eq!(n, 2);
        assert!(quat_approx_eq(
            read(&action, &path, 0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            1e-5
        ));
        assert!(quat_approx_eq(
            read(&action, &path, 1),
            Quat::from_rotation_x(0.3) * Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            1e-5
        ));

        let key = action.find(&path, 0).unwrap().keyframes()[1];
        assert!((key.handle_left.x - (2.0 - FIXUP_HANDLE_OFFSET)).abs() < 1e-6);
        assert_eq!(key.handle_right.y, key.co.y);
    }

    #[test]
    fn test_missing_curve() {
        let path = bone_data_path("Arm", Channel::RotationQuaternion);
        let mut action = keyed(&path, &[(1.0, Quat::IDENTITY)]);
        let err = rotate_bone_curve(&mut action, "pose.bones[\"Leg\"].rotation_quaternion", 1.0, Vec3::Y)
            .unwrap_err();
        assert!(matches!(err, RetargetError::CurveMissing { index: 0, .. }));
    }

    #[test]
    fn test_misaligned_component_counts() {
        let path = bone_data_path("Arm", Channel::RotationQuaternion);
        let mut action = keyed(&path, &[(1.0, Quat::IDENTITY), (2.0, Quat::IDENTITY)]);
        action.ensure(&path, 2).insert(3.0, 0.0);
        let err = rotate_bone_curve(&mut action, &path, 1.0, Vec3::Y).unwrap_err();
        assert!(matches!(err, RetargetError::CurveMisaligned { .. }));
    }

    #[test]
    fn test_apply_fixups_uses_spec_axis() {
        let path = bone_data_path("Hand", Channel::RotationQuaternion);
        let mut action = keyed(&path, &[(1.0, Quat::IDENTITY)]);
        let fixups = [CurveFixupSpec::new("Hand", 90.0, Axis::Z)];
        assert_eq!(apply_fixups(&mut action, &fixups).unwrap(), 1);
        assert!(quat_approx_eq(
            read(&action, &path, 0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            1e-5
        ));
    }

    proptest! {
        #[test]
        fn rotations_compose(a in -3.0f32..3.0, b in -3.0f32..3.0, start in -3.0f32..3.0) {
            let path = bone_data_path("Spine", Channel::RotationQuaternion);
            let initial = [(1.0, Quat::from_rotation_x(start))];
            let mut twice = keyed(&path, &initial);
            rotate_bone_curve(&mut twice, &path, a, Vec3::Y).unwrap();
            rotate_bone_curve(&mut twice, &path, b, Vec3::Y).unwrap();
            let mut once = keyed(&path, &initial);
            rotate_bone_curve(&mut once, &path, a + b, Vec3::Y).unwrap();
            prop_assert!(quat_approx_eq(read(&twice, &path, 0), read(&once, &path, 0), 1e-4));
        }
    }
}
