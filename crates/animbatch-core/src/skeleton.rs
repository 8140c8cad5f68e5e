//! Skeletons: bone hierarchies with rest transforms and a live pose.

use std::collections::HashMap;

use glam::Mat4;

use crate::action::{parse_bone_data_path, Action, ActionId, Channel};
use crate::constraint::ConstraintLink;
use crate::error::{RetargetError, RetargetResult};
use crate::math::{quat_from_wxyz, quat_to_wxyz, Transform};
use crate::tracks::AnimTrack;

/// Interaction mode of an armature object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmatureMode {
    #[default]
    Object,
    Pose,
}

/// A bone: rest transform relative to its parent, plus a pose basis on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone. Parents always precede children.
    pub parent: Option<usize>,
    /// Rest transform relative to the parent bone (or the armature origin).
    pub rest: Transform,
    /// Pose basis applied on top of `rest`.
    pub pose: Transform,
    /// Live constraint links owned by this bone.
    pub constraints: Vec<ConstraintLink>,
}

impl Bone {
    /// Local matrix: rest followed by the pose basis.
    pub fn local_matrix(&self) -> Mat4 {
        self.rest.to_mat4() * self.pose.to_mat4()
    }
}

/// A bone hierarchy with its animation slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    index: HashMap<String, usize>,
    pub mode: ArmatureMode,
    /// Active action slot.
    pub action: Option<ActionId>,
    /// Stored animation tracks.
    pub tracks: Vec<AnimTrack>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bone. The parent, if any, must already exist.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<&str>,
        rest: Transform,
    ) -> RetargetResult<usize> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(RetargetError::configuration(format!(
                "duplicate bone name '{}'",
                name
            )));
        }
        let parent = match parent {
            Some(p) => Some(self.bone_index(p).ok_or_else(|| {
                RetargetError::configuration(format!(
                    "parent bone '{}' of '{}' does not exist",
                    p, name
                ))
            })?),
            None => None,
        };

        let idx = self.bones.len();
        self.index.insert(name.clone(), idx);
        self.bones.push(Bone {
            name,
            parent,
            rest,
            pose: Transform::IDENTITY,
            constraints: Vec::new(),
        });
        Ok(idx)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bones_mut(&mut self) -> &mut [Bone] {
        &mut self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bone_index(name).map(|i| &self.bones[i])
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        let idx = self.bone_index(name)?;
        Some(&mut self.bones[idx])
    }

    pub fn has_bone(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn is_pose_mode(&self) -> bool {
        self.mode == ArmatureMode::Pose
    }

    /// Total number of constraint links over all bones.
    pub fn constraint_count(&self) -> usize {
        self.bones.iter().map(|b| b.constraints.len()).sum()
    }

    /// Resets every pose basis to identity.
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.pose = Transform::IDENTITY;
        }
    }

    /// World matrices of every bone, given the armature's world matrix.
    pub fn world_transforms(&self, origin: Mat4) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let parent = bone.parent.map_or(origin, |p| world[p]);
            world.push(parent * bone.local_matrix());
        }
        world
    }

    /// Writes the action's values at `frame` into the pose. Channels without a curve
    /// keep their current value.
    pub fn apply_action(&mut self, action: &Action, frame: f32) {
        let mut rotated: Vec<usize> = Vec::new();

        for curve in action.fcurves() {
            let Some((bone, channel)) = parse_bone_data_path(&curve.data_path) else {
                continue;
            };
            let Some(idx) = self.bone_index(bone) else {
                continue;
            };
            let Some(value) = curve.evaluate(frame) else {
                continue;
            };

            let pose = &mut self.bones[idx].pose;
            let i = curve.array_index;
            match channel {
                Channel::Location if i < 3 => pose.translation[i] = value,
                Channel::Scale if i < 3 => pose.scale[i] = value,
                Channel::RotationQuaternion if i < 4 => {
                    let mut wxyz = quat_to_wxyz(pose.rotation);
                    wxyz[i] = value;
                    pose.rotation = quat_from_wxyz(wxyz);
                    rotated.push(idx);
                }
                _ => {}
            }
        }

        for idx in rotated {
            let rotation = &mut self.bones[idx].pose.rotation;
            if rotation.length_squared() > 1e-12 {
                *rotation = rotation.normalize();
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::action::bone_data_path;
    use glam::{Quat, Vec3};

    /// Root -> Hips -> Spine -> Head, plus Hips -> Leg. One unit apart along Y.
    pub(crate) fn humanoid() -> Skeleton {
        let mut sk = Skeleton::new();
        let up = Transform::from_translation(Vec3::Y);
        sk.add_bone("Root", None, Transform::IDENTITY).unwrap();
        sk.add_bone("Hips", Some("Root"), up).unwrap();
        sk.add_bone("Spine", Some("Hips"), up).unwrap();
        sk.add_bone("Head", Some("Spine"), up).unwrap();
        sk.add_bone("Leg", Some("Hips"), Transform::from_translation(-Vec3::Y))
            .unwrap();
        sk
    }

    #[test]
    fn test_add_bone_requires_parent() {
        let mut sk = Skeleton::new();
        assert!(sk.add_bone("Child", Some("Missing"), Transform::IDENTITY).is_err());
        sk.add_bone("Root", None, Transform::IDENTITY).unwrap();
        assert!(sk.add_bone("Root", None, Transform::IDENTITY).is_err());
    }

    #[test]
    fn test_world_transforms_accumulate() {
        let sk = humanoid();
        let world = sk.world_transforms(Mat4::from_translation(Vec3::X));
        let head = world[sk.bone_index("Head").unwrap()];
        assert!(head.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 3.0, 0.0), 1e-6));
        let leg = world[sk.bone_index("Leg").unwrap()];
        assert!(leg.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_apply_action_sets_channels() {
        let mut sk = humanoid();
        let mut action = Action::new("A_Test");
        action
            .ensure(&bone_data_path("Hips", Channel::Location), 2)
            .insert(1.0, 0.5);
        let q = Quat::from_rotation_y(0.5);
        let rot = bone_data_path("Spine", Channel::RotationQuaternion);
        for (i, c) in quat_to_wxyz(q).into_iter().enumerate() {
            action.ensure(&rot, i).insert(1.0, c);
        }
        action
            .ensure(&bone_data_path("Nope", Channel::Location), 0)
            .insert(1.0, 9.0);

        sk.apply_action(&action, 1.0);
        assert_eq!(sk.bone("Hips").unwrap().pose.translation, Vec3::new(0.0, 0.0, 0.5));
        assert!(sk.bone("Spine").unwrap().pose.rotation.abs_diff_eq(q, 1e-6));
        assert_eq!(sk.bone("Head").unwrap().pose, Transform::IDENTITY);
    }
}
