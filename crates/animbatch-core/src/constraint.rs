//! Constraint links and their per-frame solver.
//!
//! A link makes one bone follow a bone of another armature. Links are solved
//! parent-first after actions have been applied, and the solved transform is
//! written back into the bone's pose basis, so reading a bone's pose after
//! [`solve_links`] yields its visual transform.

use std::collections::HashMap;

use animbatch_spec::ConstraintSpace;
use glam::{Mat4, Vec3};

use crate::math::Transform;
use crate::scene::ObjectId;
use crate::skeleton::Skeleton;

/// What a link transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    CopyRotation,
    CopyLocation,
    CopyTransforms,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::CopyRotation => "COPY_ROTATION",
            ConstraintKind::CopyLocation => "COPY_LOCATION",
            ConstraintKind::CopyTransforms => "COPY_TRANSFORMS",
        }
    }

    /// Kinds created by the retargeting rig.
    pub const RIG_KINDS: [ConstraintKind; 3] = [
        ConstraintKind::CopyRotation,
        ConstraintKind::CopyLocation,
        ConstraintKind::CopyTransforms,
    ];
}

/// A live link from the owning bone to `subtarget` on the `target` armature.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintLink {
    pub name: String,
    pub kind: ConstraintKind,
    pub target: ObjectId,
    pub subtarget: String,
    pub space: ConstraintSpace,
    pub influence: f32,
    /// Added to the copied translation. Always a world-space vector.
    pub offset: Vec3,
}

impl ConstraintLink {
    pub fn new(kind: ConstraintKind, target: ObjectId, subtarget: impl Into<String>) -> Self {
        let name = match kind {
            ConstraintKind::CopyRotation => "Copy Rotation",
            ConstraintKind::CopyLocation => "Copy Location",
            ConstraintKind::CopyTransforms => "Copy Transforms",
        };
        Self {
            name: name.to_string(),
            kind,
            target,
            subtarget: subtarget.into(),
            space: ConstraintSpace::World,
            influence: 1.0,
            offset: Vec3::ZERO,
        }
    }

    pub fn with_space(mut self, space: ConstraintSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_influence(mut self, influence: f32) -> Self {
        self.influence = influence.clamp(0.0, 1.0);
        self
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }
}

/// Evaluated state of a link target bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneState {
    pub world: Mat4,
    pub basis: Transform,
}

/// Evaluated bone states of one armature, by bone name.
pub type PoseSnapshot = HashMap<String, BoneState>;

/// Captures the evaluated state of every bone of a skeleton.
pub fn snapshot(skeleton: &Skeleton, origin: Mat4) -> PoseSnapshot {
    let world = skeleton.world_transforms(origin);
    skeleton
        .bones()
        .iter()
        .zip(world)
        .map(|(bone, world)| {
            (
                bone.name.clone(),
                BoneState {
                    world,
                    basis: bone.pose,
                },
            )
        })
        .collect()
}

/// Solves every link on `skeleton` against the given snapshots and writes the
/// results into the pose basis. Returns the number of links evaluated.
///
/// Links whose target is not in `sources` are skipped.
pub fn solve_links(
    skeleton: &mut Skeleton,
    origin: Mat4,
    sources: &HashMap<ObjectId, PoseSnapshot>,
) -> usize {
    let mut solved = 0;
    let mut world: Vec<Mat4> = Vec::with_capacity(skeleton.len());

    for i in 0..skeleton.len() {
        let parent_world = skeleton.bones()[i].parent.map_or(origin, |p| world[p]);
        let bone = &mut skeleton.bones_mut()[i];

        if !bone.constraints.is_empty() {
            let base = parent_world * bone.rest.to_mat4();
            let mut basis = bone.pose;

            for link in &bone.constraints {
                let Some(state) = sources
                    .get(&link.target)
                    .and_then(|snap| snap.get(&link.subtarget))
                else {
                    continue;
                };
                let target_basis = solve_link(link, state, base, basis);
                basis = basis.blend(&target_basis, link.influence);
                solved += 1;
            }
            bone.pose = basis;
        }

        world.push(parent_world * bone.local_matrix());
    }

    solved
}

fn solve_link(link: &ConstraintLink, state: &BoneState, base: Mat4, basis: Transform) -> Transform {
    match link.space {
        ConstraintSpace::World => {
            let source = Transform::from_mat4(state.world);
            let current = Transform::from_mat4(base * basis.to_mat4());
            let desired = match link.kind {
                ConstraintKind::CopyRotation => Transform {
                    rotation: source.rotation,
                    ..current
                },
                ConstraintKind::CopyLocation => Transform {
                    translation: source.translation + link.offset,
                    ..current
                },
                ConstraintKind::CopyTransforms => Transform {
                    translation: source.translation + link.offset,
                    ..source
                },
            };
            Transform::from_mat4(base.inverse() * desired.to_mat4())
        }
        ConstraintSpace::Local => {
            let source = state.basis;
            // The basis is expressed in the bone's rest frame.
            let offset = base.inverse().transform_vector3(link.offset);
            match link.kind {
                ConstraintKind::CopyRotation => Transform {
                    rotation: source.rotation,
                    ..basis
                },
                ConstraintKind::CopyLocation => Transform {
                    translation: source.translation + offset,
                    ..basis
                },
                ConstraintKind::CopyTransforms => Transform {
                    translation: source.translation + offset,
                    ..source
                },
            }
        }
    }
}
