//! Per-bone translation offsets between a source and the target armature.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use crate::skeleton::Skeleton;

/// Target-minus-source world translation of every bone both armatures share,
/// taken in the current pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneOffsets(BTreeMap<String, Vec3>);

impl BoneOffsets {
    pub fn get(&self, bone: &str) -> Option<Vec3> {
        self.0.get(bone).copied()
    }

    /// Case-insensitive lookup.
    pub fn get_ignore_case(&self, bone: &str) -> Option<Vec3> {
        self.get(bone).or_else(|| {
            self.0
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(bone))
                .map(|(_, v)| *v)
        })
    }

    /// Sets or replaces the offset of one bone.
    pub fn insert(&mut self, bone: impl Into<String>, offset: Vec3) {
        self.0.insert(bone.into(), offset);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec3)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Computes offsets for every bone name present in both skeletons.
pub fn compute_bone_offsets(
    source: &Skeleton,
    source_origin: Mat4,
    target: &Skeleton,
    target_origin: Mat4,
) -> BoneOffsets {
    let source_world = source.world_transforms(source_origin);
    let target_world = target.world_transforms(target_origin);

    let offsets = target
        .bones()
        .iter()
        .enumerate()
        .filter_map(|(ti, bone)| {
            let si = source.bone_index(&bone.name)?;
            let delta = target_world[ti].w_axis.truncate() - source_world[si].w_axis.truncate();
            Some((bone.name.clone(), delta))
        })
        .collect();
    BoneOffsets(offsets)
}
