//! The temporary constraint rig that makes a target skeleton follow a source.
//!
//! [`build`] links every shared bone with a rotation and a location link;
//! [`teardown`] removes every link of a rig kind, whoever created it.
//! [`RigGuard`] ties the two together so a failed bake can never leave links
//! behind.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use animbatch_spec::{ConstraintSpace, RigConfig};
use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::constraint::{ConstraintKind, ConstraintLink};
use crate::error::RetargetResult;
use crate::offsets::BoneOffsets;
use crate::scene::{ObjectId, SceneHost};
use crate::skeleton::Skeleton;

/// How links are created.
#[derive(Debug, Clone, PartialEq)]
pub struct RigOptions {
    /// Bones whose location link carries the bone offset. Case-insensitive.
    pub anchors: Vec<String>,
    pub space: ConstraintSpace,
    pub influence: f32,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self::from_config(&RigConfig::default())
    }
}

impl RigOptions {
    pub fn from_config(config: &RigConfig) -> Self {
        Self {
            anchors: config.anchor_bones.clone(),
            space: config.space,
            influence: config.influence,
        }
    }

    fn is_anchor(&self, bone: &str) -> bool {
        self.anchors.iter().any(|a| a.eq_ignore_ascii_case(bone))
    }
}

/// Which bones were linked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RigReport {
    pub linked: Vec<String>,
    pub missing_in_target: Vec<String>,
    pub missing_in_source: Vec<String>,
}

/// Links every bone `source` and `target` have in common.
///
/// Any rig links already on the target are removed first, so building twice
/// yields the same rig.
pub fn build<H: SceneHost + ?Sized>(
    host: &mut H,
    source: ObjectId,
    target: ObjectId,
    offsets: &BoneOffsets,
    options: &RigOptions,
) -> RetargetResult<RigReport> {
    let source_bones: Vec<String> = host
        .armature(source)?
        .bones()
        .iter()
        .map(|b| b.name.clone())
        .collect();
    // Target-minus-source rest translation, already implied by a local basis.
    let rest_delta: HashMap<String, Vec3> = match options.space {
        ConstraintSpace::World => HashMap::new(),
        ConstraintSpace::Local => {
            let source_rest = rest_translations(host.armature(source)?, host.object_world(source));
            let target_rest = rest_translations(host.armature(target)?, host.object_world(target));
            target_rest
                .into_iter()
                .filter_map(|(name, t)| {
                    let s = source_rest.get(&name)?;
                    Some((name, t - *s))
                })
                .collect()
        }
    };
    let source_name = host.object_name(source);
    let target_name = host.object_name(target);
    let skeleton = host.armature_mut(target)?;
    teardown(skeleton);

    let mut report = RigReport::default();
    for name in &source_bones {
        let Some(bone) = skeleton.bone_mut(name) else {
            report.missing_in_target.push(name.clone());
            continue;
        };

        let rotation = ConstraintLink::new(ConstraintKind::CopyRotation, source, name)
            .with_space(options.space)
            .with_influence(options.influence);
        let mut location = ConstraintLink::new(ConstraintKind::CopyLocation, source, name)
            .with_space(options.space)
            .with_influence(options.influence);
        if options.is_anchor(name) {
            if let Some(offset) = offsets.get(name) {
                let carried = rest_delta.get(name).copied().unwrap_or(Vec3::ZERO);
                location = location.with_offset(offset - carried);
            }
        }
        bone.constraints.push(rotation);
        bone.constraints.push(location);
        report.linked.push(name.clone());
    }

    report.missing_in_source = skeleton
        .bones()
        .iter()
        .filter(|b| !source_bones.contains(&b.name))
        .map(|b| b.name.clone())
        .collect();

    if !report.missing_in_target.is_empty() {
        warn!(
            "'{}' has {} bone(s) not on '{}': {}",
            source_name,
            report.missing_in_target.len(),
            target_name,
            report.missing_in_target.join(", ")
        );
    }
    if !report.missing_in_source.is_empty() {
        debug!(
            "'{}' bones without a source: {}",
            target_name,
            report.missing_in_source.join(", ")
        );
    }
    debug!(
        "rigged {} bone(s) from '{}' to '{}'",
        report.linked.len(),
        source_name,
        target_name
    );
    Ok(report)
}

/// World translation of every bone with the pose cleared.
fn rest_translations(skeleton: &Skeleton, origin: Mat4) -> HashMap<String, Vec3> {
    let mut rest = skeleton.clone();
    rest.reset_pose();
    rest.world_transforms(origin)
        .into_iter()
        .zip(rest.bones())
        .map(|(world, bone)| (bone.name.clone(), world.w_axis.truncate()))
        .collect()
}

/// Removes every rig link from the skeleton. Returns the number removed.
pub fn teardown(skeleton: &mut Skeleton) -> usize {
    let mut removed = 0;
    for bone in skeleton.bones_mut() {
        let before = bone.constraints.len();
        bone.constraints
            .retain(|c| !ConstraintKind::RIG_KINDS.contains(&c.kind));
        removed += before - bone.constraints.len();
    }
    removed
}

/// A built rig on the host. Dropping the guard tears the rig down.
pub struct RigGuard<'h, H: SceneHost + ?Sized> {
    host: &'h mut H,
    target: ObjectId,
    report: RigReport,
}

impl<'h, H: SceneHost + ?Sized> RigGuard<'h, H> {
    /// Builds the rig and returns a guard over it.
    pub fn build(
        host: &'h mut H,
        source: ObjectId,
        target: ObjectId,
        offsets: &BoneOffsets,
        options: &RigOptions,
    ) -> RetargetResult<Self> {
        let report = build(host, source, target, offsets, options)?;
        Ok(Self {
            host,
            target,
            report,
        })
    }

    pub fn report(&self) -> &RigReport {
        &self.report
    }

    /// Tears the rig down now and returns the report.
    pub fn release(mut self) -> RigReport {
        self.teardown();
        std::mem::take(&mut self.report)
    }

    fn teardown(&mut self) {
        if let Ok(skeleton) = self.host.armature_mut(self.target) {
            let removed = teardown(skeleton);
            if removed > 0 {
                debug!("removed {} rig link(s)", removed);
            }
        }
    }
}

impl<H: SceneHost + ?Sized> Deref for RigGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: SceneHost + ?Sized> DerefMut for RigGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: SceneHost + ?Sized> Drop for RigGuard<'_, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
