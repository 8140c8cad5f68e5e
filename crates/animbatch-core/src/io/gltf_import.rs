//! glTF/GLB import.
//!
//! Every skin becomes an armature. The skin's joints become bones, the node
//! holding the joint roots becomes the armature object, and every glTF
//! animation touching the joints becomes an action. Node transforms of joints are
//! the rest pose; animation samples are stored as pose bases on top of it.

use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Quat, Vec2, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation as GltfInterpolation, Property};
use log::{debug, warn};

use super::{ClipImporter, ImportedObject, ImportedScene};
use crate::action::{bone_data_path, Action, Channel, FCurve, Interpolation, Keyframe};
use crate::error::{RetargetError, RetargetResult};
use crate::math::{align_hemisphere, quat_to_wxyz, Transform};
use crate::scene::unique_name;
use crate::skeleton::Skeleton;

/// Sample times snap to whole frames within this tolerance.
const FRAME_SNAP: f32 = 1e-3;

/// Imports `.glb` and `.gltf` files.
#[derive(Debug, Clone)]
pub struct GltfImporter {
    fps: f32,
}

impl GltfImporter {
    /// Creates an importer converting seconds to frames at `fps`.
    pub fn new(fps: f32) -> Self {
        Self { fps }
    }
}

impl Default for GltfImporter {
    fn default() -> Self {
        Self::new(30.0)
    }
}

/// A skin's joints arranged as a skeleton.
struct SkinRig {
    skeleton: Skeleton,
    /// glTF node index -> bone name.
    bones: HashMap<usize, String>,
    /// Node holding the joint roots, if it is not itself a joint.
    armature_node: Option<usize>,
    name: String,
    object: usize,
}

impl ClipImporter for GltfImporter {
    fn import(&self, path: &Path) -> RetargetResult<ImportedScene> {
        let (doc, buffers, _images) = gltf::import(path)
            .map_err(|e| RetargetError::import_failed(path, e.to_string()))?;

        let node_count = doc.nodes().len();
        let mut parent: Vec<Option<usize>> = vec![None; node_count];
        for node in doc.nodes() {
            for child in node.children() {
                parent[child.index()] = Some(node.index());
            }
        }
        let nodes: Vec<gltf::Node> = doc.nodes().collect();
        let node_name = |i: usize| {
            nodes[i]
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Node_{}", i))
        };

        // ===== Skins =====
        let mut joint_skin: HashMap<usize, usize> = HashMap::new();
        let mut rigs: Vec<SkinRig> = Vec::new();
        for skin in doc.skins() {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            if joints.iter().any(|j| joint_skin.contains_key(j)) {
                warn!("{}: skin {} shares joints with another skin; skipped", path.display(), skin.index());
                continue;
            }
            for &j in &joints {
                joint_skin.insert(j, rigs.len());
            }

            let roots: Vec<usize> = joints
                .iter()
                .copied()
                .filter(|j| parent[*j].map_or(true, |p| !joints.contains(&p)))
                .collect();
            let armature_node = roots.first().and_then(|r| parent[*r]);

            let mut skeleton = Skeleton::new();
            let mut bones: HashMap<usize, String> = HashMap::new();
            let mut stack: Vec<(usize, Option<String>)> =
                roots.iter().rev().map(|r| (*r, None)).collect();
            while let Some((node, parent_bone)) = stack.pop() {
                let name = unique_name(&node_name(node), |n| skeleton.has_bone(n));
                skeleton.add_bone(&name, parent_bone.as_deref(), decompose(&nodes[node]))?;
                bones.insert(node, name.clone());
                let children: Vec<usize> = nodes[node]
                    .children()
                    .map(|c| c.index())
                    .filter(|c| joints.contains(c))
                    .collect();
                for child in children.into_iter().rev() {
                    stack.push((child, Some(name.clone())));
                }
            }

            let name = armature_node
                .map(node_name)
                .or_else(|| skin.name().map(str::to_string))
                .unwrap_or_else(|| "Armature".to_string());
            rigs.push(SkinRig {
                skeleton,
                bones,
                armature_node,
                name,
                object: usize::MAX,
            });
        }

        // ===== Objects =====
        let mut objects: Vec<ImportedObject> = Vec::new();
        let mut node_object: HashMap<usize, usize> = HashMap::new();
        let armature_of_node: HashMap<usize, usize> = rigs
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.armature_node.map(|n| (n, i)))
            .collect();

        for rig in rigs.iter_mut().filter(|r| r.armature_node.is_none()) {
            rig.object = objects.len();
            objects.push(ImportedObject {
                name: rig.name.clone(),
                parent: None,
                transform: Transform::IDENTITY,
                skeleton: Some(rig.skeleton.clone()),
                active_action: None,
                tracks: Vec::new(),
            });
        }

        let roots: Vec<usize> = match doc.default_scene().or_else(|| doc.scenes().next()) {
            Some(scene) => scene.nodes().map(|n| n.index()).collect(),
            None => (0..node_count).filter(|i| parent[*i].is_none()).collect(),
        };
        let mut stack: Vec<(usize, Option<usize>)> = roots.iter().rev().map(|r| (*r, None)).collect();
        while let Some((node, parent_object)) = stack.pop() {
            let this_object = if let Some(&skin) = joint_skin.get(&node) {
                // Joints live inside their armature; non-joint children hang off it.
                Some(rigs[skin].object).filter(|o| *o != usize::MAX)
            } else {
                let index = objects.len();
                let skin_parent = nodes[node]
                    .skin()
                    .and_then(|s| joint_skin.get(&s.joints().next()?.index()).copied())
                    .map(|rig| rigs[rig].object)
                    .filter(|o| *o < index && parent_object.is_none());
                let mut object = ImportedObject {
                    name: node_name(node),
                    parent: parent_object.or(skin_parent),
                    transform: decompose(&nodes[node]),
                    skeleton: None,
                    active_action: None,
                    tracks: Vec::new(),
                };
                if let Some(&rig) = armature_of_node.get(&node) {
                    object.skeleton = Some(rigs[rig].skeleton.clone());
                    rigs[rig].object = index;
                }
                node_object.insert(node, index);
                objects.push(object);
                Some(index)
            };

            for child in nodes[node].children().collect::<Vec<_>>().into_iter().rev() {
                stack.push((child.index(), this_object.or(parent_object)));
            }
        }

        // ===== Animations =====
        let mut actions: Vec<Action> = Vec::new();
        for animation in doc.animations() {
            let anim_name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Animation_{}", animation.index()));
            let mut per_rig: HashMap<usize, Action> = HashMap::new();

            for channel in animation.channels() {
                let node = channel.target().node().index();
                let Some(&rig_index) = joint_skin.get(&node) else {
                    continue;
                };
                let rig = &rigs[rig_index];
                let Some(bone_name) = rig.bones.get(&node) else {
                    continue;
                };
                let Some(bone) = rig.skeleton.bone(bone_name) else {
                    continue;
                };
                let rest = bone.rest;

                let reader = channel.reader(|b| buffers.get(b.index()).map(|bb| bb.0.as_slice()));
                let Some(inputs) = reader.read_inputs() else {
                    continue;
                };
                let frames: Vec<f32> = inputs.map(|t| self.time_to_frame(t)).collect();
                let Some(outputs) = reader.read_outputs() else {
                    continue;
                };

                let interpolation = channel.sampler().interpolation();
                let cubic = interpolation == GltfInterpolation::CubicSpline;
                let key_interp = match interpolation {
                    GltfInterpolation::Step => Interpolation::Constant,
                    GltfInterpolation::Linear => Interpolation::Linear,
                    GltfInterpolation::CubicSpline => Interpolation::Bezier,
                };

                let action = per_rig
                    .entry(rig_index)
                    .or_insert_with(|| Action::new(anim_name.clone()));

                match (channel.target().property(), outputs) {
                    (Property::Translation, ReadOutputs::Translations(it)) => {
                        let values: Vec<Vec3> = keep_values(it.map(Vec3::from), cubic);
                        let inv_rot = rest.rotation.inverse();
                        let basis: Vec<[f32; 3]> = values
                            .iter()
                            .map(|t| (inv_rot * (*t - rest.translation) / rest.scale).to_array())
                            .collect();
                        write_curves(action, bone_name, Channel::Location, &frames, &basis, key_interp);
                    }
                    (Property::Rotation, ReadOutputs::Rotations(it)) => {
                        let values: Vec<Quat> = keep_values(
                            it.into_f32().map(|v| Quat::from_xyzw(v[0], v[1], v[2], v[3]).normalize()),
                            cubic,
                        );
                        let inv_rot = rest.rotation.inverse();
                        let mut previous = Quat::IDENTITY;
                        let basis: Vec<[f32; 4]> = values
                            .iter()
                            .map(|q| {
                                let b = align_hemisphere(previous, (inv_rot * *q).normalize());
                                previous = b;
                                quat_to_wxyz(b)
                            })
                            .collect();
                        write_curves(
                            action,
                            bone_name,
                            Channel::RotationQuaternion,
                            &frames,
                            &basis,
                            key_interp,
                        );
                    }
                    (Property::Scale, ReadOutputs::Scales(it)) => {
                        let values: Vec<Vec3> = keep_values(it.map(Vec3::from), cubic);
                        let basis: Vec<[f32; 3]> =
                            values.iter().map(|s| (*s / rest.scale).to_array()).collect();
                        write_curves(action, bone_name, Channel::Scale, &frames, &basis, key_interp);
                    }
                    _ => {}
                }
            }

            let mut touched: Vec<(usize, Action)> = per_rig.into_iter().collect();
            touched.sort_by_key(|(rig, _)| *rig);
            for (rig_index, action) in touched {
                let object_index = rigs[rig_index].object;
                let Some(object) = objects.get_mut(object_index) else {
                    continue;
                };
                let action_index = actions.len();
                if object.active_action.is_none() {
                    object.active_action = Some(action_index);
                } else {
                    object.tracks.push((action.name.clone(), action_index));
                }
                actions.push(action);
            }
        }

        debug!(
            "{}: {} object(s), {} armature(s), {} action(s)",
            path.display(),
            objects.len(),
            rigs.len(),
            actions.len()
        );
        Ok(ImportedScene { objects, actions })
    }
}

impl GltfImporter {
    fn time_to_frame(&self, seconds: f32) -> f32 {
        let frame = seconds * self.fps;
        let rounded = frame.round();
        if (frame - rounded).abs() <= FRAME_SNAP {
            rounded
        } else {
            frame
        }
    }
}

/// Drops in/out tangents of cubic-spline outputs.
fn keep_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}

fn write_curves<const N: usize>(
    action: &mut Action,
    bone: &str,
    channel: Channel,
    frames: &[f32],
    values: &[[f32; N]],
    interpolation: Interpolation,
) {
    let path = bone_data_path(bone, channel);
    for index in 0..N {
        let mut curve = FCurve::new(&path, index);
        for (frame, value) in frames.iter().zip(values) {
            let repeated = curve
                .keyframes()
                .last()
                .is_some_and(|last| last.frame() >= *frame - 1e-4);
            if repeated {
                // Duplicate sample times keep the later value.
                if let Some(last) = curve.keyframes_mut().last_mut() {
                    last.co = Vec2::new(last.co.x, value[index]);
                }
                continue;
            }
            let mut key = Keyframe::new(*frame, value[index]);
            key.interpolation = interpolation;
            curve.push(key);
        }
        curve.recalculate_handles();
        action.add_fcurve(curve);
    }
}

fn decompose(node: &gltf::Node) -> Transform {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            Transform::from_mat4(Mat4::from_cols_array_2d(&matrix))
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Transform::new(
            Vec3::from(translation),
            Quat::from_array(rotation).normalize(),
            Vec3::from(scale),
        ),
    }
}
