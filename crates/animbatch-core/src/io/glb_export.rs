//! Binary glTF (GLB) export of skeletons and their animations.
//!
//! Each armature becomes a node with one child node per bone and a skin over
//! those bones. Animations are resampled at every whole frame of the union of
//! their channels' ranges and stored as LINEAR samplers.

use std::fs;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use gltf::json::accessor::{ComponentType, GenericComponentType, Type};
use gltf::json::animation::{Interpolation, Property};
use gltf::json::scene::UnitQuaternion;
use gltf::json::validation::{Checked::Valid, USize64};
use gltf::json::{self, Index};
use log::{debug, warn};

use super::{ArtifactExporter, ExportRequest, ExportSummary};
use crate::action::{parse_bone_data_path, Action, Channel};
use crate::error::{RetargetError, RetargetResult};
use crate::math::{align_hemisphere, Transform};
use crate::skeleton::Skeleton;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const JSON_CHUNK_TYPE: u32 = 0x4E4F534A; // "JSON"
const BIN_CHUNK_TYPE: u32 = 0x004E4942; // "BIN\0"

/// Writes [`ExportRequest`]s as `.glb` files.
#[derive(Debug, Clone)]
pub struct GlbExporter {
    fps: f32,
    generator: String,
}

impl GlbExporter {
    pub fn new(fps: f32) -> Self {
        Self {
            fps,
            generator: format!("animbatch {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Builds the GLB bytes for a request.
    pub fn encode(&self, request: &ExportRequest<'_>) -> Result<(Vec<u8>, ExportSummary), json::Error> {
        let mut doc = DocumentBuilder::new(&self.generator);
        let mut scene_nodes: Vec<Index<json::Node>> = Vec::new();
        // Per armature: glTF node of each bone.
        let mut bone_nodes: Vec<Vec<Index<json::Node>>> = Vec::new();
        let mut bone_total = 0;

        for armature in &request.armatures {
            let skeleton = armature.skeleton;
            let armature_node = doc.root.push(node(armature.name, &armature.origin));
            scene_nodes.push(armature_node);

            let indices: Vec<Index<json::Node>> = skeleton
                .bones()
                .iter()
                .map(|bone| doc.root.push(node(&bone.name, &bone.rest)))
                .collect();
            let mut roots: Vec<Index<json::Node>> = Vec::new();
            let mut children: Vec<Vec<Index<json::Node>>> = vec![Vec::new(); skeleton.len()];
            for (i, bone) in skeleton.bones().iter().enumerate() {
                match bone.parent {
                    Some(p) => children[p].push(indices[i]),
                    None => roots.push(indices[i]),
                }
            }
            for (i, kids) in children.into_iter().enumerate() {
                if !kids.is_empty() {
                    doc.root.nodes[indices[i].value()].children = Some(kids);
                }
            }
            if !roots.is_empty() {
                doc.root.nodes[armature_node.value()].children = Some(roots);
            }

            if !skeleton.is_empty() {
                // Bind matrices live in armature space.
                let inverse_binds: Vec<f32> = rest_world(skeleton)
                    .iter()
                    .flat_map(|m| m.inverse().to_cols_array())
                    .collect();
                let accessor = doc.push_floats(&inverse_binds, Type::Mat4, skeleton.len(), None);
                doc.root.push(json::Skin {
                    extensions: Default::default(),
                    extras: Default::default(),
                    inverse_bind_matrices: Some(accessor),
                    joints: indices.clone(),
                    name: Some(armature.name.to_string()),
                    skeleton: indices.first().copied().or(Some(armature_node)),
                });
            }

            bone_total += skeleton.len();
            bone_nodes.push(indices);
        }

        let mut animation_count = 0;
        for animation in &request.animations {
            let Some((start, end)) = union_range(animation.channels.iter().map(|(_, a)| *a)) else {
                warn!("animation '{}' has no keys; skipped", animation.name);
                continue;
            };
            let frames: Vec<f32> = (start..=end).map(|f| f as f32).collect();
            let times: Vec<f32> = frames.iter().map(|f| (f - start as f32) / self.fps).collect();
            let time_min = times.first().copied().unwrap_or(0.0);
            let time_max = times.last().copied().unwrap_or(0.0);
            let input = doc.push_floats(
                &times,
                Type::Scalar,
                times.len(),
                Some((vec![time_min], vec![time_max])),
            );

            let mut builder = AnimationBuilder::new(input);
            for &(arm_index, action) in &animation.channels {
                let Some(armature) = request.armatures.get(arm_index) else {
                    continue;
                };
                let samples = sample_action(armature.skeleton, action, &frames);
                for (bone_index, track) in samples {
                    let node = bone_nodes[arm_index][bone_index];

                    let translations: Vec<f32> =
                        track.iter().flat_map(|t| t.translation.to_array()).collect();
                    let output = doc.push_floats(&translations, Type::Vec3, track.len(), None);
                    builder.channel(output, node, Property::Translation);

                    let mut previous = Quat::IDENTITY;
                    let rotations: Vec<f32> = track
                        .iter()
                        .flat_map(|t| {
                            previous = align_hemisphere(previous, t.rotation);
                            previous.to_array()
                        })
                        .collect();
                    let output = doc.push_floats(&rotations, Type::Vec4, track.len(), None);
                    builder.channel(output, node, Property::Rotation);

                    let bone_name = &armature.skeleton.bones()[bone_index].name;
                    if has_channel(action, bone_name, Channel::Scale) {
                        let scales: Vec<f32> = track.iter().flat_map(|t| t.scale.to_array()).collect();
                        let output = doc.push_floats(&scales, Type::Vec3, track.len(), None);
                        builder.channel(output, node, Property::Scale);
                    }
                }
            }

            if builder.channels.is_empty() {
                warn!("animation '{}' drives no exported bone; skipped", animation.name);
                continue;
            }
            doc.root.push(builder.finish(&animation.name));
            animation_count += 1;
        }

        let json_bytes = doc.finish(scene_nodes)?;
        let glb = write_glb(&json_bytes, &doc.bin);

        let summary = ExportSummary {
            path: Default::default(),
            armatures: request.armatures.len(),
            bones: bone_total,
            animations: animation_count,
            bytes: glb.len(),
        };
        Ok((glb, summary))
    }
}

impl Default for GlbExporter {
    fn default() -> Self {
        Self::new(30.0)
    }
}

impl ArtifactExporter for GlbExporter {
    fn export(&self, path: &Path, request: &ExportRequest<'_>) -> RetargetResult<ExportSummary> {
        let (glb, mut summary) = self
            .encode(request)
            .map_err(|e| RetargetError::export_failed(path, e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| RetargetError::export_failed(path, e.to_string()))?;
        }
        fs::write(path, &glb).map_err(|e| RetargetError::export_failed(path, e.to_string()))?;

        summary.path = path.to_path_buf();
        debug!(
            "wrote {} ({} bytes, {} animation(s))",
            path.display(),
            summary.bytes,
            summary.animations
        );
        Ok(summary)
    }
}

// =============================================================================
// Document assembly
// =============================================================================

/// The glTF root plus the binary chunk its accessors point into.
struct DocumentBuilder {
    root: json::Root,
    bin: Vec<u8>,
}

impl DocumentBuilder {
    fn new(generator: &str) -> Self {
        let root = json::Root {
            asset: json::Asset {
                generator: Some(generator.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            root,
            bin: Vec::new(),
        }
    }

    /// Appends float data as its own buffer view and accessor.
    fn push_floats(
        &mut self,
        data: &[f32],
        type_: Type,
        count: usize,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> Index<json::Accessor> {
        let offset = self.bin.len();
        for value in data {
            self.bin.extend_from_slice(&value.to_le_bytes());
        }
        let view = self.root.push(json::buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(data.len() * 4),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            name: None,
            target: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        let (min, max) = match bounds {
            Some((min, max)) => (Some(json::Value::from(min)), Some(json::Value::from(max))),
            None => (None, None),
        };
        self.root.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: None,
            count: USize64::from(count),
            component_type: Valid(GenericComponentType(ComponentType::F32)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        })
    }

    /// Adds the scene and the buffer, then serializes the JSON chunk.
    fn finish(&mut self, scene_nodes: Vec<Index<json::Node>>) -> Result<Vec<u8>, json::Error> {
        let scene = self.root.push(json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            nodes: scene_nodes,
        });
        self.root.scene = Some(scene);
        if !self.bin.is_empty() {
            self.root.push(json::Buffer {
                byte_length: USize64::from(self.bin.len()),
                name: None,
                uri: None,
                extensions: Default::default(),
                extras: Default::default(),
            });
        }
        self.root.to_vec()
    }
}

/// Samplers and channels of one animation, sharing one time accessor.
struct AnimationBuilder {
    input: Index<json::Accessor>,
    samplers: Vec<json::animation::Sampler>,
    channels: Vec<json::animation::Channel>,
}

impl AnimationBuilder {
    fn new(input: Index<json::Accessor>) -> Self {
        Self {
            input,
            samplers: Vec::new(),
            channels: Vec::new(),
        }
    }

    fn channel(&mut self, output: Index<json::Accessor>, node: Index<json::Node>, path: Property) {
        let sampler = Index::push(
            &mut self.samplers,
            json::animation::Sampler {
                extensions: Default::default(),
                extras: Default::default(),
                input: self.input,
                interpolation: Valid(Interpolation::Linear),
                output,
            },
        );
        self.channels.push(json::animation::Channel {
            sampler,
            target: json::animation::Target {
                extensions: Default::default(),
                extras: Default::default(),
                node,
                path: Valid(path),
            },
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    fn finish(self, name: &str) -> json::Animation {
        json::Animation {
            extensions: Default::default(),
            extras: Default::default(),
            channels: self.channels,
            name: Some(name.to_string()),
            samplers: self.samplers,
        }
    }
}

fn node(name: &str, transform: &Transform) -> json::Node {
    json::Node {
        name: Some(name.to_string()),
        translation: (transform.translation != Vec3::ZERO).then(|| transform.translation.to_array()),
        rotation: (transform.rotation != Quat::IDENTITY)
            .then(|| UnitQuaternion(transform.rotation.normalize().to_array())),
        scale: (transform.scale != Vec3::ONE).then(|| transform.scale.to_array()),
        ..Default::default()
    }
}

/// Rest matrices of every bone in armature space.
fn rest_world(skeleton: &Skeleton) -> Vec<Mat4> {
    let mut world: Vec<Mat4> = Vec::with_capacity(skeleton.len());
    for bone in skeleton.bones() {
        let parent = bone.parent.map_or(Mat4::IDENTITY, |p| world[p]);
        world.push(parent * bone.rest.to_mat4());
    }
    world
}

/// Whole-frame range covering every key of every action.
fn union_range<'a>(actions: impl Iterator<Item = &'a Action>) -> Option<(i32, i32)> {
    actions
        .filter_map(Action::frame_range)
        .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
        .map(|(lo, hi)| (lo.floor() as i32, hi.ceil() as i32))
}

fn has_channel(action: &Action, bone: &str, channel: Channel) -> bool {
    action
        .fcurves()
        .iter()
        .filter_map(|c| parse_bone_data_path(&c.data_path))
        .any(|(b, ch)| b == bone && ch == channel)
}

/// Samples the local transform of each animated bone at each frame.
fn sample_action(skeleton: &Skeleton, action: &Action, frames: &[f32]) -> Vec<(usize, Vec<Transform>)> {
    let mut animated: Vec<usize> = action
        .bone_names()
        .iter()
        .filter_map(|name| skeleton.bone_index(name))
        .collect();
    animated.sort_unstable();
    if animated.is_empty() {
        return Vec::new();
    }

    let mut posed = skeleton.clone();
    let mut tracks: Vec<Vec<Transform>> = vec![Vec::with_capacity(frames.len()); animated.len()];
    for &frame in frames {
        posed.reset_pose();
        posed.apply_action(action, frame);
        for (slot, &bone) in animated.iter().enumerate() {
            tracks[slot].push(Transform::from_mat4(posed.bones()[bone].local_matrix()));
        }
    }
    animated.into_iter().zip(tracks).collect()
}

/// Wraps a JSON document and binary payload in a GLB container.
pub fn write_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padded = (json.len() + 3) & !3;
    let bin_padded = (bin.len() + 3) & !3;
    let mut total = 12 + 8 + json_padded;
    if !bin.is_empty() {
        total += 8 + bin_padded;
    }

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());

    glb.extend_from_slice(&(json_padded as u32).to_le_bytes());
    glb.extend_from_slice(&JSON_CHUNK_TYPE.to_le_bytes());
    glb.extend_from_slice(json);
    glb.resize(glb.len() + json_padded - json.len(), b' ');

    if !bin.is_empty() {
        glb.extend_from_slice(&(bin_padded as u32).to_le_bytes());
        glb.extend_from_slice(&BIN_CHUNK_TYPE.to_le_bytes());
        glb.extend_from_slice(bin);
        glb.resize(glb.len() + bin_padded - bin.len(), 0);
    }
    glb
}
