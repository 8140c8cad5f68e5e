//! Importing source clips and exporting packed artifacts.
//!
//! - [`GltfImporter`] reads `.glb`/`.gltf` files with the `gltf` crate.
//! - [`FbxImporter`] converts `.fbx` files to GLB with a headless Blender and then
//!   reads the result like any other GLB.
//! - [`SourceImporter`] picks one of the two by file extension.
//! - [`GlbExporter`] writes skeletons and their animations as a binary glTF.

pub mod blender;
pub mod glb_export;
pub mod gltf_import;

use std::path::{Path, PathBuf};

use crate::action::Action;
use crate::error::{RetargetError, RetargetResult};
use crate::math::Transform;
use crate::skeleton::Skeleton;

pub use blender::{BlenderConverter, FbxImporter};
pub use glb_export::GlbExporter;
pub use gltf_import::GltfImporter;

/// Objects and actions read from one file.
///
/// Parents and action references are indices into the same import result.
#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub objects: Vec<ImportedObject>,
    pub actions: Vec<Action>,
}

/// One imported object. Parents precede their children.
#[derive(Debug, Clone)]
pub struct ImportedObject {
    pub name: String,
    pub parent: Option<usize>,
    pub transform: Transform,
    pub skeleton: Option<Skeleton>,
    pub active_action: Option<usize>,
    /// `(track name, action index)` pairs.
    pub tracks: Vec<(String, usize)>,
}

/// Reads a source file into scene data.
pub trait ClipImporter {
    fn import(&self, path: &Path) -> RetargetResult<ImportedScene>;
}

/// What to write: armatures plus the animations to attach to them.
#[derive(Debug)]
pub struct ExportRequest<'a> {
    pub armatures: Vec<ExportArmature<'a>>,
    pub animations: Vec<ExportAnimation<'a>>,
}

/// An armature to write, with its world transform.
#[derive(Debug)]
pub struct ExportArmature<'a> {
    pub name: &'a str,
    pub origin: Transform,
    pub skeleton: &'a Skeleton,
}

/// One output animation. Each channel pairs an armature index with the action
/// driving it.
#[derive(Debug)]
pub struct ExportAnimation<'a> {
    pub name: String,
    pub channels: Vec<(usize, &'a Action)>,
}

/// Summary of a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub armatures: usize,
    pub bones: usize,
    pub animations: usize,
    pub bytes: usize,
}

/// Writes a request to disk.
pub trait ArtifactExporter {
    fn export(&self, path: &Path, request: &ExportRequest<'_>) -> RetargetResult<ExportSummary>;
}

/// Dispatches to the glTF or FBX importer by file extension.
#[derive(Debug, Clone)]
pub struct SourceImporter {
    gltf: GltfImporter,
    fbx: FbxImporter,
}

impl SourceImporter {
    pub fn new(fps: f32, converter: BlenderConverter) -> Self {
        let gltf = GltfImporter::new(fps);
        Self {
            fbx: FbxImporter::new(converter, gltf.clone()),
            gltf,
        }
    }
}

impl ClipImporter for SourceImporter {
    fn import(&self, path: &Path) -> RetargetResult<ImportedScene> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("glb") | Some("gltf") => self.gltf.import(path),
            Some("fbx") => self.fbx.import(path),
            _ => Err(RetargetError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}
