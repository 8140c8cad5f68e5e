//! animbatch retargeting core
//!
//! This crate moves animation clips from source skeletons onto one target
//! skeleton and packs them into GLB files, one file per export group.
//!
//! # Pipeline
//!
//! For every source clip:
//!
//! 1. **Offsets** - world translation differences between shared bones ([`offsets`])
//! 2. **Rig** - temporary copy-rotation/copy-location links from target to source ([`rig`])
//! 3. **Bake** - step every frame and key the evaluated pose ([`bake`])
//! 4. **Teardown** - remove the links; [`rig::RigGuard`] does this even on failure
//! 5. **Fixups** - rotate configured quaternion curves ([`fixup`])
//! 6. **Classify** - decide looping from metadata, export set or name ([`classify`])
//! 7. **Pack** - store the action as a locked, muted track ([`tracks`])
//!
//! Each group then exports its packed tracks as `<group>.glb`.
//!
//! # Host
//!
//! The pipeline talks to a scene through the [`SceneHost`] trait. [`MemoryScene`]
//! is a self-contained implementation that evaluates actions and constraint links
//! itself, imports glTF directly and FBX through a headless Blender ([`io`]).
//!
//! # Example
//!
//! ```ignore
//! use animbatch_core::{default_scene, run_batch};
//! use animbatch_spec::BatchConfig;
//!
//! let config = BatchConfig::from_file(Path::new("batch.json"))?;
//! let mut scene = default_scene(&config);
//! let report = run_batch(config, &mut scene)?;
//! println!("{} clip(s), {} failed", report.total_clips(), report.failed_clips());
//! ```

pub mod action;
pub mod bake;
pub mod classify;
pub mod constraint;
pub mod discovery;
pub mod error;
pub mod fixup;
pub mod grouping;
pub mod io;
pub mod math;
pub mod metadata;
pub mod offsets;
pub mod pipeline;
pub mod rig;
pub mod scene;
pub mod skeleton;
pub mod tracks;

pub use action::{Action, ActionId, Channel, FCurve, Interpolation, Keyframe};
pub use classify::{resolve_loop, LoopClassifier, LoopDecision};
pub use discovery::{discover, AnimFileEntry, DiscoveryFilter};
pub use error::{RetargetError, RetargetResult};
pub use grouping::ExportGroup;
pub use metadata::{AnimFileEntryMetadata, MetadataTable};
pub use pipeline::{run_batch, Pipeline};
pub use scene::{MemoryScene, ObjectId, SceneHost, SceneObject};
pub use skeleton::{ArmatureMode, Bone, Skeleton};

use animbatch_spec::BatchConfig;

/// An in-memory scene wired with the file importers and the GLB exporter for
/// `config`.
pub fn default_scene(config: &BatchConfig) -> MemoryScene {
    let converter = io::BlenderConverter::from_config(&config.blender);
    MemoryScene::new()
        .with_importer(io::SourceImporter::new(config.export.fps, converter))
        .with_exporter(io::GlbExporter::new(config.export.fps))
}
