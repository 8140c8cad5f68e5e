//! The scene host: objects, the action library, and the playback cursor.
//!
//! Pipeline stages never reach for global state. Everything they need from the
//! host application goes through [`SceneHost`], and [`MemoryScene`] is the
//! in-process implementation used by the batch runner and the tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use animbatch_spec::ExportMode;
use glam::Mat4;
use log::{debug, trace};

use crate::action::{Action, ActionId};
use crate::constraint::{snapshot, solve_links, PoseSnapshot};
use crate::error::{RetargetError, RetargetResult};
use crate::io::{
    ArtifactExporter, ClipImporter, ExportAnimation, ExportArmature, ExportRequest, ExportSummary,
    ImportedScene,
};
use crate::math::Transform;
use crate::skeleton::Skeleton;
use crate::tracks::{AnimStrip, AnimTrack};

/// Handle to a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OB{}", self.0)
    }
}

/// Object payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Armature(Skeleton),
    Empty,
}

/// An object in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub parent: Option<ObjectId>,
    /// Transform relative to the parent object (or the world).
    pub transform: Transform,
    pub data: ObjectData,
}

impl SceneObject {
    pub fn armature(name: impl Into<String>, skeleton: Skeleton) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform: Transform::IDENTITY,
            data: ObjectData::Armature(skeleton),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform: Transform::IDENTITY,
            data: ObjectData::Empty,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        match self.data {
            ObjectData::Armature(ref sk) => Some(sk),
            ObjectData::Empty => None,
        }
    }

    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        match self.data {
            ObjectData::Armature(ref mut sk) => Some(sk),
            ObjectData::Empty => None,
        }
    }

    pub fn is_armature(&self) -> bool {
        matches!(self.data, ObjectData::Armature(_))
    }
}

/// Returns `base`, or `base.001`, `base.002`, ... whichever is free first.
pub fn unique_name(base: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}.{:03}", base, n))
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| base.to_string())
}

// =============================================================================
// Host interface
// =============================================================================

/// Capabilities the pipeline needs from a 3D scene.
pub trait SceneHost {
    /// Imports a source clip file, adding its objects and actions to the scene.
    /// Returns the number of objects added.
    fn import_clip(&mut self, path: &Path) -> RetargetResult<usize>;

    /// Writes the given objects and their animations to `path`.
    fn export_artifact(
        &mut self,
        path: &Path,
        objects: &[ObjectId],
        mode: ExportMode,
    ) -> RetargetResult<ExportSummary>;

    /// Moves the playback cursor, re-evaluating actions and constraints.
    fn set_frame(&mut self, frame: i32);

    /// Current playback frame.
    fn current_frame(&self) -> i32;

    /// Removes data blocks nothing refers to. Returns how many were removed.
    fn purge_unused(&mut self) -> usize;

    /// All object ids, in creation order.
    fn objects(&self) -> Vec<ObjectId>;

    fn object(&self, id: ObjectId) -> Option<&SceneObject>;

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject>;

    /// Removes an object and its children. Returns false if it did not exist.
    fn remove_object(&mut self, id: ObjectId) -> bool;

    fn action(&self, id: ActionId) -> Option<&Action>;

    fn action_mut(&mut self, id: ActionId) -> Option<&mut Action>;

    /// Creates an empty action with a unique name derived from `name`.
    fn new_action(&mut self, name: &str) -> ActionId;

    /// Objects without a parent.
    fn top_level_objects(&self) -> Vec<ObjectId> {
        self.objects()
            .into_iter()
            .filter(|id| self.object(*id).is_some_and(|o| o.parent.is_none()))
            .collect()
    }

    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .into_iter()
            .find(|id| self.object(*id).is_some_and(|o| o.name == name))
    }

    /// Name of an object, or its id when it does not exist.
    fn object_name(&self, id: ObjectId) -> String {
        self.object(id)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// The skeleton of an armature object.
    fn armature(&self, id: ObjectId) -> RetargetResult<&Skeleton> {
        let object = self
            .object(id)
            .ok_or_else(|| RetargetError::object_not_found(id.to_string()))?;
        object.skeleton().ok_or_else(|| RetargetError::NotAnArmature {
            name: object.name.clone(),
        })
    }

    fn armature_mut(&mut self, id: ObjectId) -> RetargetResult<&mut Skeleton> {
        let object = self
            .object_mut(id)
            .ok_or_else(|| RetargetError::object_not_found(id.to_string()))?;
        let name = object.name.clone();
        object
            .skeleton_mut()
            .ok_or(RetargetError::NotAnArmature { name })
    }

    /// World matrix of an object, following its parent chain.
    fn object_world(&self, id: ObjectId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = self.object(id);
        let mut guard = 0;
        while let Some(object) = current {
            matrix = object.transform.to_mat4() * matrix;
            current = object.parent.and_then(|p| self.object(p));
            guard += 1;
            if guard > 256 {
                break;
            }
        }
        matrix
    }
}

// =============================================================================
// In-memory host
// =============================================================================

/// An in-memory scene.
#[derive(Default)]
pub struct MemoryScene {
    objects: BTreeMap<ObjectId, SceneObject>,
    actions: BTreeMap<ActionId, Action>,
    next_object: u64,
    next_action: u64,
    frame: i32,
    importer: Option<Box<dyn ClipImporter>>,
    exporter: Option<Box<dyn ArtifactExporter>>,
}

impl MemoryScene {
    /// Creates an empty scene without importer or exporter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_importer(mut self, importer: impl ClipImporter + 'static) -> Self {
        self.importer = Some(Box::new(importer));
        self
    }

    pub fn with_exporter(mut self, exporter: impl ArtifactExporter + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    fn name_taken(&self, name: &str) -> bool {
        self.objects.values().any(|o| o.name == name)
    }

    /// Adds an object, renaming it if its name is taken.
    pub fn add_object(&mut self, mut object: SceneObject) -> ObjectId {
        object.name = unique_name(&object.name, |n| self.name_taken(n));
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        trace!("add object {} '{}'", id, object.name);
        self.objects.insert(id, object);
        id
    }

    /// Adds an action, renaming it if its name is taken.
    pub fn add_action(&mut self, mut action: Action) -> ActionId {
        action.name = unique_name(&action.name, |n| {
            self.actions.values().any(|a| a.name == n)
        });
        let id = ActionId(self.next_action);
        self.next_action += 1;
        self.actions.insert(id, action);
        id
    }

    /// Number of actions in the library.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Adds everything from an import result. Returns the new object ids.
    pub fn add_imported(&mut self, imported: ImportedScene) -> Vec<ObjectId> {
        let action_ids: Vec<ActionId> = imported
            .actions
            .into_iter()
            .map(|a| self.add_action(a))
            .collect();

        let mut ids: Vec<ObjectId> = Vec::with_capacity(imported.objects.len());
        for object in imported.objects {
            let parent = object.parent.and_then(|p| ids.get(p).copied());
            let data = match object.skeleton {
                Some(mut skeleton) => {
                    skeleton.action = object.active_action.and_then(|i| action_ids.get(i).copied());
                    skeleton.tracks = object
                        .tracks
                        .iter()
                        .filter_map(|(name, i)| {
                            let action = *action_ids.get(*i)?;
                            let (frame_start, frame_end) = self
                                .actions
                                .get(&action)
                                .and_then(Action::frame_range)
                                .unwrap_or((1.0, 1.0));
                            Some(AnimTrack {
                                name: name.clone(),
                                strips: vec![AnimStrip {
                                    name: name.clone(),
                                    action,
                                    frame_start,
                                    frame_end,
                                }],
                                lock: false,
                                mute: false,
                            })
                        })
                        .collect();
                    ObjectData::Armature(skeleton)
                }
                None => ObjectData::Empty,
            };
            let id = self.add_object(SceneObject {
                name: object.name,
                parent,
                transform: object.transform,
                data,
            });
            ids.push(id);
        }
        ids
    }

    fn referenced_actions(&self) -> BTreeSet<ActionId> {
        let mut used = BTreeSet::new();
        for skeleton in self.objects.values().filter_map(SceneObject::skeleton) {
            used.extend(skeleton.action);
            for track in &skeleton.tracks {
                used.extend(track.strips.iter().map(|s| s.action));
            }
        }
        used
    }

    fn build_export_request(&self, objects: &[ObjectId], mode: ExportMode) -> ExportRequest<'_> {
        let mut armatures: Vec<ExportArmature<'_>> = Vec::new();
        for &id in objects {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            let Some(skeleton) = object.skeleton() else {
                continue;
            };
            armatures.push(ExportArmature {
                name: &object.name,
                origin: Transform::from_mat4(self.object_world(id)),
                skeleton,
            });
        }

        let mut animations: Vec<ExportAnimation<'_>> = Vec::new();
        match mode {
            ExportMode::NlaTracks => {
                for (arm_index, armature) in armatures.iter().enumerate() {
                    for track in &armature.skeleton.tracks {
                        let Some(action) = track.action().and_then(|a| self.actions.get(&a)) else {
                            continue;
                        };
                        match animations.iter_mut().find(|a| a.name == track.name) {
                            Some(existing) => existing.channels.push((arm_index, action)),
                            None => animations.push(ExportAnimation {
                                name: track.name.clone(),
                                channels: vec![(arm_index, action)],
                            }),
                        }
                    }
                }
            }
            ExportMode::ActiveActions => {
                let channels: Vec<(usize, &Action)> = armatures
                    .iter()
                    .enumerate()
                    .filter_map(|(i, arm)| {
                        let action = self.actions.get(&arm.skeleton.action?)?;
                        Some((i, action))
                    })
                    .collect();
                if let Some(&(_, first)) = channels.first() {
                    animations.push(ExportAnimation {
                        name: first.name.clone(),
                        channels,
                    });
                }
            }
        }

        ExportRequest {
            armatures,
            animations,
        }
    }
}

impl SceneHost for MemoryScene {
    fn import_clip(&mut self, path: &Path) -> RetargetResult<usize> {
        let importer = self.importer.as_ref().ok_or_else(|| {
            RetargetError::import_failed(path, "scene has no importer configured")
        })?;
        let imported = importer.import(path)?;
        let ids = self.add_imported(imported);
        debug!("imported {} object(s) from {}", ids.len(), path.display());
        Ok(ids.len())
    }

    fn export_artifact(
        &mut self,
        path: &Path,
        objects: &[ObjectId],
        mode: ExportMode,
    ) -> RetargetResult<ExportSummary> {
        let exporter = self.exporter.as_ref().ok_or_else(|| {
            RetargetError::export_failed(path, "scene has no exporter configured")
        })?;
        let request = self.build_export_request(objects, mode);
        exporter.export(path, &request)
    }

    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
        let actions = &self.actions;
        for object in self.objects.values_mut() {
            let Some(skeleton) = object.skeleton_mut() else {
                continue;
            };
            if let Some(action) = skeleton.action.and_then(|id| actions.get(&id)) {
                skeleton.apply_action(action, frame as f32);
            }
        }

        // Constraint targets are evaluated from a snapshot taken after actions ran.
        let constrained: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, o)| o.skeleton().is_some_and(|s| s.constraint_count() > 0))
            .map(|(id, _)| *id)
            .collect();
        if constrained.is_empty() {
            return;
        }

        let mut needed: BTreeSet<ObjectId> = BTreeSet::new();
        for id in &constrained {
            if let Some(skeleton) = self.objects.get(id).and_then(SceneObject::skeleton) {
                for bone in skeleton.bones() {
                    needed.extend(bone.constraints.iter().map(|c| c.target));
                }
            }
        }

        let mut sources: HashMap<ObjectId, PoseSnapshot> = HashMap::new();
        for id in needed {
            if let Some(skeleton) = self.objects.get(&id).and_then(SceneObject::skeleton) {
                sources.insert(id, snapshot(skeleton, self.object_world(id)));
            }
        }

        for id in constrained {
            let origin = self.object_world(id);
            if let Some(skeleton) = self.objects.get_mut(&id).and_then(SceneObject::skeleton_mut) {
                solve_links(skeleton, origin, &sources);
            }
        }
    }

    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn purge_unused(&mut self) -> usize {
        let used = self.referenced_actions();
        let before = self.actions.len();
        self.actions.retain(|id, _| used.contains(id));
        let purged = before - self.actions.len();
        if purged > 0 {
            debug!("purged {} unused action(s)", purged);
        }
        purged
    }

    fn objects(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    fn remove_object(&mut self, id: ObjectId) -> bool {
        if self.objects.remove(&id).is_none() {
            return false;
        }
        let children: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, o)| o.parent == Some(id))
            .map(|(child, _)| *child)
            .collect();
        for child in children {
            self.remove_object(child);
        }
        true
    }

    fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    fn action_mut(&mut self, id: ActionId) -> Option<&mut Action> {
        self.actions.get_mut(&id)
    }

    fn new_action(&mut self, name: &str) -> ActionId {
        self.add_action(Action::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{bone_data_path, Channel};
    use crate::constraint::{ConstraintKind, ConstraintLink};
    use crate::skeleton::tests::humanoid;
    use glam::Vec3;

    #[test]
    fn test_unique_object_names() {
        let mut scene = MemoryScene::new();
        let a = scene.add_object(SceneObject::armature("Armature", humanoid()));
        let b = scene.add_object(SceneObject::armature("Armature", humanoid()));
        assert_eq!(scene.object(a).unwrap().name, "Armature");
        assert_eq!(scene.object(b).unwrap().name, "Armature.001");
        assert_eq!(scene.find_object("Armature.001"), Some(b));
    }

    #[test]
    fn test_remove_object_removes_children() {
        let mut scene = MemoryScene::new();
        let parent = scene.add_object(SceneObject::armature("Armature", humanoid()));
        let child = scene.add_object(SceneObject::empty("Mesh").with_parent(parent));
        assert_eq!(scene.top_level_objects(), vec![parent]);
        assert!(scene.remove_object(parent));
        assert!(scene.object(child).is_none());
        assert!(!scene.remove_object(parent));
    }

    #[test]
    fn test_object_world_follows_parents() {
        let mut scene = MemoryScene::new();
        let parent = scene.add_object(
            SceneObject::empty("Root").with_transform(Transform::from_translation(Vec3::X)),
        );
        let child = scene.add_object(
            SceneObject::empty("Child")
                .with_parent(parent)
                .with_transform(Transform::from_translation(Vec3::Y)),
        );
        let world = scene.object_world(child);
        assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_set_frame_evaluates_actions_then_constraints() {
        let mut scene = MemoryScene::new();
        let source = scene.add_object(SceneObject::armature("Source", humanoid()));
        let target = scene.add_object(SceneObject::armature("Target", humanoid()));

        let action = scene.new_action("Walk");
        let curve = scene
            .action_mut(action)
            .unwrap()
            .ensure(&bone_data_path("Hips", Channel::Location), 0);
        curve.insert(0.0, 0.0);
        curve.insert(10.0, 1.0);
        scene.armature_mut(source).unwrap().action = Some(action);

        scene
            .armature_mut(target)
            .unwrap()
            .bone_mut("Hips")
            .unwrap()
            .constraints
            .push(ConstraintLink::new(ConstraintKind::CopyLocation, source, "Hips"));

        scene.set_frame(10);
        assert_eq!(scene.current_frame(), 10);
        let hips = scene.armature(target).unwrap().bone("Hips").unwrap().pose;
        assert!(hips.translation.abs_diff_eq(Vec3::X, 1e-4));
    }

    #[test]
    fn test_purge_counts_unreferenced_actions() {
        let mut scene = MemoryScene::new();
        let target = scene.add_object(SceneObject::armature("Armature", humanoid()));
        let used = scene.new_action("Used");
        scene.new_action("Orphan");
        scene.armature_mut(target).unwrap().action = Some(used);
        assert_eq!(scene.purge_unused(), 1);
        assert_eq!(scene.action_count(), 1);
        assert_eq!(scene.purge_unused(), 0);
    }

    #[test]
    fn test_action_names_are_unique() {
        let mut scene = MemoryScene::new();
        let a = scene.new_action("Action");
        let b = scene.new_action("Action");
        assert_eq!(scene.action(a).unwrap().name, "Action");
        assert_eq!(scene.action(b).unwrap().name, "Action.001");
    }

    #[test]
    fn test_import_without_importer_fails() {
        let mut scene = MemoryScene::new();
        assert!(scene.import_clip(Path::new("a.glb")).is_err());
    }
}
