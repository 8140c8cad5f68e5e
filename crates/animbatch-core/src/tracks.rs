//! Track packing: storing baked actions as locked, muted tracks.

use log::debug;

use crate::action::ActionId;
use crate::error::{RetargetError, RetargetResult};
use crate::scene::{unique_name, ObjectId, SceneHost};
use crate::skeleton::Skeleton;

/// A strip placing an action on a track.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimStrip {
    pub name: String,
    pub action: ActionId,
    pub frame_start: f32,
    pub frame_end: f32,
}

/// A stored animation track.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimTrack {
    pub name: String,
    pub strips: Vec<AnimStrip>,
    /// Locked tracks cannot be edited.
    pub lock: bool,
    /// Muted tracks do not contribute to playback.
    pub mute: bool,
}

impl AnimTrack {
    /// The action of the first strip, if any.
    pub fn action(&self) -> Option<ActionId> {
        self.strips.first().map(|s| s.action)
    }
}

/// Stores the target's active action as a new locked, muted track named after the
/// clip, then clears the active slot. Returns the (possibly suffixed) track name.
pub fn pack<H: SceneHost + ?Sized>(
    host: &mut H,
    target: ObjectId,
    clip_name: &str,
) -> RetargetResult<String> {
    let armature_name = host.object_name(target);
    let action_id = host
        .armature(target)?
        .action
        .ok_or_else(|| RetargetError::NoActiveAction {
            armature: armature_name.clone(),
        })?;

    let (frame_start, frame_end) = host
        .action(action_id)
        .and_then(|a| a.frame_range())
        .unwrap_or((1.0, 1.0));

    let skeleton = host.armature_mut(target)?;
    let name = unique_name(clip_name, |n| skeleton.tracks.iter().any(|t| t.name == n));
    skeleton.tracks.push(AnimTrack {
        name: name.clone(),
        strips: vec![AnimStrip {
            name: name.clone(),
            action: action_id,
            frame_start,
            frame_end,
        }],
        lock: true,
        mute: true,
    });
    skeleton.action = None;

    debug!(
        "packed {} on '{}' as track '{}' ({}..{})",
        action_id, armature_name, name, frame_start, frame_end
    );
    Ok(name)
}

/// Removes every track. Returns the number removed.
pub fn clear_tracks(skeleton: &mut Skeleton) -> usize {
    let count = skeleton.tracks.len();
    skeleton.tracks.clear();
    count
}

/// Clears the active action slot. Returns true if an action was assigned.
pub fn clear_action(skeleton: &mut Skeleton) -> bool {
    skeleton.action.take().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{bone_data_path, Channel};
    use crate::scene::{MemoryScene, SceneObject};
    use crate::skeleton::tests::humanoid;

    fn scene_with_action(frames: (f32, f32)) -> (MemoryScene, ObjectId) {
        let mut scene = MemoryScene::new();
        let target = scene.add_object(SceneObject::armature("Armature", humanoid()));
        let action = scene.new_action("Bake");
        let curve = scene
            .action_mut(action)
            .unwrap()
            .ensure(&bone_data_path("Hips", Channel::Location), 0);
        curve.insert(frames.0, 0.0);
        curve.insert(frames.1, 1.0);
        scene.armature_mut(target).unwrap().action = Some(action);
        (scene, target)
    }

    #[test]
    fn test_pack_locks_mutes_and_clears() {
        let (mut scene, target) = scene_with_action((3.0, 20.0));
        let name = pack(&mut scene, target, "A_Walk_F-loop").unwrap();
        assert_eq!(name, "A_Walk_F-loop");

        let sk = scene.armature(target).unwrap();
        assert!(sk.action.is_none());
        let track = &sk.tracks[0];
        assert!(track.lock && track.mute);
        assert_eq!(track.strips[0].frame_start, 3.0);
        assert_eq!(track.strips[0].frame_end, 20.0);
    }

    #[test]
    fn test_pack_unique_names() {
        let (mut scene, target) = scene_with_action((1.0, 2.0));
        pack(&mut scene, target, "A_Idle").unwrap();
        let again = scene.new_action("Bake");
        scene.armature_mut(target).unwrap().action = Some(again);
        assert_eq!(pack(&mut scene, target, "A_Idle").unwrap(), "A_Idle.001");
    }

    #[test]
    fn test_pack_without_action() {
        let (mut scene, target) = scene_with_action((1.0, 2.0));
        clear_action(scene.armature_mut(target).unwrap());
        let err = pack(&mut scene, target, "A_Idle").unwrap_err();
        assert!(matches!(err, RetargetError::NoActiveAction { .. }));
    }

    #[test]
    fn test_clear_tracks_orphans_actions() {
        let (mut scene, target) = scene_with_action((1.0, 2.0));
        pack(&mut scene, target, "A_Idle").unwrap();
        assert_eq!(scene.purge_unused(), 0);

        assert_eq!(clear_tracks(scene.armature_mut(target).unwrap()), 1);
        assert_eq!(scene.purge_unused(), 1);
        assert!(!clear_action(scene.armature_mut(target).unwrap()));
    }
}
