//! Actions: named sets of keyframed curves.
//!
//! Curves address bone channels through data paths of the form
//! `pose.bones["<bone>"].<channel>` and a component index. Rotation curves use
//! quaternion components in `w, x, y, z` order.

use std::sync::OnceLock;

use glam::Vec2;
use regex::Regex;

/// Frames closer than this are treated as the same key.
const FRAME_EPSILON: f32 = 0.01;

/// Interpolation from one key to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Constant,
    Linear,
    #[default]
    Bezier,
}

/// A keyframe with bezier handles. `x` is the frame, `y` the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub co: Vec2,
    pub handle_left: Vec2,
    pub handle_right: Vec2,
    pub interpolation: Interpolation,
}

impl Keyframe {
    /// Creates a bezier key with flat handles one third of a frame away.
    pub fn new(frame: f32, value: f32) -> Self {
        Self {
            co: Vec2::new(frame, value),
            handle_left: Vec2::new(frame - 1.0 / 3.0, value),
            handle_right: Vec2::new(frame + 1.0 / 3.0, value),
            interpolation: Interpolation::Bezier,
        }
    }

    pub fn frame(&self) -> f32 {
        self.co.x
    }

    pub fn value(&self) -> f32 {
        self.co.y
    }

    /// Places both handles `offset` frames away at the key's own value.
    pub fn set_flat_handles(&mut self, offset: f32) {
        self.handle_left = Vec2::new(self.co.x - offset, self.co.y);
        self.handle_right = Vec2::new(self.co.x + offset, self.co.y);
    }
}

/// One animated scalar channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FCurve {
    pub data_path: String,
    pub array_index: usize,
    keyframes: Vec<Keyframe>,
}

impl FCurve {
    pub fn new(data_path: impl Into<String>, array_index: usize) -> Self {
        Self {
            data_path: data_path.into(),
            array_index,
            keyframes: Vec::new(),
        }
    }

    /// Keyframes sorted by frame.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Mutable keyframes. Callers must not reorder frames.
    pub fn keyframes_mut(&mut self) -> &mut [Keyframe] {
        &mut self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Inserts a key, replacing an existing key on the same frame.
    ///
    /// Handles of the touched key and its neighbours are recalculated.
    pub fn insert(&mut self, frame: f32, value: f32) {
        let pos = self
            .keyframes
            .partition_point(|k| k.co.x < frame - FRAME_EPSILON);

        let replace = self
            .keyframes
            .get(pos)
            .is_some_and(|k| (k.co.x - frame).abs() <= FRAME_EPSILON);

        if replace {
            self.keyframes[pos].co.y = value;
        } else {
            self.keyframes.insert(pos, Keyframe::new(frame, value));
        }

        let lo = pos.saturating_sub(1);
        let hi = (pos + 1).min(self.keyframes.len() - 1);
        for i in lo..=hi {
            self.recalculate_handle(i);
        }
    }

    /// Appends a key without touching handles. Frames must be increasing.
    pub fn push(&mut self, keyframe: Keyframe) {
        debug_assert!(self
            .keyframes
            .last()
            .map_or(true, |last| last.co.x < keyframe.co.x));
        self.keyframes.push(keyframe);
    }

    /// Recalculates auto-clamped handles for every key.
    pub fn recalculate_handles(&mut self) {
        for i in 0..self.keyframes.len() {
            self.recalculate_handle(i);
        }
    }

    fn recalculate_handle(&mut self, i: usize) {
        let prev = i.checked_sub(1).map(|p| self.keyframes[p].co);
        let next = self.keyframes.get(i + 1).map(|k| k.co);
        let key = &mut self.keyframes[i];
        let co = key.co;

        let slope = match (prev, next) {
            (Some(p), Some(n)) => {
                let is_extremum = (co.y >= p.y && co.y >= n.y) || (co.y <= p.y && co.y <= n.y);
                if is_extremum || (n.x - p.x).abs() < f32::EPSILON {
                    0.0
                } else {
                    (n.y - p.y) / (n.x - p.x)
                }
            }
            _ => 0.0,
        };

        let left_len = prev.map_or(1.0 / 3.0, |p| (co.x - p.x) / 3.0);
        let right_len = next.map_or(1.0 / 3.0, |n| (n.x - co.x) / 3.0);
        key.handle_left = Vec2::new(co.x - left_len, co.y - slope * left_len);
        key.handle_right = Vec2::new(co.x + right_len, co.y + slope * right_len);
    }

    /// Evaluates the curve at a frame. Values are held constant outside the keyed
    /// range. Returns `None` for a curve without keys.
    pub fn evaluate(&self, frame: f32) -> Option<f32> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if frame <= first.co.x {
            return Some(first.co.y);
        }
        if frame >= last.co.x {
            return Some(last.co.y);
        }

        let next = self.keyframes.partition_point(|k| k.co.x <= frame);
        let k0 = &self.keyframes[next - 1];
        let k1 = &self.keyframes[next];

        let value = match k0.interpolation {
            Interpolation::Constant => k0.co.y,
            Interpolation::Linear => {
                let t = (frame - k0.co.x) / (k1.co.x - k0.co.x);
                k0.co.y + (k1.co.y - k0.co.y) * t
            }
            Interpolation::Bezier => eval_bezier_segment(k0, k1, frame),
        };
        Some(value)
    }
}

/// Evaluates the cubic segment between two keys at `frame`.
///
/// Handles are clamped into the segment so x stays monotonic, then the curve
/// parameter is found by bisection.
fn eval_bezier_segment(k0: &Keyframe, k1: &Keyframe, frame: f32) -> f32 {
    let p0 = k0.co;
    let p3 = k1.co;
    let span = p3.x - p0.x;

    let mut p1 = k0.handle_right;
    let mut p2 = k1.handle_left;
    p1.x = p1.x.clamp(p0.x, p0.x + span);
    p2.x = p2.x.clamp(p3.x - span, p3.x);

    let bezier = |a: f32, b: f32, c: f32, d: f32, t: f32| {
        let u = 1.0 - t;
        u * u * u * a + 3.0 * u * u * t * b + 3.0 * u * t * t * c + t * t * t * d
    };

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..32 {
        let mid = 0.5 * (lo + hi);
        if bezier(p0.x, p1.x, p2.x, p3.x, mid) < frame {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let t = 0.5 * (lo + hi);
    bezier(p0.y, p1.y, p2.y, p3.y, t)
}

// =============================================================================
// Actions
// =============================================================================

/// Handle to an action stored in a scene's action library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub u64);

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AC{}", self.0)
    }
}

/// A named collection of curves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Action {
    pub name: String,
    fcurves: Vec<FCurve>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fcurves: Vec::new(),
        }
    }

    pub fn fcurves(&self) -> &[FCurve] {
        &self.fcurves
    }

    pub fn fcurves_mut(&mut self) -> &mut [FCurve] {
        &mut self.fcurves
    }

    /// Finds a curve by data path and component index.
    pub fn find(&self, data_path: &str, index: usize) -> Option<&FCurve> {
        self.fcurves
            .iter()
            .find(|c| c.array_index == index && c.data_path == data_path)
    }

    pub fn find_mut(&mut self, data_path: &str, index: usize) -> Option<&mut FCurve> {
        self.fcurves
            .iter_mut()
            .find(|c| c.array_index == index && c.data_path == data_path)
    }

    /// Returns the curve for a channel component, creating it if needed.
    pub fn ensure(&mut self, data_path: &str, index: usize) -> &mut FCurve {
        let pos = match self
            .fcurves
            .iter()
            .position(|c| c.array_index == index && c.data_path == data_path)
        {
            Some(pos) => pos,
            None => {
                self.fcurves.push(FCurve::new(data_path, index));
                self.fcurves.len() - 1
            }
        };
        &mut self.fcurves[pos]
    }

    /// Adds a curve, replacing any existing curve for the same channel component.
    pub fn add_fcurve(&mut self, curve: FCurve) {
        match self.find_mut(&curve.data_path, curve.array_index) {
            Some(existing) => *existing = curve,
            None => self.fcurves.push(curve),
        }
    }

    /// First and last keyed frame over all curves.
    pub fn frame_range(&self) -> Option<(f32, f32)> {
        self.fcurves
            .iter()
            .filter_map(|c| Some((c.keyframes.first()?.co.x, c.keyframes.last()?.co.x)))
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    /// True when no curve has any key.
    pub fn is_empty(&self) -> bool {
        self.fcurves.iter().all(FCurve::is_empty)
    }

    /// Names of bones with at least one curve, in first-seen order.
    pub fn bone_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for curve in &self.fcurves {
            if let Some((bone, _)) = parse_bone_data_path(&curve.data_path) {
                if !names.iter().any(|n| n == bone) {
                    names.push(bone.to_string());
                }
            }
        }
        names
    }
}

// =============================================================================
// Data paths
// =============================================================================

/// An animatable bone channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Location,
    RotationQuaternion,
    Scale,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Location => "location",
            Channel::RotationQuaternion => "rotation_quaternion",
            Channel::Scale => "scale",
        }
    }

    /// Number of scalar components.
    pub fn components(&self) -> usize {
        match self {
            Channel::RotationQuaternion => 4,
            Channel::Location | Channel::Scale => 3,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "location" => Some(Channel::Location),
            "rotation_quaternion" => Some(Channel::RotationQuaternion),
            "scale" => Some(Channel::Scale),
            _ => None,
        }
    }
}

/// Builds `pose.bones["<bone>"].<channel>`.
pub fn bone_data_path(bone: &str, channel: Channel) -> String {
    format!("pose.bones[\"{}\"].{}", bone, channel.as_str())
}

fn data_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^pose\.bones\["(.+)"\]\.(location|rotation_quaternion|scale)$"#)
            .expect("valid regex")
    })
}

/// Splits a bone data path into bone name and channel.
pub fn parse_bone_data_path(path: &str) -> Option<(&str, Channel)> {
    let caps = data_path_regex().captures(path)?;
    let bone = caps.get(1)?.as_str();
    let channel = Channel::parse(caps.get(2)?.as_str())?;
    Some((bone, channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(keys: &[(f32, f32)]) -> FCurve {
        let mut c = FCurve::new("pose.bones[\"Hips\"].location", 0);
        for &(f, v) in keys {
            c.insert(f, v);
        }
        c
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut c = curve(&[(3.0, 1.0), (1.0, 0.0), (2.0, 5.0)]);
        let frames: Vec<f32> = c.keyframes().iter().map(Keyframe::frame).collect();
        assert_eq!(frames, vec![1.0, 2.0, 3.0]);

        c.insert(2.0, 7.0);
        assert_eq!(c.len(), 3);
        assert_eq!(c.keyframes()[1].value(), 7.0);
    }

    #[test]
    fn test_evaluate_hits_keys_and_extrapolates() {
        let c = curve(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
        assert_eq!(c.evaluate(-5.0), Some(0.0));
        assert_eq!(c.evaluate(25.0), Some(0.0));
        assert!((c.evaluate(10.0).unwrap() - 10.0).abs() < 1e-4);
        assert!(FCurve::new("x", 0).evaluate(1.0).is_none());
    }

    #[test]
    fn test_bezier_monotonic_segment() {
        let c = curve(&[(0.0, 0.0), (10.0, 1.0), (20.0, 2.0)]);
        let mut prev = c.evaluate(0.0).unwrap();
        for f in 1..=20 {
            let v = c.evaluate(f as f32).unwrap();
            assert!(v >= prev - 1e-5, "frame {}: {} < {}", f, v, prev);
            prev = v;
        }
        assert!((c.evaluate(5.0).unwrap() - 0.5).abs() < 0.2);
    }

    #[test]
    fn test_linear_and_constant() {
        let mut c = curve(&[(0.0, 0.0), (4.0, 8.0)]);
        c.keyframes_mut()[0].interpolation = Interpolation::Linear;
        assert!((c.evaluate(1.0).unwrap() - 2.0).abs() < 1e-6);
        c.keyframes_mut()[0].interpolation = Interpolation::Constant;
        assert_eq!(c.evaluate(3.9), Some(0.0));
    }

    #[test]
    fn test_action_lookup_and_range() {
        let mut action = Action::new("A_Walk");
        let path = bone_data_path("Hips", Channel::Location);
        action.ensure(&path, 0).insert(1.0, 0.0);
        action.ensure(&path, 0).insert(12.0, 1.0);
        action
            .ensure(&bone_data_path("Spine", Channel::RotationQuaternion), 0)
            .insert(3.0, 1.0);

        assert_eq!(action.fcurves().len(), 2);
        assert!(action.find(&path, 0).is_some());
        assert!(action.find(&path, 1).is_none());
        assert_eq!(action.frame_range(), Some((1.0, 12.0)));
        assert_eq!(action.bone_names(), vec!["Hips", "Spine"]);
    }

    #[test]
    fn test_parse_data_path() {
        let path = bone_data_path("Finger_03_L", Channel::RotationQuaternion);
        assert_eq!(path, "pose.bones[\"Finger_03_L\"].rotation_quaternion");
        assert_eq!(
            parse_bone_data_path(&path),
            Some(("Finger_03_L", Channel::RotationQuaternion))
        );
        assert_eq!(parse_bone_data_path("location"), None);
        assert_eq!(parse_bone_data_path("pose.bones[\"Hips\"].rotation_euler"), None);
    }
}
