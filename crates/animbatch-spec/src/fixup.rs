//! Rotation fixup descriptions.

use serde::{Deserialize, Serialize};

/// A principal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    #[default]
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// Returns the axis name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }

    /// Returns the unit vector of this axis.
    pub fn unit(&self) -> [f32; 3] {
        match self {
            Axis::X => [1.0, 0.0, 0.0],
            Axis::Y => [0.0, 1.0, 0.0],
            Axis::Z => [0.0, 0.0, 1.0],
        }
    }
}

/// Rotates one bone's rotation curve by a fixed angle around an axis after baking.
///
/// Used to correct source clips whose bones are known to be misaligned, e.g. a
/// finger that comes in flipped by half a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveFixupSpec {
    /// Bone whose `rotation_quaternion` curves are rewritten.
    pub bone: String,
    /// Rotation angle in degrees.
    pub angle_degrees: f64,
    /// Rotation axis.
    #[serde(default)]
    pub axis: Axis,
}

impl CurveFixupSpec {
    /// Creates a new fixup.
    pub fn new(bone: impl Into<String>, angle_degrees: f64, axis: Axis) -> Self {
        Self {
            bone: bone.into(),
            angle_degrees,
            axis,
        }
    }

    /// Returns the angle in radians.
    pub fn angle_radians(&self) -> f32 {
        self.angle_degrees.to_radians() as f32
    }
}
