//! Transform helpers on top of glam.

use glam::{Mat4, Quat, Vec3};

/// A translation/rotation/scale triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Decomposes an affine matrix. The rotation is normalized.
    pub fn from_mat4(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Blends toward `other` by `t` (lerp for translation/scale, slerp for rotation).
    pub fn blend(&self, other: &Transform, t: f32) -> Transform {
        if t >= 1.0 {
            return *other;
        }
        if t <= 0.0 {
            return *self;
        }
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

/// Flips `q` onto the hemisphere of `reference` so interpolating between them takes
/// the short path.
pub fn align_hemisphere(reference: Quat, q: Quat) -> Quat {
    if reference.dot(q) < 0.0 {
        -q
    } else {
        q
    }
}

/// Builds a quaternion from Blender-ordered components `[w, x, y, z]`.
pub fn quat_from_wxyz(c: [f32; 4]) -> Quat {
    Quat::from_xyzw(c[1], c[2], c[3], c[0])
}

/// Returns quaternion components in `[w, x, y, z]` order.
pub fn quat_to_wxyz(q: Quat) -> [f32; 4] {
    [q.w, q.x, q.y, q.z]
}

/// Approximate equality for quaternions up to sign.
pub fn quat_approx_eq(a: Quat, b: Quat, eps: f32) -> bool {
    a.dot(b).abs() >= 1.0 - eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_mat4_roundtrip() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(FRAC_PI_2),
            Vec3::ONE,
        );
        let back = Transform::from_mat4(t.to_mat4());
        assert!(back.translation.abs_diff_eq(t.translation, 1e-5));
        assert!(quat_approx_eq(back.rotation, t.rotation, 1e-6));
    }

    #[test]
    fn test_blend_endpoints() {
        let a = Transform::IDENTITY;
        let b = Transform::from_translation(Vec3::X * 2.0);
        assert_eq!(a.blend(&b, 1.0), b);
        assert_eq!(a.blend(&b, 0.0), a);
        assert!(a.blend(&b, 0.5).translation.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_align_hemisphere() {
        let q = Quat::from_rotation_z(0.3);
        let flipped = align_hemisphere(q, -q);
        assert!(flipped.dot(q) > 0.0);
        assert_eq!(align_hemisphere(q, q), q);
    }

    #[test]
    fn test_wxyz_order() {
        let q = quat_from_wxyz([1.0, 0.0, 0.0, 0.0]);
        assert_eq!(q, Quat::IDENTITY);
        assert_eq!(quat_to_wxyz(Quat::IDENTITY), [1.0, 0.0, 0.0, 0.0]);
    }
}
