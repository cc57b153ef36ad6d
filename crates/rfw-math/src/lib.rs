pub use glam::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Decomposed local transform of a single node or bone.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
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
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[inline]
pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// Spherical interpolation that always takes the short arc.
///
/// `q` and `-q` describe the same rotation; when the two inputs lie in opposite
/// hemispheres the second one is negated first so the blend does not swing the long
/// way around.
#[inline]
pub fn slerp_shortest(a: Quat, b: Quat, t: f32) -> Quat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    a.slerp(b, t).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_matrix_round_trip() {
        let t = Transform::from_trs(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            Vec3::splat(2.0),
        );
        let back = Transform::from_matrix(t.to_matrix());
        assert!(back.translation.abs_diff_eq(t.translation, 1e-5));
        assert!(back.scale.abs_diff_eq(t.scale, 1e-5));
        assert!(back.rotation.abs_diff_eq(t.rotation, 1e-5));
    }

    #[test]
    fn identity_is_default() {
        assert_eq!(Transform::default(), Transform::IDENTITY);
        assert_eq!(Transform::IDENTITY.to_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn lerp_midpoint() {
        let v = lerp_vec3(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 0.5);
        assert_eq!(v, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn slerp_takes_short_arc() {
        let a = Quat::from_rotation_z(0.1);
        let b = -Quat::from_rotation_z(0.3);
        assert!(a.dot(b) < 0.0);

        let mid = slerp_shortest(a, b, 0.5);
        let expected = Quat::from_rotation_z(0.2);
        assert!(mid.dot(expected).abs() > 1.0 - 1e-5);
        // Result stays in the hemisphere of the first input.
        assert!(mid.dot(a) > 0.0);
    }

    #[test]
    fn slerp_endpoints() {
        let a = Quat::from_rotation_x(0.4);
        let b = Quat::from_rotation_x(1.2);
        assert!(slerp_shortest(a, b, 0.0).abs_diff_eq(a, 1e-6));
        assert!(slerp_shortest(a, b, 1.0).abs_diff_eq(b, 1e-6));
    }
}
