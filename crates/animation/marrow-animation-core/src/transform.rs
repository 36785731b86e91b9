//! Rigid transforms (rotation + position) used throughout the pose math.
//!
//! Poses stay in rotation space instead of matrices: composing and diffing
//! quaternion/vector pairs avoids matrix drift and keeps blending a cheap
//! component lerp plus renormalize.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Durations and factors below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

/// A rigid transform: rotation followed by translation. Scale is handled
/// one level up, by the scene hierarchy.
///
/// The rotation is expected to stay a unit quaternion; every operation
/// here that could denormalize it renormalizes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation: Quat,
    pub position: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    #[inline]
    pub fn new(rotation: Quat, position: Vec3) -> Self {
        Self { rotation, position }
    }

    /// Combines `other`, expressed in this transform's local space, into a
    /// single transform: `parent.compose(child_local)` is the child in the
    /// parent's space.
    #[inline]
    #[must_use]
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            rotation: self.rotation * other.rotation,
            position: self.position + self.rotation * other.position,
        }
    }

    /// The transform undoing this one: `t.compose(&t.inverse())` is the
    /// identity.
    #[inline]
    #[must_use]
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            rotation,
            position: -(rotation * self.position),
        }
    }

    /// Expresses `self` relative to `other`: `other.compose(&result)`
    /// reproduces `self`.
    #[inline]
    #[must_use]
    pub fn difference(&self, other: &Transform) -> Transform {
        let conjugated = other.rotation.conjugate();
        Transform {
            rotation: conjugated * self.rotation,
            position: conjugated * (self.position - other.position),
        }
    }

    /// Linear blend towards `target`. Rotations use component lerp with a
    /// renormalize rather than slerp; adequate for per-frame pose deltas.
    #[must_use]
    pub fn blend(&self, target: &Transform, factor: f32) -> Transform {
        Transform {
            rotation: self.rotation.lerp(target.rotation, factor).normalize(),
            position: self.position.lerp(target.position, factor),
        }
    }

    /// Rotation + translation matrix (no scale).
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-5, "left={a} right={b}");
    }

    fn approx_transform(a: &Transform, b: &Transform) {
        approx(a.position.x, b.position.x);
        approx(a.position.y, b.position.y);
        approx(a.position.z, b.position.z);
        // q and -q describe the same rotation
        let dot = a.rotation.dot(b.rotation).abs();
        approx(dot, 1.0);
    }

    #[test]
    fn compose_with_identity_is_noop() {
        let t = Transform::new(Quat::from_rotation_y(0.8), Vec3::new(1.0, -2.0, 3.0));
        approx_transform(&t.compose(&Transform::IDENTITY), &t);
        approx_transform(&Transform::IDENTITY.compose(&t), &t);
    }

    #[test]
    fn inverse_round_trips() {
        let t = Transform::new(Quat::from_rotation_z(1.2), Vec3::new(-4.0, 0.5, 2.0));
        approx_transform(&t.compose(&t.inverse()), &Transform::IDENTITY);
        approx_transform(&t.inverse().compose(&t), &Transform::IDENTITY);
    }

    #[test]
    fn difference_undoes_compose() {
        let parent = Transform::new(Quat::from_rotation_x(0.4), Vec3::new(1.0, 2.0, 3.0));
        let child = Transform::new(Quat::from_rotation_y(-0.9), Vec3::new(0.0, 5.0, -1.0));
        let combined = parent.compose(&child);
        approx_transform(&combined.difference(&parent), &child);
        approx_transform(&parent.compose(&combined.difference(&parent)), &combined);
    }

    #[test]
    fn blend_endpoints_and_normalization() {
        let a = Transform::new(Quat::from_rotation_y(0.0), Vec3::ZERO);
        let b = Transform::new(Quat::from_rotation_y(1.6), Vec3::new(2.0, 0.0, 0.0));
        approx_transform(&a.blend(&b, 0.0), &a);
        approx_transform(&a.blend(&b, 1.0), &b);
        let mid = a.blend(&b, 0.5);
        approx(mid.rotation.length(), 1.0);
        approx(mid.position.x, 1.0);
    }
}
