//! A rigid (or pure-translation) transform.

use super::{Quat, Vec3};
use cgmath::{One, Rotation, Zero};

/// A position + rotation transform. When `uses_rotation` is `false` the
/// rotation is held at identity and `rotate`/`inverse_rotate` become no-ops
/// -- this is the particle specialization described in the data model: a
/// particle's `Pose` never needs to carry orientation, so skipping the
/// quaternion math is both correct and cheap.
///
/// The reference implementation selects between the rotating and
/// non-rotating behavior with two pairs of function pointers computed once
/// at construction time; here the same selection is a boolean branch, which
/// keeps `Pose` `Copy` and needs no runtime dispatch machinery.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation. Identity when `uses_rotation` is `false`.
    pub rotation: Quat,
    /// Whether this pose carries orientation (a rigid body) or not (a particle).
    pub uses_rotation: bool,
}

impl Pose {
    /// A pose at the origin with identity rotation.
    pub fn identity(uses_rotation: bool) -> Self {
        Pose {
            position: Vec3::zero(),
            rotation: Quat::one(),
            uses_rotation,
        }
    }

    /// Constructs a pose from an explicit position and rotation.
    pub fn new(position: Vec3, rotation: Quat, uses_rotation: bool) -> Self {
        Pose {
            position,
            rotation,
            uses_rotation,
        }
    }

    /// Maps a local-space point into world space.
    pub fn transform(&self, point: Vec3) -> Vec3 {
        if self.uses_rotation {
            self.position + self.rotation * point
        } else {
            self.position + point
        }
    }

    /// Maps a world-space point into local space.
    pub fn inverse_transform(&self, point: Vec3) -> Vec3 {
        if self.uses_rotation {
            self.rotation.conjugate() * (point - self.position)
        } else {
            point - self.position
        }
    }

    /// Maps a local-space direction into world space.
    pub fn rotate(&self, vector: Vec3) -> Vec3 {
        if self.uses_rotation {
            self.rotation * vector
        } else {
            vector
        }
    }

    /// Maps a world-space direction into local space.
    pub fn inverse_rotate(&self, vector: Vec3) -> Vec3 {
        if self.uses_rotation {
            self.rotation.conjugate() * vector
        } else {
            vector
        }
    }

    /// Composes two poses: `(self * rhs).transform(p) == self.transform(rhs.transform(p))`.
    pub fn compose(&self, rhs: &Pose) -> Pose {
        let uses_rotation = self.uses_rotation || rhs.uses_rotation;
        if uses_rotation {
            Pose {
                position: self.rotation * rhs.position + self.position,
                rotation: self.rotation * rhs.rotation,
                uses_rotation,
            }
        } else {
            Pose {
                position: self.position + rhs.position,
                rotation: Quat::one(),
                uses_rotation,
            }
        }
    }

    /// The inverse transform: `self.inverse().transform(self.transform(p)) == p`.
    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.conjugate();
        let position = if self.uses_rotation { -(rotation * self.position) } else { -self.position };
        Pose {
            position,
            rotation,
            uses_rotation: self.uses_rotation,
        }
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;
    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation3};

    #[test]
    fn transform_then_inverse_transform_round_trips() {
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0).normalize(), cgmath::Rad(0.4)),
            true,
        );
        let p = Vec3::new(5.0, -1.0, 2.0);
        let world = pose.transform(p);
        let back = pose.inverse_transform(world);
        assert!((back - p).magnitude() < 1e-9);
    }

    #[test]
    fn non_rotating_pose_ignores_rotation() {
        let mut pose = Pose::identity(false);
        pose.rotation = Quat::from_axis_angle(Vec3::unit_y(), cgmath::Rad(1.0));
        let v = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(pose.rotate(v), v);
    }

    #[test]
    fn inverse_undoes_transform_for_a_rotating_pose() {
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0).normalize(), cgmath::Rad(0.7)),
            true,
        );
        let p = Vec3::new(5.0, -1.0, 2.0);
        let world = pose.transform(p);
        let back = pose.inverse().transform(world);
        assert!((back - p).magnitude() < 1e-9);
    }
}
