//! A constant-torque motor about a local axis.

use crate::body::Body;
use crate::math::Vec3;
use crate::store::{Ref, Store};

/// Applies a constant torque about a local rotation axis to body A, and the
/// equal-and-opposite reaction to body B. Purely a forcing term: it has no
/// position- or velocity-level behavior of its own.
pub struct Motor {
    /// Rotation axis, in body A's local frame.
    pub local_axis: Vec3,
    /// Torque magnitude (N*m) applied along the world-transformed axis.
    pub torque: f64,
}

impl Motor {
    /// A motor with the given local axis and torque.
    pub fn new(local_axis: Vec3, torque: f64) -> Self {
        Motor { local_axis, torque }
    }

    /// Accumulates `torque` along the world-space axis into A's external
    /// angular force, and the negated torque into B's.
    pub fn apply_forces(&self, bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, _h: f64) {
        let axis = match body_a.and_then(|r| bodies.get(r)) {
            Some(a) => a.pose.rotate(self.local_axis),
            None => self.local_axis,
        };
        let world_torque = axis * self.torque;

        if let Some(r) = body_a {
            if let Some(a) = bodies.get_mut(r) {
                a.external_forces.angular += world_torque;
            }
        }
        if let Some(r) = body_b {
            if let Some(b) = bodies.get_mut(r) {
                b.external_forces.angular -= world_torque;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use crate::math::Pose;
    use cgmath::{InnerSpace, One};

    #[test]
    fn torque_accumulates_equal_and_opposite_on_both_bodies() {
        let mut bodies: Store<Body> = Store::new();
        let a = bodies.store(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.0, 0.0, 0.0), cgmath::Quaternion::one(), true)));
        let b = bodies.store(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(1.0, 0.0, 0.0), cgmath::Quaternion::one(), true)));

        let motor = Motor::new(Vec3::unit_x(), 5.0);
        motor.apply_forces(&mut bodies, Some(a), Some(b), 1.0 / 60.0);

        let torque_a = bodies.get(a).unwrap().external_forces.angular;
        let torque_b = bodies.get(b).unwrap().external_forces.angular;
        assert!((torque_a + torque_b).magnitude() < 1e-9);
        assert!((torque_a - Vec3::new(5.0, 0.0, 0.0)).magnitude() < 1e-9);
    }
}
