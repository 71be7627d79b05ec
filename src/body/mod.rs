//! Bodies: pose, velocity, and mass state, plus the XPBD integrate/
//! differentiate step. A body is either a [`BodyKind::Particle`] (no
//! orientation) or a [`BodyKind::Rigid`] (full 6-DOF); the reference
//! implementation picks between the two via a pair of function pointers
//! bound at construction, which here is a two-variant enum matched once per
//! `integrate`/`differentiate` call.

use crate::collider::Collider;
use crate::mass::Computer;
use crate::math::{Pose, Quat, Vec3};
use crate::store::{Ref, Store};
use cgmath::{InnerSpace, One, Zero};

/// Maximum angular displacement (radians) applied in a single
/// [`Body::apply_rotation`] call, to keep the linearized rotation update
/// stable under large angular velocities or stiff corrections.
const MAX_PHI: f64 = 0.5;

/// A linear/angular pair, used for both velocities and external forces.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityPose {
    /// Linear component.
    pub linear: Vec3,
    /// Angular component.
    pub angular: Vec3,
}

impl VelocityPose {
    /// The zero velocity/force pair.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Selects a body's integration behavior. Replaces the reference
/// implementation's per-instance function pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// No orientation; `integrate`/`differentiate` only ever touch position/linear velocity.
    Particle,
    /// Full rigid body: orientation, angular velocity, and inertia all participate.
    Rigid,
}

/// A simulated body: current and previous pose/velocity, mass properties,
/// and the colliders attached to it.
#[derive(Clone, Debug)]
pub struct Body {
    /// Current world pose.
    pub pose: Pose,
    /// Pose at the start of the current substep, used to differentiate velocity.
    pub prev_pose: Pose,
    /// Current velocity.
    pub velocity: VelocityPose,
    /// Velocity at the start of the current substep, used by restitution.
    pub prev_velocity: VelocityPose,
    /// The principal-axes frame (center of mass + orientation) relative to `pose`.
    pub mass_pose: Pose,
    /// Inverse mass; zero for an infinite-mass (effectively static or degenerate) body.
    pub inv_mass: f64,
    /// Inverse inertia, diagonal, expressed in the mass-pose frame.
    pub inv_inertia: Vec3,
    /// Colliders owned by this body.
    pub colliders: Vec<Ref<Collider>>,
    /// Accumulated external forces/torques for the current substep; cleared at the end of `integrate`.
    pub external_forces: VelocityPose,
    /// Particle or rigid-body integration behavior.
    pub kind: BodyKind,
}

impl Body {
    /// A new body at `pose`, with no colliders and infinite mass until
    /// [`Body::update_mass`] is called.
    pub fn new(kind: BodyKind, pose: Pose) -> Self {
        Body {
            pose,
            prev_pose: pose,
            velocity: VelocityPose::zero(),
            prev_velocity: VelocityPose::zero(),
            mass_pose: Pose::identity(true),
            inv_mass: 0.0,
            inv_inertia: Vec3::zero(),
            colliders: Vec::new(),
            external_forces: VelocityPose::zero(),
            kind,
        }
    }

    /// The world-space center of mass.
    pub fn world_com(&self) -> Vec3 {
        self.pose.transform(self.mass_pose.position)
    }

    fn prev_world_com(&self) -> Vec3 {
        self.prev_pose.transform(self.mass_pose.position)
    }

    /// Advances pose and velocity by one substep of size `h` under uniform
    /// gravity `g` and this body's accumulated external forces, then clears
    /// the external-forces accumulator (it must not leak into the next
    /// substep).
    pub fn integrate(&mut self, h: f64, gravity: Vec3) {
        self.prev_pose = self.pose;
        self.prev_velocity = self.velocity;

        match self.kind {
            BodyKind::Particle => self.integrate_particle(h, gravity),
            BodyKind::Rigid => self.integrate_rigid(h, gravity),
        }

        self.external_forces = VelocityPose::zero();
    }

    fn integrate_particle(&mut self, h: f64, gravity: Vec3) {
        self.velocity.linear += (gravity + self.external_forces.linear * self.inv_mass) * h;
        self.pose.position += self.velocity.linear * h;
    }

    fn integrate_rigid(&mut self, h: f64, gravity: Vec3) {
        self.velocity.linear += (gravity + self.external_forces.linear * self.inv_mass) * h;
        self.pose.position += self.velocity.linear * h;

        let torque = self.external_forces.angular * h;
        let in_pose = self.pose.inverse_rotate(torque);
        let in_mass_pose = self.mass_pose.inverse_rotate(in_pose);
        let scaled = Vec3::new(
            in_mass_pose.x * self.inv_inertia.x,
            in_mass_pose.y * self.inv_inertia.y,
            in_mass_pose.z * self.inv_inertia.z,
        );
        let delta_omega = self.pose.rotate(self.mass_pose.rotate(scaled));
        self.velocity.angular += delta_omega;

        let omega = self.velocity.angular;
        self.apply_rotation(omega, h);
    }

    /// Recovers velocity from the position delta accumulated over a substep
    /// of size `1 / h_inv`.
    pub fn differentiate(&mut self, h_inv: f64) {
        match self.kind {
            BodyKind::Particle => self.differentiate_particle(h_inv),
            BodyKind::Rigid => self.differentiate_rigid(h_inv),
        }
    }

    fn differentiate_particle(&mut self, h_inv: f64) {
        self.velocity.linear = (self.pose.position - self.prev_pose.position) * h_inv;
    }

    fn differentiate_rigid(&mut self, h_inv: f64) {
        self.velocity.linear = (self.world_com() - self.prev_world_com()) * h_inv;

        let dq = self.pose.rotation * self.prev_pose.rotation.conjugate();
        self.velocity.angular = if dq.s >= 0.0 {
            dq.v * (2.0 * h_inv)
        } else {
            dq.v * (-2.0 * h_inv)
        };
    }

    /// Rotates the pose by angular displacement `delta_omega * scale`
    /// (clamped to [`MAX_PHI`] radians), preserving the world-space center
    /// of mass.
    pub fn apply_rotation(&mut self, delta_omega: Vec3, scale: f64) {
        if self.kind == BodyKind::Particle {
            return;
        }

        let mut effective_scale = scale;
        let phi = delta_omega.magnitude() * scale;
        if phi > MAX_PHI && phi > 0.0 {
            effective_scale *= MAX_PHI / phi;
        }

        let com_before = self.world_com();

        let half = delta_omega * (effective_scale * 0.5);
        let dq = Quat::new(0.0, half.x, half.y, half.z);
        self.pose.rotation = (self.pose.rotation + dq * self.pose.rotation).normalize();

        let com_after = self.world_com();
        self.pose.position += com_before - com_after;
    }

    /// The effective scalar inverse mass resisting a unit impulse along
    /// `normal` (world space) applied at `pos` (world space), or, if `pos`
    /// is `None`, a pure rotation about `normal`.
    pub fn get_inverse_mass(&self, normal: Vec3, pos: Option<Vec3>) -> f64 {
        let angular_axis = match pos {
            Some(p) => (p - self.world_com()).cross(normal),
            None => normal,
        };
        let local = self.mass_pose.inverse_rotate(self.pose.inverse_rotate(angular_axis));
        let angular_term =
            local.x * local.x * self.inv_inertia.x + local.y * local.y * self.inv_inertia.y + local.z * local.z * self.inv_inertia.z;

        match pos {
            Some(_) => self.inv_mass + angular_term,
            None => angular_term,
        }
    }

    /// World-space velocity of the material point currently at `pos`.
    pub fn get_velocity_at(&self, pos: Vec3) -> Vec3 {
        self.velocity.linear + self.velocity.angular.cross(pos - self.world_com())
    }

    /// World-space velocity, at the start of the current substep, of the
    /// material point currently at `pos`.
    pub fn get_pre_velocity_at(&self, pos: Vec3) -> Vec3 {
        self.prev_velocity.linear + self.prev_velocity.angular.cross(pos - self.prev_world_com())
    }

    /// Applies correction `delta` (world space) at `pos` (world space, or
    /// `None` for a pure rotation), at either position or velocity level.
    /// The inverse operation of [`Body::get_inverse_mass`]'s weighting.
    pub fn apply_correction(&mut self, delta: Vec3, pos: Option<Vec3>, vel_level: bool) {
        if vel_level {
            self.velocity.linear += delta * self.inv_mass;
        } else {
            self.pose.position += delta * self.inv_mass;
        }

        if self.kind == BodyKind::Particle {
            return;
        }

        let angular_axis = match pos {
            Some(p) => (p - self.world_com()).cross(delta),
            None => delta,
        };
        let local = self.mass_pose.inverse_rotate(self.pose.inverse_rotate(angular_axis));
        let scaled = Vec3::new(local.x * self.inv_inertia.x, local.y * self.inv_inertia.y, local.z * self.inv_inertia.z);
        let delta_omega = self.pose.rotate(self.mass_pose.rotate(scaled));

        if vel_level {
            self.velocity.angular += delta_omega;
        } else {
            self.apply_rotation(delta_omega, 1.0);
        }
    }

    /// Recomputes `mass_pose`/`inv_mass`/`inv_inertia` from the currently
    /// attached colliders. Falls back to infinite mass (both zero) if the
    /// accumulated tensor fails to diagonalize into positive principal
    /// moments -- the reference implementation throws here; this crate's
    /// solver must stay panic-free, so a degenerate collider set just
    /// produces an immovable body instead.
    pub fn update_mass(&mut self, collider_store: &Store<Collider>) {
        let mut computer = Computer::new();
        for &collider_ref in &self.colliders {
            if let Some(collider) = collider_store.get(collider_ref) {
                collider.compute_mass(&mut computer);
            }
        }

        match computer.diagonalize() {
            Some((diag, rotation, com, mass)) => {
                self.mass_pose = Pose::new(com, rotation, true);
                self.inv_mass = 1.0 / mass;
                self.inv_inertia = Vec3::new(1.0 / diag.x, 1.0 / diag.y, 1.0 / diag.z);
            }
            None => {
                log::warn!("body mass failed to diagonalize; falling back to infinite mass");
                self.mass_pose = Pose::identity(true);
                self.inv_mass = 0.0;
                self.inv_inertia = Vec3::zero();
            }
        }
    }
}

/// World-space position of `local_point` relative to `body`'s frame, or the
/// point itself (already world-space) if `body` is `None` -- the "attached
/// to world" convention joints and contacts share for static anchors.
pub fn point_to_world(body: Option<&Body>, local_point: Vec3) -> Vec3 {
    match body {
        Some(b) => b.pose.transform(local_point),
        None => local_point,
    }
}

/// Inverse of [`point_to_world`].
pub fn point_to_local(body: Option<&Body>, world_point: Vec3) -> Vec3 {
    match body {
        Some(b) => b.pose.inverse_transform(world_point),
        None => world_point,
    }
}

/// World-space direction of `local_vector`, or the vector itself if `body` is `None`.
pub fn vector_to_world(body: Option<&Body>, local_vector: Vec3) -> Vec3 {
    match body {
        Some(b) => b.pose.rotate(local_vector),
        None => local_vector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_mass_particle() -> Body {
        let mut body = Body::new(BodyKind::Particle, Pose::identity(false));
        body.inv_mass = 1.0;
        body
    }

    #[test]
    fn particle_integrate_then_differentiate_recovers_velocity() {
        let mut body = unit_mass_particle();
        body.velocity.linear = Vec3::new(1.0, 2.0, 3.0);
        let h = 1.0 / 60.0;

        let expected_velocity = body.velocity.linear;
        body.integrate(h, Vec3::zero());
        body.differentiate(1.0 / h);

        assert_relative_eq!(body.velocity.linear, expected_velocity, epsilon = 1e-9);
    }

    #[test]
    fn gravity_accelerates_a_free_particle() {
        let mut body = unit_mass_particle();
        let gravity = Vec3::new(0.0, -10.0, 0.0);
        let h = 1.0 / 60.0;
        body.integrate(h, gravity);
        assert_relative_eq!(body.velocity.linear, gravity * h, epsilon = 1e-9);
    }

    #[test]
    fn apply_rotation_preserves_world_center_of_mass() {
        let mut body = Body::new(BodyKind::Rigid, Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::one(), true));
        body.mass_pose = Pose::new(Vec3::new(0.5, 0.0, 0.0), Quat::one(), true);
        body.inv_mass = 1.0;
        body.inv_inertia = Vec3::new(1.0, 1.0, 1.0);

        let com_before = body.world_com();
        body.apply_rotation(Vec3::new(0.0, 1.0, 0.0), 0.1);
        let com_after = body.world_com();

        assert_relative_eq!(com_before, com_after, epsilon = 1e-9);
    }
}
