//! Transient per-pair contact constraint: penetration correction, static
//! friction at the position level, restitution and dynamic friction at the
//! velocity level.
//!
//! Unlike [`super::Joint`]/[`super::Motor`], contact constraints do not live
//! in the constraint [`crate::store::Store`] -- the data model specifies a
//! world-owned pool, resized monotonically and rebound fresh every step
//! (see [`crate::world::World`]), since a contact's identity only needs to
//! survive a single `simulate` call.

use crate::body::Body;
use crate::collider::Collider;
use crate::math::{Pose, Vec3, Vec3Ext, EPSILON};
use crate::narrowphase::{self, ContactPoint};
use crate::store::{Ref, Store};
use cgmath::InnerSpace;

use super::{apply_corrections, compute_corrections};

/// A floor under the restitution-cutoff velocity threshold so a zero-gravity
/// world still suppresses resting-contact jitter instead of disabling the
/// cutoff entirely (see the design notes' resolution of the open question
/// on this point).
pub const RESTITUTION_VELOCITY_FLOOR: f64 = 1e-2;

/// A contact constraint bound to one pair of colliders for the duration of
/// a single `simulate` call.
pub struct ContactConstraint {
    /// First collider.
    pub collider_a: Ref<Collider>,
    /// Second collider.
    pub collider_b: Ref<Collider>,
    /// `collider_a`'s owning body, if any.
    pub body_a: Option<Ref<Body>>,
    /// `collider_b`'s owning body, if any.
    pub body_b: Option<Ref<Body>>,
    /// Whether the most recent `solve_positions` found an active collision.
    pub colliding: bool,
    /// Averaged static friction coefficient of the two colliders.
    pub static_friction: f64,
    /// Averaged dynamic friction coefficient of the two colliders.
    pub dynamic_friction: f64,
    /// Averaged restitution coefficient of the two colliders.
    pub restitution: f64,
    /// The narrowphase result from the most recent `solve_positions` call.
    pub contact: Option<ContactPoint>,
    /// Cached normal-force magnitude from the last penetration correction,
    /// consumed by `solve_velocities`'s dynamic-friction term.
    pub normal_force: f64,
}

impl ContactConstraint {
    /// Binds (or rebinds, when reused from the pool) this constraint to a
    /// fresh pair of colliding colliders for the upcoming step.
    pub fn bind(&mut self, collider_a: Ref<Collider>, collider_b: Ref<Collider>, a: &Collider, b: &Collider) {
        self.collider_a = collider_a;
        self.collider_b = collider_b;
        self.body_a = a.body;
        self.body_b = b.body;
        self.colliding = false;
        self.contact = None;
        self.normal_force = 0.0;
        self.static_friction = 0.5 * (a.static_friction + b.static_friction);
        self.dynamic_friction = 0.5 * (a.dynamic_friction + b.dynamic_friction);
        self.restitution = 0.5 * (a.restitution + b.restitution);
    }

    /// A zeroed constraint, ready to be [`ContactConstraint::bind`]-ed; used
    /// to grow the world's contact pool.
    pub fn unbound() -> Self {
        ContactConstraint {
            collider_a: Ref::null(),
            collider_b: Ref::null(),
            body_a: None,
            body_b: None,
            colliding: false,
            static_friction: 0.0,
            dynamic_friction: 0.0,
            restitution: 0.0,
            contact: None,
            normal_force: 0.0,
        }
    }

    /// No-op: contacts never inject external forces (the reference
    /// implementation's `applyForces` for a contact is empty).
    pub fn apply_forces(&mut self, _h: f64) {}

    /// Re-evaluates narrowphase for the bound pair and applies the
    /// penetration and static-friction corrections.
    pub fn solve_positions(
        &mut self,
        colliders: &Store<Collider>,
        bodies: &mut Store<Body>,
        h_inv_sq: f64,
        gjk_max_iterations: u32,
        epa_max_iterations: u32,
    ) {
        let (a, b) = match (colliders.get(self.collider_a), colliders.get(self.collider_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                self.colliding = false;
                return;
            }
        };

        let pose_a = a.world_pose(body_opt_pose(bodies, self.body_a).as_ref());
        let pose_b = b.world_pose(body_opt_pose(bodies, self.body_b).as_ref());

        let contact = match narrowphase::compute(a, &pose_a, b, &pose_b, gjk_max_iterations, epa_max_iterations) {
            Some(c) => c,
            None => {
                self.colliding = false;
                self.contact = None;
                return;
            }
        };
        self.colliding = true;
        self.contact = Some(contact);

        let world_a = pose_a.transform(contact.point_a);
        let world_b = pose_b.transform(contact.point_b);
        let normal = contact.normal;

        let penetration = normal * contact.depth;
        let lambda_n = match compute_corrections(bodies, self.body_a, self.body_b, penetration, 0.0, h_inv_sq, Some(world_a), Some(world_b)) {
            Some((n, lambda)) => {
                apply_corrections(bodies, self.body_a, self.body_b, n, lambda, Some(world_a), Some(world_b), false);
                lambda
            }
            None => 0.0,
        };
        self.normal_force = (lambda_n * h_inv_sq).abs();

        // Static friction: positions have moved, so the contact anchors'
        // world positions (and thus the tangential slip) must be recomputed.
        let pose_a2 = a.world_pose(body_opt_pose(bodies, self.body_a).as_ref());
        let pose_b2 = b.world_pose(body_opt_pose(bodies, self.body_b).as_ref());
        let world_a2 = pose_a2.transform(contact.point_a);
        let world_b2 = pose_b2.transform(contact.point_b);

        let prev_pose_a = a.world_pose(body_opt_prev_pose(bodies, self.body_a).as_ref());
        let prev_pose_b = b.world_pose(body_opt_prev_pose(bodies, self.body_b).as_ref());
        let prev_world_a = prev_pose_a.transform(contact.point_a);
        let prev_world_b = prev_pose_b.transform(contact.point_b);

        let slip = (world_b2 - prev_world_b) - (world_a2 - prev_world_a);
        let tangential = slip.project_on_plane(normal);

        if let Some((t, lambda_t)) = compute_corrections(bodies, self.body_a, self.body_b, tangential, 0.0, h_inv_sq, Some(world_a2), Some(world_b2)) {
            if lambda_t.abs() < self.static_friction * lambda_n.abs() {
                apply_corrections(bodies, self.body_a, self.body_b, t, lambda_t, Some(world_a2), Some(world_b2), false);
            }
        }
    }

    /// Applies restitution and dynamic friction at the velocity level.
    pub fn solve_velocities(&mut self, colliders: &Store<Collider>, bodies: &mut Store<Body>, dt: f64, gravity: Vec3) {
        if !self.colliding {
            return;
        }
        let contact = match self.contact {
            Some(c) => c,
            None => return,
        };
        let (a, b) = match (colliders.get(self.collider_a), colliders.get(self.collider_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let pose_a = a.world_pose(body_opt_pose(bodies, self.body_a).as_ref());
        let pose_b = b.world_pose(body_opt_pose(bodies, self.body_b).as_ref());
        let world_a = pose_a.transform(contact.point_a);
        let world_b = pose_b.transform(contact.point_b);
        let normal = contact.normal;

        let vel_a = velocity_at(bodies, self.body_a, world_a);
        let vel_b = velocity_at(bodies, self.body_b, world_b);
        let v = vel_b - vel_a;
        let v_n = normal.dot(v);

        let pre_vel_a = pre_velocity_at(bodies, self.body_a, world_a);
        let pre_vel_b = pre_velocity_at(bodies, self.body_b, world_b);
        let pre_v_n = normal.dot(pre_vel_b - pre_vel_a);

        let restitution_cutoff = (2.0 * dt * gravity.magnitude()).max(RESTITUTION_VELOCITY_FLOOR);
        let e = if v_n.abs() < restitution_cutoff { 0.0 } else { self.restitution };

        let restitution_delta = normal * (-v_n + (-e * pre_v_n).max(0.0));
        if let Some((n, lambda)) = compute_corrections(bodies, self.body_a, self.body_b, restitution_delta, 0.0, 1.0, Some(world_a), Some(world_b)) {
            apply_corrections(bodies, self.body_a, self.body_b, n, lambda, Some(world_a), Some(world_b), true);
        }

        let v_t = v - normal * v_n;
        let v_t_mag = v_t.magnitude();
        if v_t_mag > EPSILON {
            let friction_mag = (self.dynamic_friction * self.normal_force * dt).min(v_t_mag);
            let friction_delta = (v_t / v_t_mag) * friction_mag;
            if let Some((n, lambda)) = compute_corrections(bodies, self.body_a, self.body_b, friction_delta, 0.0, 1.0, Some(world_a), Some(world_b)) {
                apply_corrections(bodies, self.body_a, self.body_b, n, lambda, Some(world_a), Some(world_b), true);
            }
        }
    }
}

fn body_opt_pose(bodies: &Store<Body>, body: Option<Ref<Body>>) -> Option<Pose> {
    body.and_then(|r| bodies.get(r)).map(|b| b.pose)
}

fn body_opt_prev_pose(bodies: &Store<Body>, body: Option<Ref<Body>>) -> Option<Pose> {
    body.and_then(|r| bodies.get(r)).map(|b| b.prev_pose)
}

fn velocity_at(bodies: &Store<Body>, body: Option<Ref<Body>>, pos: Vec3) -> Vec3 {
    body.and_then(|r| bodies.get(r)).map(|b| b.get_velocity_at(pos)).unwrap_or_else(cgmath::Zero::zero)
}

fn pre_velocity_at(bodies: &Store<Body>, body: Option<Ref<Body>>, pos: Vec3) -> Vec3 {
    body.and_then(|r| bodies.get(r)).map(|b| b.get_pre_velocity_at(pos)).unwrap_or_else(cgmath::Zero::zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyKind};
    use crate::collider::Shape;
    use cgmath::{One, Zero};

    fn sphere_collider(radius: f64) -> Collider {
        let shape = Shape::new_sphere(radius).unwrap();
        let mut collider = Collider::new(shape, Pose::identity(true), 1);
        collider.restitution = 0.0;
        collider
    }

    #[test]
    fn resting_contact_caches_normal_force_near_weight() {
        let mut colliders: Store<Collider> = Store::new();
        let mut bodies: Store<Body> = Store::new();

        let gravity = Vec3::new(0.0, -10.0, 0.0);

        let mut dynamic_body = Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.0, 1.05, 0.0), cgmath::Quaternion::one(), true));
        dynamic_body.inv_mass = 1.0;
        dynamic_body.inv_inertia = Vec3::new(1.0, 1.0, 1.0);
        let body_dynamic = bodies.store(dynamic_body);

        let mut dynamic_collider = sphere_collider(1.0);
        dynamic_collider.body = Some(body_dynamic);
        let collider_dynamic = colliders.store(dynamic_collider);

        let ground_collider = sphere_collider(1.0);
        let collider_ground = colliders.store(ground_collider);

        let mut contact = ContactConstraint::unbound();
        let a = colliders.get(collider_dynamic).unwrap().clone();
        let b = colliders.get(collider_ground).unwrap().clone();
        contact.bind(collider_dynamic, collider_ground, &a, &b);

        let h = 1.0 / 600.0;
        let h_inv_sq = 1.0 / (h * h);
        for _ in 0..300 {
            if let Some(body) = bodies.get_mut(body_dynamic) {
                body.integrate(h, gravity);
            }
            contact.solve_positions(&colliders, &mut bodies, h_inv_sq, 16, 28);
            if let Some(body) = bodies.get_mut(body_dynamic) {
                body.differentiate(1.0 / h);
            }
            contact.solve_velocities(&colliders, &mut bodies, h, gravity);
        }

        let body = bodies.get(body_dynamic).unwrap();
        assert!(body.velocity.linear.magnitude() < 0.5);
        assert!(contact.normal_force > 0.0);
    }
}
