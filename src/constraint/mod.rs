//! Data-driven constraints and the small set of XPBD helpers every one of
//! them is built from.
//!
//! The reference implementation gives each constraint three function
//! pointers (`applyForces`, `solvePositions`, `solveVelocities`) over an
//! opaque payload. This crate models the same "one record, pluggable
//! behavior" shape as an enum matched once per call -- [`Constraint`] holds
//! the two optional body refs and an [`ConstraintKind`] payload; contact
//! constraints are transient and live in their own world-owned pool (see
//! [`contact`]) rather than this module's [`crate::store::Store`], exactly
//! as the data model separates the two lifetimes.

pub mod contact;
pub mod joint;
pub mod motor;

use crate::body::Body;
use crate::math::{Pose, Vec3, EPSILON};
use crate::store::{Ref, Store};
use cgmath::{InnerSpace, Zero};

pub use contact::ContactConstraint;
pub use joint::{DofMask, Joint};
pub use motor::Motor;

/// A persistent constraint: a joint or a motor, attached to up to two
/// bodies (`None` means "attached to world" -- a fixed anchor with
/// infinite effective mass).
pub struct Constraint {
    /// First attached body, or `None` for a world anchor.
    pub body_a: Option<Ref<Body>>,
    /// Second attached body, or `None` for a world anchor.
    pub body_b: Option<Ref<Body>>,
    /// If set, the world's broadphase must not generate a contact
    /// constraint for this body pair (used by joints that connect
    /// overlapping bodies, e.g. a hinge between two halves of a door).
    pub ignore_collisions: bool,
    /// The constraint's concrete behavior.
    pub kind: ConstraintKind,
}

/// The behavior a [`Constraint`] dispatches to. Mirrors the reference
/// implementation's `applyForces`/`solvePositions`/`solveVelocities`
/// function-pointer triad as a match over variants instead.
pub enum ConstraintKind {
    /// A generic joint: linear/planar/twist/swing degrees of freedom with limits.
    Joint(Joint),
    /// A constant torque motor about a local axis.
    Motor(Motor),
}

impl Constraint {
    /// A new joint constraint between `body_a` and `body_b` (either may be `None`).
    pub fn joint(body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, joint: Joint) -> Self {
        Constraint {
            body_a,
            body_b,
            ignore_collisions: false,
            kind: ConstraintKind::Joint(joint),
        }
    }

    /// A new motor constraint between `body_a` and `body_b` (either may be `None`).
    pub fn motor(body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, motor: Motor) -> Self {
        Constraint {
            body_a,
            body_b,
            ignore_collisions: false,
            kind: ConstraintKind::Motor(motor),
        }
    }

    /// Accumulates this constraint's external forces (motor torque) into its bodies.
    pub fn apply_forces(&mut self, bodies: &mut Store<Body>, h: f64) {
        match &mut self.kind {
            ConstraintKind::Joint(_) => {}
            ConstraintKind::Motor(motor) => motor.apply_forces(bodies, self.body_a, self.body_b, h),
        }
    }

    /// Runs the constraint's position-level correction for one substep.
    pub fn solve_positions(&mut self, bodies: &mut Store<Body>, h_inv_sq: f64) {
        if let ConstraintKind::Joint(joint) = &mut self.kind {
            joint.solve_positions(bodies, self.body_a, self.body_b, h_inv_sq);
        }
    }

    /// Runs the constraint's velocity-level correction (damping) for one substep.
    pub fn solve_velocities(&mut self, bodies: &mut Store<Body>, dt: f64, h_inv_sq: f64) {
        if let ConstraintKind::Joint(joint) = &mut self.kind {
            joint.solve_velocities(bodies, self.body_a, self.body_b, dt, h_inv_sq);
        }
    }
}

/// World-space pose of `body`, or a fixed identity-rotation pose at the
/// origin if `body` is `None` -- the "attached to world" convention every
/// constraint shares for its anchor points.
pub(crate) fn body_pose(bodies: &Store<Body>, body: Option<Ref<Body>>) -> Pose {
    body.and_then(|r| bodies.get(r)).map(|b| b.pose).unwrap_or_else(|| Pose::identity(true))
}

/// The effective scalar inverse mass `body` offers to resist a correction
/// along `normal` applied at `pos` (or a pure rotation if `pos` is `None`).
/// A `None` body (a world anchor) offers zero -- infinite effective mass.
pub(crate) fn inverse_mass_at(bodies: &Store<Body>, body: Option<Ref<Body>>, normal: Vec3, pos: Option<Vec3>) -> f64 {
    body.and_then(|r| bodies.get(r)).map(|b| b.get_inverse_mass(normal, pos)).unwrap_or(0.0)
}

/// Applies `delta` to `body` at `pos` (position level, or velocity level if
/// `vel_level`). A `None` body silently absorbs nothing -- a world anchor
/// never moves.
pub(crate) fn apply_correction_to(bodies: &mut Store<Body>, body: Option<Ref<Body>>, delta: Vec3, pos: Option<Vec3>, vel_level: bool) {
    if let Some(r) = body {
        if let Some(b) = bodies.get_mut(r) {
            b.apply_correction(delta, pos, vel_level);
        }
    }
}

/// The shared XPBD correction step every constraint uses: given a
/// displacement `delta` that should be eliminated (a penetration depth
/// along a normal, a tangential slip, a positional error), returns the unit
/// direction and the Lagrange multiplier `lambda` to scale it by, or `None`
/// if neither body can respond (both infinite mass, or `delta` already
/// zero).
pub(crate) fn compute_corrections(
    bodies: &Store<Body>,
    body_a: Option<Ref<Body>>,
    body_b: Option<Ref<Body>>,
    delta: Vec3,
    compliance: f64,
    h_inv_sq: f64,
    pos_a: Option<Vec3>,
    pos_b: Option<Vec3>,
) -> Option<(Vec3, f64)> {
    let magnitude = delta.magnitude();
    if magnitude < EPSILON {
        return None;
    }
    let n = delta / magnitude;

    let w_a = inverse_mass_at(bodies, body_a, n, pos_a);
    let w_b = inverse_mass_at(bodies, body_b, n, pos_b);
    let w = w_a + w_b;
    if w <= 0.0 {
        return None;
    }

    let lambda = -magnitude / (w + compliance * h_inv_sq);
    Some((n, lambda))
}

/// Applies a correction computed by [`compute_corrections`]: `-lambda * n`
/// to `body_a`, `+lambda * n` to `body_b`.
pub(crate) fn apply_corrections(
    bodies: &mut Store<Body>,
    body_a: Option<Ref<Body>>,
    body_b: Option<Ref<Body>>,
    n: Vec3,
    lambda: f64,
    pos_a: Option<Vec3>,
    pos_b: Option<Vec3>,
    vel_level: bool,
) {
    apply_correction_to(bodies, body_a, -n * lambda, pos_a, vel_level);
    apply_correction_to(bodies, body_b, n * lambda, pos_b, vel_level);
}

/// Convenience: runs [`compute_corrections`] then [`apply_corrections`] in
/// one call, returning `lambda` (or `0.0` if no correction was applied).
pub(crate) fn correct(
    bodies: &mut Store<Body>,
    body_a: Option<Ref<Body>>,
    body_b: Option<Ref<Body>>,
    delta: Vec3,
    compliance: f64,
    h_inv_sq: f64,
    pos_a: Option<Vec3>,
    pos_b: Option<Vec3>,
    vel_level: bool,
) -> f64 {
    match compute_corrections(bodies, body_a, body_b, delta, compliance, h_inv_sq, pos_a, pos_b) {
        Some((n, lambda)) => {
            apply_corrections(bodies, body_a, body_b, n, lambda, pos_a, pos_b, vel_level);
            lambda
        }
        None => 0.0,
    }
}

/// Applies linear damping between two anchor points: pulls their relative
/// velocity toward zero by a factor of `min(damping * dt, 1)`.
pub(crate) fn damp_linear(
    bodies: &mut Store<Body>,
    body_a: Option<Ref<Body>>,
    body_b: Option<Ref<Body>>,
    pos_a: Vec3,
    pos_b: Vec3,
    damping: f64,
    dt: f64,
) {
    if damping <= 0.0 {
        return;
    }
    let vel_a = body_a.and_then(|r| bodies.get(r)).map(|b| b.get_velocity_at(pos_a)).unwrap_or_else(Vec3::zero);
    let vel_b = body_b.and_then(|r| bodies.get(r)).map(|b| b.get_velocity_at(pos_b)).unwrap_or_else(Vec3::zero);
    let rel = vel_b - vel_a;
    let factor = (damping * dt).min(1.0);
    let delta = rel * factor;
    correct(bodies, body_a, body_b, delta, 0.0, 1.0, Some(pos_a), Some(pos_b), true);
}

/// Applies angular damping: pulls relative angular velocity toward zero by
/// a factor of `min(damping * dt, 1)`.
pub(crate) fn damp_angular(bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, damping: f64, dt: f64) {
    if damping <= 0.0 {
        return;
    }
    let omega_a = body_a.and_then(|r| bodies.get(r)).map(|b| b.velocity.angular).unwrap_or_else(Vec3::zero);
    let omega_b = body_b.and_then(|r| bodies.get(r)).map(|b| b.velocity.angular).unwrap_or_else(Vec3::zero);
    let rel = omega_b - omega_a;
    if rel.magnitude2() < EPSILON {
        return;
    }
    let factor = (damping * dt).min(1.0);
    let delta = rel * factor;

    if let Some((n, lambda)) = compute_corrections(bodies, body_a, body_b, delta, 0.0, 1.0, None, None) {
        apply_corrections(bodies, body_a, body_b, n, lambda, None, None, true);
    }
}
