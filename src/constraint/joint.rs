//! The generic joint: two anchor frames, compliant linear/planar and
//! twist/swing degrees of freedom, optional limits, and velocity-level
//! damping.
//!
//! A joint's free-DOF mask picks one of three translational regimes (fixed
//! position, sliding, prismatic/planar) and one of three rotational regimes
//! (fixed orientation, hinge, full spherical) independently -- a hinge, for
//! instance, combines the "fixed position" translational regime with the
//! "hinge" rotational regime.

use crate::body::Body;
use crate::math::{clamp, Pose, Quat, Vec3, Vec3Ext, EPSILON};
use crate::store::{Ref, Store};
use cgmath::{InnerSpace, Rotation3};

use super::{body_pose, correct, damp_angular, damp_linear};

/// One-hot degree-of-freedom bits. Set in [`Joint::free_dofs`], a bit means
/// that DOF is left free (unconstrained); set in [`Joint::limited_dofs`], a
/// bit means the corresponding scalar limit is enforced.
pub struct DofMask;

impl DofMask {
    /// Translation along the anchor's local +X axis.
    pub const LINEAR: u8 = 1 << 0;
    /// Translation within the plane perpendicular to the anchor's local +X axis.
    pub const PLANAR: u8 = 1 << 1;
    /// Rotation about the anchor's local +X axis.
    pub const TWIST: u8 = 1 << 2;
    /// Rotation of the anchor's local +X axis away from alignment (cone freedom).
    pub const SWING: u8 = 1 << 3;
}

/// The maximum per-step angular correction magnitude (radians) for ordinary
/// limit corrections, matching the body integrator's own `MAX_PHI` cap.
const MAX_ANGULAR_CORRECTION: f64 = 0.5;

/// Near gimbal lock (the two swing axes close to anti-parallel) the regular
/// cap is relaxed to this much smaller value, per the design notes, to keep
/// the spherical-limit correction from diverging.
const GIMBAL_LOCK_MAX_CORRECTION: f64 = 1e-4;

/// A generic two-body joint: anchor frames, compliance/damping, a free-DOF
/// mask, a limited-DOF mask, and the scalar limits those bits enable.
pub struct Joint {
    /// Anchor frame on body A, relative to A's pose.
    pub local_pose_a: Pose,
    /// Anchor frame on body B, relative to B's pose.
    pub local_pose_b: Pose,
    /// Compliance (inverse stiffness) for translational corrections.
    pub position_compliance: f64,
    /// Compliance for rotational corrections.
    pub rotation_compliance: f64,
    /// Velocity-level linear damping coefficient.
    pub position_damping: f64,
    /// Velocity-level angular damping coefficient.
    pub rotation_damping: f64,
    /// Which DOFs are left free; see [`DofMask`].
    pub free_dofs: u8,
    /// Which DOFs have an enforced scalar limit; see [`DofMask`].
    pub limited_dofs: u8,
    /// Maximum sliding/prismatic distance along the axis, or maximum radial
    /// offset for a planar joint (whichever regime is active).
    pub linear_limit: f64,
    /// Minimum twist angle (radians), about the anchor's local +X.
    pub twist_limit_min: f64,
    /// Maximum twist angle (radians).
    pub twist_limit_max: f64,
    /// Minimum swing angle (radians), of the anchor's local +X away from alignment.
    pub swing_limit_min: f64,
    /// Maximum swing angle (radians).
    pub swing_limit_max: f64,
}

impl Joint {
    /// A joint with both anchors at `local_pose_a`/`local_pose_b`, zero
    /// compliance/damping, all DOFs fixed, and no limits. Callers flip on
    /// the DOFs and limits they need.
    pub fn new(local_pose_a: Pose, local_pose_b: Pose) -> Self {
        Joint {
            local_pose_a,
            local_pose_b,
            position_compliance: 0.0,
            rotation_compliance: 0.0,
            position_damping: 0.0,
            rotation_damping: 0.0,
            free_dofs: 0,
            limited_dofs: 0,
            linear_limit: 0.0,
            twist_limit_min: 0.0,
            twist_limit_max: 0.0,
            swing_limit_min: 0.0,
            swing_limit_max: 0.0,
        }
    }

    fn world_anchor(&self, bodies: &Store<Body>, body: Option<Ref<Body>>, local: &Pose) -> Pose {
        body_pose(bodies, body).compose(local)
    }

    /// Runs the rotational and translational corrections appropriate to
    /// this joint's free-DOF mask.
    pub fn solve_positions(&mut self, bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, h_inv_sq: f64) {
        self.solve_rotation(bodies, body_a, body_b, h_inv_sq);
        self.solve_translation(bodies, body_a, body_b, h_inv_sq);
    }

    /// Applies linear and angular damping at the anchor points, if either
    /// damping coefficient is positive.
    pub fn solve_velocities(&mut self, bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, dt: f64, _h_inv_sq: f64) {
        if self.position_damping > 0.0 {
            let pose_a = self.world_anchor(bodies, body_a, &self.local_pose_a);
            let pose_b = self.world_anchor(bodies, body_b, &self.local_pose_b);
            damp_linear(bodies, body_a, body_b, pose_a.position, pose_b.position, self.position_damping, dt);
        }
        if self.rotation_damping > 0.0 {
            damp_angular(bodies, body_a, body_b, self.rotation_damping, dt);
        }
    }

    fn solve_rotation(&mut self, bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, h_inv_sq: f64) {
        let pose_a = self.world_anchor(bodies, body_a, &self.local_pose_a);
        let pose_b = self.world_anchor(bodies, body_b, &self.local_pose_b);

        let swing_free = self.free_dofs & DofMask::SWING != 0;
        let twist_free = self.free_dofs & DofMask::TWIST != 0;

        if !swing_free && !twist_free {
            self.solve_fixed_orientation(bodies, body_a, body_b, &pose_a, &pose_b, h_inv_sq);
        } else if swing_free {
            self.solve_spherical(bodies, body_a, body_b, &pose_a, &pose_b, h_inv_sq);
        } else {
            self.solve_hinge(bodies, body_a, body_b, &pose_a, &pose_b, h_inv_sq);
        }
    }

    fn solve_fixed_orientation(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        h_inv_sq: f64,
    ) {
        let mut q = pose_b.rotation * pose_a.rotation.conjugate();
        if q.s < 0.0 {
            q = Quat::new(-q.s, -q.v.x, -q.v.y, -q.v.z);
        }
        let delta = q.v * 2.0;
        correct(bodies, body_a, body_b, delta, self.rotation_compliance, h_inv_sq, None, None, false);
    }

    fn solve_spherical(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        h_inv_sq: f64,
    ) {
        let axis_a = pose_a.rotate(Vec3::unit_x());
        let axis_b = pose_b.rotate(Vec3::unit_x());
        let near_gimbal_lock = axis_a.dot(axis_b) < -0.5;
        let max_corr = if near_gimbal_lock { GIMBAL_LOCK_MAX_CORRECTION } else { MAX_ANGULAR_CORRECTION };

        if self.limited_dofs & DofMask::SWING != 0 {
            let swing_normal = safe_normalize(axis_a.cross(axis_b), orthogonal(axis_a));
            angle_limit_correction(
                bodies,
                body_a,
                body_b,
                swing_normal,
                axis_a,
                axis_b,
                self.swing_limit_min,
                self.swing_limit_max,
                max_corr,
                self.rotation_compliance,
                h_inv_sq,
            );
        }

        let twist_free = self.free_dofs & DofMask::TWIST != 0;
        let twist_limited = self.limited_dofs & DofMask::TWIST != 0;
        if twist_limited || !twist_free {
            let common_axis = safe_normalize(axis_a + axis_b, axis_a);
            let y_a = safe_normalize(pose_a.rotate(Vec3::unit_y()).project_on_plane(common_axis), orthogonal(common_axis));
            let y_b = safe_normalize(pose_b.rotate(Vec3::unit_y()).project_on_plane(common_axis), y_a);
            let (min_angle, max_angle) = if twist_limited { (self.twist_limit_min, self.twist_limit_max) } else { (0.0, 0.0) };
            angle_limit_correction(bodies, body_a, body_b, common_axis, y_a, y_b, min_angle, max_angle, max_corr, self.rotation_compliance, h_inv_sq);
        }
    }

    fn solve_hinge(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        h_inv_sq: f64,
    ) {
        let axis_a = pose_a.rotate(Vec3::unit_x());
        let axis_b = pose_b.rotate(Vec3::unit_x());

        let align = axis_a.cross(axis_b);
        correct(bodies, body_a, body_b, align, 0.0, h_inv_sq, None, None, false);

        if self.limited_dofs & DofMask::TWIST != 0 {
            let y_a = pose_a.rotate(Vec3::unit_y());
            let y_b = pose_b.rotate(Vec3::unit_y());
            angle_limit_correction(
                bodies,
                body_a,
                body_b,
                axis_a,
                y_a,
                y_b,
                self.twist_limit_min,
                self.twist_limit_max,
                MAX_ANGULAR_CORRECTION,
                self.rotation_compliance,
                h_inv_sq,
            );
        }
    }

    fn solve_translation(&mut self, bodies: &mut Store<Body>, body_a: Option<Ref<Body>>, body_b: Option<Ref<Body>>, h_inv_sq: f64) {
        let pose_a = self.world_anchor(bodies, body_a, &self.local_pose_a);
        let pose_b = self.world_anchor(bodies, body_b, &self.local_pose_b);

        let linear_free = self.free_dofs & DofMask::LINEAR != 0;
        let planar_free = self.free_dofs & DofMask::PLANAR != 0;

        if !linear_free && !planar_free {
            self.solve_fixed_position(bodies, body_a, body_b, &pose_a, &pose_b, h_inv_sq);
        } else if planar_free {
            self.solve_planar(bodies, body_a, body_b, &pose_a, &pose_b, linear_free, h_inv_sq);
        } else {
            self.solve_sliding(bodies, body_a, body_b, &pose_a, &pose_b, h_inv_sq);
        }
    }

    fn solve_fixed_position(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        h_inv_sq: f64,
    ) {
        let delta = pose_b.position - pose_a.position;
        correct(bodies, body_a, body_b, delta, self.position_compliance, h_inv_sq, Some(pose_a.position), Some(pose_b.position), false);
    }

    fn solve_planar(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        linear_free: bool,
        h_inv_sq: f64,
    ) {
        let delta = pose_b.position - pose_a.position;
        let axis = pose_a.rotate(Vec3::unit_x());

        if !linear_free {
            // Planar only: free to slide in the plane perpendicular to +X,
            // so correct away the component along +X.
            let along = delta.project_on(axis);
            correct(bodies, body_a, body_b, along, self.position_compliance, h_inv_sq, Some(pose_a.position), Some(pose_b.position), false);

            if self.limited_dofs & DofMask::PLANAR != 0 {
                let radial = delta - along;
                let radial_dist = radial.magnitude();
                if radial_dist > self.linear_limit {
                    let excess = radial * ((radial_dist - self.linear_limit) / radial_dist);
                    correct(bodies, body_a, body_b, excess, 0.0, h_inv_sq, Some(pose_a.position), Some(pose_b.position), false);
                }
            }
        } else {
            // Planar + Linear: prismatic, free to slide along +X, so
            // correct away any deviation within the perpendicular plane.
            let perpendicular = delta.project_on_plane(axis);
            correct(bodies, body_a, body_b, perpendicular, self.position_compliance, h_inv_sq, Some(pose_a.position), Some(pose_b.position), false);

            if self.limited_dofs & DofMask::LINEAR != 0 {
                self.apply_axis_distance_limit(bodies, body_a, body_b, pose_a, axis, delta, h_inv_sq);
            }
        }
    }

    fn solve_sliding(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        pose_b: &Pose,
        h_inv_sq: f64,
    ) {
        let delta = pose_b.position - pose_a.position;
        let axis = pose_a.rotate(Vec3::unit_x());

        let perpendicular = delta.project_on_plane(axis);
        correct(bodies, body_a, body_b, perpendicular, self.position_compliance, h_inv_sq, Some(pose_a.position), Some(pose_b.position), false);

        if self.limited_dofs & DofMask::LINEAR != 0 {
            self.apply_axis_distance_limit(bodies, body_a, body_b, pose_a, axis, delta, h_inv_sq);
        }
    }

    fn apply_axis_distance_limit(
        &self,
        bodies: &mut Store<Body>,
        body_a: Option<Ref<Body>>,
        body_b: Option<Ref<Body>>,
        pose_a: &Pose,
        axis: Vec3,
        delta: Vec3,
        h_inv_sq: f64,
    ) {
        let along = delta.dot(axis);
        if along.abs() > self.linear_limit {
            let excess = along.signum() * (along.abs() - self.linear_limit);
            let correction = axis * excess;
            let pos_b = pose_a.position + delta;
            correct(bodies, body_a, body_b, correction, 0.0, h_inv_sq, Some(pose_a.position), Some(pos_b), false);
        }
    }
}

fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.magnitude2() > EPSILON {
        v.normalize()
    } else {
        fallback
    }
}

fn orthogonal(v: Vec3) -> Vec3 {
    let seed = if v.x.abs() < 0.9 { Vec3::unit_x() } else { Vec3::unit_y() };
    safe_normalize(seed - v * seed.dot(v), Vec3::unit_z())
}

/// Computes the angle between `axis_a` and `axis_b` about `normal`, clamps
/// it into `[min_angle, max_angle]` if it falls outside that range, and
/// applies the corrective rotation (capped at `max_correction` radians per
/// call) to bring the two bodies back within the limit.
fn angle_limit_correction(
    bodies: &mut Store<Body>,
    body_a: Option<Ref<Body>>,
    body_b: Option<Ref<Body>>,
    normal: Vec3,
    axis_a: Vec3,
    axis_b: Vec3,
    min_angle: f64,
    max_angle: f64,
    max_correction: f64,
    compliance: f64,
    h_inv_sq: f64,
) {
    let cross = axis_a.cross(axis_b);
    let mut phi = clamp(cross.dot(normal), -1.0, 1.0).asin();
    if axis_a.dot(axis_b) < 0.0 {
        phi = std::f64::consts::PI - phi;
    }
    if phi > std::f64::consts::PI {
        phi -= 2.0 * std::f64::consts::PI;
    } else if phi <= -std::f64::consts::PI {
        phi += 2.0 * std::f64::consts::PI;
    }

    if phi >= min_angle && phi <= max_angle {
        return;
    }
    let clamped = clamp(phi, min_angle, max_angle);

    let rot = Quat::from_axis_angle(normal, cgmath::Rad(clamped));
    let rotated_a = rot * axis_a;
    let mut corrective = rotated_a.cross(axis_b);
    let mag = corrective.magnitude();
    if mag > max_correction && mag > EPSILON {
        corrective *= max_correction / mag;
    }
    correct(bodies, body_a, body_b, corrective, compliance, h_inv_sq, None, None, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use cgmath::One;

    fn free_body(pose: Pose) -> Body {
        let mut body = Body::new(BodyKind::Rigid, pose);
        body.inv_mass = 1.0;
        body.inv_inertia = Vec3::new(1.0, 1.0, 1.0);
        body
    }

    #[test]
    fn fixed_position_joint_pulls_bodies_to_a_common_anchor() {
        let mut bodies: Store<Body> = Store::new();
        let a = bodies.store(free_body(Pose::new(Vec3::new(0.0, 0.0, 0.0), Quat::one(), true)));
        let b = bodies.store(free_body(Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::one(), true)));

        let mut joint = Joint::new(Pose::identity(true), Pose::identity(true));
        joint.free_dofs = DofMask::TWIST | DofMask::SWING;

        let h_inv_sq = 1.0 / (1.0 / 60.0f64).powi(2);
        for _ in 0..200 {
            joint.solve_positions(&mut bodies, Some(a), Some(b), h_inv_sq);
        }

        let pos_a = bodies.get(a).unwrap().pose.position;
        let pos_b = bodies.get(b).unwrap().pose.position;
        assert!((pos_a - pos_b).magnitude() < 1e-3);
    }

    #[test]
    fn hinge_twist_limit_saturates_and_does_not_exceed() {
        let mut bodies: Store<Body> = Store::new();
        let a = bodies.store(free_body(Pose::identity(true)));
        let b = bodies.store(free_body(Pose::identity(true)));

        let mut joint = Joint::new(Pose::identity(true), Pose::identity(true));
        joint.free_dofs = DofMask::TWIST;
        joint.limited_dofs = DofMask::TWIST;
        joint.twist_limit_min = -std::f64::consts::FRAC_PI_4;
        joint.twist_limit_max = std::f64::consts::FRAC_PI_4;

        let h = 1.0 / 60.0;
        let h_inv_sq = 1.0 / (h * h);
        let torque = Vec3::new(10.0, 0.0, 0.0);
        for _ in 0..(120 * 10) {
            if let Some(body) = bodies.get_mut(b) {
                body.external_forces.angular += torque;
                body.integrate(h, Vec3::new(0.0, 0.0, 0.0));
            }
            if let Some(body) = bodies.get_mut(a) {
                body.integrate(h, Vec3::new(0.0, 0.0, 0.0));
            }
            joint.solve_positions(&mut bodies, Some(a), Some(b), h_inv_sq);
            if let Some(body) = bodies.get_mut(a) {
                body.differentiate(1.0 / h);
            }
            if let Some(body) = bodies.get_mut(b) {
                body.differentiate(1.0 / h);
            }
        }

        let rot_a = bodies.get(a).unwrap().pose.rotation;
        let rot_b = bodies.get(b).unwrap().pose.rotation;
        let relative = rot_a.conjugate() * rot_b;
        let axis = Vec3::unit_x();
        let twist_vec = relative.v.project_on(axis);
        let mut twist_angle = 2.0 * twist_vec.magnitude().atan2(relative.s);
        if twist_vec.dot(axis) < 0.0 {
            twist_angle = -twist_angle;
        }
        assert!(twist_angle.abs() <= std::f64::consts::FRAC_PI_4 + 1e-2);
    }
}
