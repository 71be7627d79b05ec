//! Geometric primitives shared by every other module.
//!
//! Precision is fixed at `f64` for the whole crate, matching the reference
//! implementation. [`cgmath`] supplies the vector/quaternion/matrix algebra;
//! this module only adds the handful of operations the reference
//! implementation leans on that `cgmath` does not provide directly
//! (`project_on_plane`, `sign`, ...).

use cgmath::{InnerSpace, Quaternion, Vector3, Zero};

pub mod bounds;
pub mod geom;
pub mod pose;
pub mod ray;

pub use bounds::Bounds;
pub use pose::Pose;
pub use ray::Ray;

/// A point or direction in 3-space.
pub type Vec3 = Vector3<f64>;

/// A unit or non-unit quaternion.
pub type Quat = Quaternion<f64>;

/// A 3x3 matrix, used for inertia tensors.
pub type Mat3 = cgmath::Matrix3<f64>;

/// Numerical tolerance used throughout the narrowphase and joint solvers.
pub const EPSILON: f64 = 1e-9;

/// Extension methods on [`Vec3`] that the reference implementation exposes
/// but `cgmath` does not provide as inherent methods.
pub trait Vec3Ext {
    /// Projects `self` onto `other`. `other` need not be normalized.
    fn project_on(self, other: Vec3) -> Vec3;
    /// Projects `self` onto the plane whose normal is `normal` (assumed unit length).
    fn project_on_plane(self, normal: Vec3) -> Vec3;
    /// Reflects `self` about the plane whose normal is `normal` (assumed unit length).
    fn reflect(self, normal: Vec3) -> Vec3;
    /// Component-wise sign, with `sign(0) == 0`.
    fn sign(self) -> Vec3;
    /// Component-wise absolute value.
    fn abs(self) -> Vec3;
}

impl Vec3Ext for Vec3 {
    fn project_on(self, other: Vec3) -> Vec3 {
        let denom = other.dot(other);
        if denom <= EPSILON {
            Vec3::zero()
        } else {
            other * (self.dot(other) / denom)
        }
    }

    fn project_on_plane(self, normal: Vec3) -> Vec3 {
        self - normal * self.dot(normal)
    }

    fn reflect(self, normal: Vec3) -> Vec3 {
        self - normal * (2.0 * self.dot(normal))
    }

    fn sign(self) -> Vec3 {
        Vec3::new(sign(self.x), sign(self.y), sign(self.z))
    }

    fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }
}

/// Scalar sign function with `sign(0) == 0`, matching `Math::sign` in the
/// reference implementation (as opposed to `f64::signum`, which returns
/// +-1 for zero).
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// `true` if `a` and `b` are within [`EPSILON`] of each other.
pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Clamps `v` into `[min, max]`.
pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}
