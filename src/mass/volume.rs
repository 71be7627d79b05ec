//! Closed-form volume formulas for the four primitive shapes, shared between
//! [`crate::collider::Collider::volume`] and the mass computer's density scaling.

use std::f64::consts::PI;

use crate::math::Vec3;

/// Volume of a box with the given half-extents.
pub fn box_volume(extents: Vec3) -> f64 {
    8.0 * extents.x * extents.y * extents.z
}

/// Volume of a sphere of the given radius.
pub fn sphere_volume(radius: f64) -> f64 {
    (4.0 / 3.0) * PI * radius * radius * radius
}

/// Volume of a capsule: a cylinder of the given length plus a full sphere
/// (the two half-sphere caps) of the given radius.
pub fn capsule_volume(radius: f64, length: f64) -> f64 {
    sphere_volume(radius) + PI * radius * radius * length
}

/// Volume of a cylinder of the given radius and length.
pub fn cylinder_volume(radius: f64, length: f64) -> f64 {
    PI * radius * radius * length
}
