//! Cylinder shape: axis along local +X, no end-cap rounding (flat caps).

use crate::math::{approx, geom, Bounds, Pose, Ray, Vec3, Vec3Ext};
use cgmath::InnerSpace;

fn local_caps(length: f64) -> (Vec3, Vec3) {
    let l_2 = length * 0.5;
    (Vec3::new(-l_2, 0.0, 0.0), Vec3::new(l_2, 0.0, 0.0))
}

/// World-space bounds, computed directly from the world-space axis rather
/// than by merging transformed corners -- tighter than a capsule-style
/// sphere union since the caps are flat, not rounded.
pub fn bounds(radius: f64, length: f64, world_pose: &Pose) -> Bounds {
    let l_2 = length * 0.5;
    let axis = world_pose.rotate(Vec3::new(1.0, 0.0, 0.0));
    let center = world_pose.transform(Vec3::new(0.0, 0.0, 0.0));

    let extent = |a: f64| (a * l_2).abs() + radius * (1.0 - a * a).max(0.0).sqrt();
    Bounds::new(center, Vec3::new(extent(axis.x), extent(axis.y), extent(axis.z)))
}

/// Raycasts a cylinder (no end caps) in world space.
pub fn raycast(radius: f64, length: f64, world_pose: &Pose, ray: &Ray, max_distance: f64) -> Option<(Vec3, Vec3, f64)> {
    let (c0, c1) = local_caps(length);
    let c0 = world_pose.transform(c0);
    let c1 = world_pose.transform(c1);
    geom::raycast_cylinder(c0, c1, radius, ray.origin, ray.direction(), max_distance)
}

/// The support point: nearest cap along the axis, offset radially outward
/// by the component of `axis` perpendicular to the cylinder's own axis.
pub fn local_support(radius: f64, length: f64, axis: Vec3) -> Vec3 {
    let (c0, c1) = local_caps(length);
    let dot0 = axis.dot(c0);
    let dot1 = axis.dot(c1);

    if approx(dot0, dot1) {
        return axis * radius;
    }

    let chosen = if dot1 > dot0 { c1 } else { c0 };

    let n = axis.project_on_plane(Vec3::new(1.0, 0.0, 0.0));
    let len_sq = n.dot(n);
    if approx(len_sq, 0.0) {
        return chosen;
    }
    chosen + n.normalize() * radius
}
