//! Capsule shape: a swept sphere along a medial segment running along
//! local +X with the given half-length.

use crate::math::{approx, geom, Bounds, Pose, Ray, Vec3};
use cgmath::InnerSpace;

fn local_caps(length: f64) -> (Vec3, Vec3) {
    let l_2 = length * 0.5;
    (Vec3::new(-l_2, 0.0, 0.0), Vec3::new(l_2, 0.0, 0.0))
}

/// World-space bounds: the union of spheres of `radius` at each end of the
/// medial segment.
pub fn bounds(radius: f64, length: f64, world_pose: &Pose) -> Bounds {
    let (c0, c1) = local_caps(length);
    let c0 = world_pose.transform(c0);
    let c1 = world_pose.transform(c1);
    let mut bounds = Bounds::new(c0, Vec3::new(radius, radius, radius));
    bounds.merge_bounds(&Bounds::new(c1, Vec3::new(radius, radius, radius)));
    bounds
}

/// Raycasts a capsule in world space against its transformed medial segment.
pub fn raycast(radius: f64, length: f64, world_pose: &Pose, ray: &Ray, max_distance: f64) -> Option<(Vec3, Vec3, f64)> {
    let (c0, c1) = local_caps(length);
    let c0 = world_pose.transform(c0);
    let c1 = world_pose.transform(c1);
    geom::raycast_capsule(c0, c1, radius, ray.origin, ray.direction(), max_distance)
}

/// The support point: whichever end of the medial segment is farther along
/// `axis`, offset outward by `radius` along `axis`.
pub fn local_support(radius: f64, length: f64, axis: Vec3) -> Vec3 {
    let (c0, c1) = local_caps(length);
    let dot0 = axis.dot(c0);
    let dot1 = axis.dot(c1);

    if approx(dot0, dot1) {
        return axis * radius;
    }

    let chosen = if dot1 > dot0 { c1 } else { c0 };
    chosen + axis * radius
}
