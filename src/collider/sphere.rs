//! Sphere shape: centered at the collider's local origin, no orientation
//! dependence (see `Collider::has_rotation`).

use crate::math::{geom, Bounds, Pose, Ray, Vec3};

/// World-space bounds of a sphere of the given `radius`.
pub fn bounds(radius: f64, world_pose: &Pose) -> Bounds {
    Bounds::new(world_pose.transform(Vec3::new(0.0, 0.0, 0.0)), Vec3::new(radius, radius, radius))
}

/// Raycasts a sphere directly in world space; no local transform needed
/// since a sphere looks the same from every orientation.
pub fn raycast(radius: f64, world_pose: &Pose, ray: &Ray, max_distance: f64) -> Option<(Vec3, Vec3, f64)> {
    let center = world_pose.transform(Vec3::new(0.0, 0.0, 0.0));
    geom::raycast_sphere(center, radius, ray.origin, ray.direction(), max_distance)
}

/// The support point of a sphere along `axis`: the point `axis * radius`,
/// regardless of whether `axis` is normalized (matching the reference's
/// unnormalized support convention -- GJK always calls this with a unit
/// search direction in practice).
pub fn local_support(radius: f64, axis: Vec3) -> Vec3 {
    axis * radius
}
