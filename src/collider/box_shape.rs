//! Box shape: bounds, raycast, and support, all in terms of a box centered
//! at the local origin with the given half-extents.

use crate::math::{geom, sign, Bounds, Pose, Ray, Vec3};

/// World-space AABB of a box with half-extents `extents` under `world_pose`,
/// built by merging all eight transformed corners (cheaper to read than
/// exact trigonometric projections and exact regardless of rotation).
pub fn bounds(extents: Vec3, world_pose: &Pose) -> Bounds {
    let corners = [
        Vec3::new(extents.x, extents.y, extents.z),
        Vec3::new(extents.x, -extents.y, extents.z),
        Vec3::new(extents.x, -extents.y, -extents.z),
        Vec3::new(extents.x, extents.y, -extents.z),
        Vec3::new(-extents.x, extents.y, extents.z),
        Vec3::new(-extents.x, -extents.y, extents.z),
        Vec3::new(-extents.x, -extents.y, -extents.z),
        Vec3::new(-extents.x, extents.y, -extents.z),
    ];
    let mut bounds = Bounds::new(world_pose.transform(corners[0]), Vec3::new(0.0, 0.0, 0.0));
    for corner in &corners[1..] {
        bounds.merge(world_pose.transform(*corner));
    }
    bounds
}

/// Raycasts a box by transforming the ray into the box's local frame.
pub fn raycast(extents: Vec3, world_pose: &Pose, ray: &Ray, max_distance: f64) -> Option<(Vec3, Vec3, f64)> {
    let local_origin = world_pose.inverse_transform(ray.origin);
    let local_dir = world_pose.inverse_rotate(ray.direction());
    let (point, normal, t) = geom::raycast_box(extents, local_origin, local_dir, max_distance)?;
    Some((world_pose.transform(point), world_pose.rotate(normal), t))
}

/// The support point of a box along local-space `axis`: whichever corner is
/// farthest in that direction, picked per-axis via the sign of `axis`.
pub fn local_support(extents: Vec3, axis: Vec3) -> Vec3 {
    Vec3::new(sign(axis.x) * extents.x, sign(axis.y) * extents.y, sign(axis.z) * extents.z)
}
