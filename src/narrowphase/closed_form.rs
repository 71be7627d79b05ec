//! Closed-form penetration tests for primitive pairs that don't need the
//! general GJK/EPA machinery: sphere-sphere, capsule-capsule,
//! sphere-capsule, box-sphere.

use super::ContactPoint;
use crate::math::{sign, Bounds, Pose, Vec3};
use cgmath::InnerSpace;

fn capsule_caps(length: f64) -> (Vec3, Vec3) {
    let l_2 = length * 0.5;
    (Vec3::new(-l_2, 0.0, 0.0), Vec3::new(l_2, 0.0, 0.0))
}

/// Builds a contact from a shared reference `center`/`radius` on B's side of
/// the pair, plus the separating `normal` (pointing from B toward A) and
/// penetration `depth`. Both `sphere_sphere` and `sphere_capsule` reduce to
/// this same shape once the nearest reference point on B is known.
fn make_contact(pose_a: &Pose, pose_b: &Pose, center: Vec3, radius_b: f64, normal: Vec3, depth: f64) -> ContactPoint {
    let point_a_world = center + normal * (radius_b - depth);
    let point_b_world = center + normal * radius_b;
    ContactPoint {
        point_a: pose_a.inverse_transform(point_a_world),
        point_b: pose_b.inverse_transform(point_b_world),
        normal,
        depth,
    }
}

/// Sphere A vs sphere B.
pub fn sphere_sphere(pose_a: &Pose, radius_a: f64, pose_b: &Pose, radius_b: f64) -> Option<ContactPoint> {
    let b_center = pose_b.transform(Vec3::new(0.0, 0.0, 0.0));
    let to_a = pose_a.transform(Vec3::new(0.0, 0.0, 0.0)) - b_center;
    let rs = radius_a + radius_b;
    let len_sq = to_a.dot(to_a);
    if len_sq >= rs * rs {
        return None;
    }
    let len = len_sq.sqrt();
    let normal = if len > crate::math::EPSILON { to_a / len } else { Vec3::new(0.0, 1.0, 0.0) };
    Some(make_contact(pose_a, pose_b, b_center, radius_b, normal, rs - len))
}

/// Capsule A vs capsule B: nearest points between medial segments, then a
/// sphere-sphere-style test with the combined radii.
pub fn capsule_capsule(
    pose_a: &Pose,
    radius_a: f64,
    length_a: f64,
    pose_b: &Pose,
    radius_b: f64,
    length_b: f64,
) -> Option<ContactPoint> {
    let (a0l, a1l) = capsule_caps(length_a);
    let (b0l, b1l) = capsule_caps(length_b);
    let a0 = pose_a.transform(a0l);
    let a1 = pose_a.transform(a1l);
    let b0 = pose_b.transform(b0l);
    let b1 = pose_b.transform(b1l);

    let (near_a, near_b) = crate::math::geom::nearest_on_segments(a0, a1, b0, b1);
    let to_a = near_a - near_b;
    let rs = radius_a + radius_b;
    let len_sq = to_a.dot(to_a);
    if len_sq >= rs * rs {
        return None;
    }
    let len = len_sq.sqrt();
    let normal = if len > crate::math::EPSILON { to_a / len } else { Vec3::new(0.0, 1.0, 0.0) };
    Some(make_contact(pose_a, pose_b, near_b, radius_b, normal, rs - len))
}

/// Sphere A vs capsule B: nearest point on B's medial segment to A's center.
pub fn sphere_capsule(
    pose_a: &Pose,
    radius_a: f64,
    pose_b: &Pose,
    radius_b: f64,
    length_b: f64,
) -> Option<ContactPoint> {
    let (b0l, b1l) = capsule_caps(length_b);
    let b0 = pose_b.transform(b0l);
    let b1 = pose_b.transform(b1l);

    let sphere_center = pose_a.transform(Vec3::new(0.0, 0.0, 0.0));
    let nearest_on_b = crate::math::geom::nearest_on_segment(sphere_center, b0, b1);

    let to_a = sphere_center - nearest_on_b;
    let rs = radius_a + radius_b;
    let len_sq = to_a.dot(to_a);
    if len_sq >= rs * rs {
        return None;
    }
    let len = len_sq.sqrt();
    let normal = if len > crate::math::EPSILON { to_a / len } else { Vec3::new(0.0, 1.0, 0.0) };
    Some(make_contact(pose_a, pose_b, nearest_on_b, radius_b, normal, rs - len))
}

/// Box A vs sphere B. When the sphere's center lies inside the box, picks
/// the least-penetrating face; otherwise uses the nearest point on the box
/// surface. The depth formula for the inside case matches the face-extent
/// minus offset plus radius convention the reference implementation uses.
pub fn box_sphere(pose_a: &Pose, extents: Vec3, pose_b: &Pose, radius_b: f64) -> Option<ContactPoint> {
    let sphere_center = pose_b.transform(Vec3::new(0.0, 0.0, 0.0));
    let c = pose_a.inverse_transform(sphere_center);

    let bounds = Bounds::new(Vec3::new(0.0, 0.0, 0.0), extents);
    let inside = bounds.contains(c);

    let (local_point, local_normal, depth) = if inside {
        let dx = extents.x - c.x.abs();
        let dy = extents.y - c.y.abs();
        let dz = extents.z - c.z.abs();

        if dx <= dy && dx <= dz {
            (Vec3::new(sign(c.x) * extents.x, c.y, c.z), Vec3::new(-sign(c.x), 0.0, 0.0), dx + radius_b)
        } else if dy <= dz {
            (Vec3::new(c.x, sign(c.y) * extents.y, c.z), Vec3::new(0.0, -sign(c.y), 0.0), dy + radius_b)
        } else {
            (Vec3::new(c.x, c.y, sign(c.z) * extents.z), Vec3::new(0.0, 0.0, -sign(c.z)), dz + radius_b)
        }
    } else {
        let nearest = bounds.nearest(c);
        let diff = nearest - c;
        let dist_sq = diff.dot(diff);
        if dist_sq >= radius_b * radius_b {
            return None;
        }
        let dist = dist_sq.sqrt();
        if dist <= crate::math::EPSILON {
            return None;
        }
        (nearest, diff / dist, radius_b - dist)
    };

    let point_a_world = pose_a.transform(local_point);
    let normal = pose_a.rotate(local_normal);
    let point_b_world = sphere_center + normal * radius_b;

    Some(ContactPoint {
        point_a: pose_a.inverse_transform(point_a_world),
        point_b: pose_b.inverse_transform(point_b_world),
        normal,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use cgmath::One;

    fn pose_at(p: Vec3) -> Pose {
        Pose::new(p, Quat::one(), true)
    }

    #[test]
    fn overlapping_spheres_report_correct_depth() {
        let a = pose_at(Vec3::new(0.0, 0.0, 0.0));
        let b = pose_at(Vec3::new(1.5, 0.0, 0.0));
        let contact = sphere_sphere(&a, 1.0, &b, 1.0).unwrap();
        assert!((contact.depth - 0.5).abs() < 1e-9);
        assert!((contact.normal - Vec3::new(-1.0, 0.0, 0.0)).magnitude() < 1e-9);
    }

    #[test]
    fn separated_spheres_report_none() {
        let a = pose_at(Vec3::new(0.0, 0.0, 0.0));
        let b = pose_at(Vec3::new(5.0, 0.0, 0.0));
        assert!(sphere_sphere(&a, 1.0, &b, 1.0).is_none());
    }

    #[test]
    fn sphere_inside_box_uses_least_penetrating_face() {
        let box_pose = pose_at(Vec3::new(0.0, 0.0, 0.0));
        let sphere_pose = pose_at(Vec3::new(0.9, 0.0, 0.0));
        let contact = box_sphere(&box_pose, Vec3::new(1.0, 1.0, 1.0), &sphere_pose, 0.5).unwrap();
        assert!((contact.depth - (0.5 + 0.1)).abs() < 1e-9);
        // normal points from B (sphere) toward A (box): sphere sits on the
        // +x side, so the separating normal points back toward -x.
        assert!((contact.normal - Vec3::new(-1.0, 0.0, 0.0)).magnitude() < 1e-9);
    }

    #[test]
    fn sphere_resting_on_box_surface_normal_points_from_sphere_to_box() {
        let box_pose = pose_at(Vec3::new(0.0, 0.0, 0.0));
        // Box half-extents (1,1,1): top face at y = 1. Sphere of radius 0.5
        // centered slightly below y = 1.5, overlapping the top face from outside.
        let sphere_pose = pose_at(Vec3::new(0.0, 1.4, 0.0));
        let contact = box_sphere(&box_pose, Vec3::new(1.0, 1.0, 1.0), &sphere_pose, 0.5).unwrap();
        assert!((contact.depth - 0.1).abs() < 1e-9);
        assert!((contact.normal - Vec3::new(0.0, -1.0, 0.0)).magnitude() < 1e-9);
    }
}
