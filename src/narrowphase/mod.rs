//! Contact generation between two colliders: closed forms for the four
//! primitive pairs that have one, GJK+EPA over the Minkowski difference for
//! everything else.
//!
//! Dispatch mirrors the reference implementation's `shapeA | shapeB`
//! function-pointer table, but resolved per-call via a `match` on the
//! concrete `Shape` pair rather than cached: there is no per-contact heap
//! state to keep in sync, and the match costs nothing next to the
//! narrowphase math itself (see design notes on dispatch).

mod closed_form;
mod polytope;
mod simplex;

use crate::collider::{Collider, Shape};
use crate::math::{Pose, Vec3};
use cgmath::{InnerSpace, Rotation3};
use polytope::{PolyVertex, Polytope};
use simplex::Simplex;

/// A single contact between two colliders: local-space anchor points on
/// each, the world-space separating normal (pointing from B toward A), and
/// the penetration depth.
#[derive(Clone, Copy, Debug)]
pub struct ContactPoint {
    /// Contact anchor, in A's local frame.
    pub point_a: Vec3,
    /// Contact anchor, in B's local frame.
    pub point_b: Vec3,
    /// World-space separating normal, pointing from B toward A.
    pub normal: Vec3,
    /// Penetration depth along `normal`.
    pub depth: f64,
}

fn swapped(contact: ContactPoint) -> ContactPoint {
    ContactPoint {
        point_a: contact.point_b,
        point_b: contact.point_a,
        normal: -contact.normal,
        depth: contact.depth,
    }
}

/// Computes the contact (if any) between `a` and `b`, given their resolved
/// world poses. `gjk_max_iterations`/`epa_max_iterations` bound the general
/// case; closed-form pairs ignore them.
pub fn compute(
    a: &Collider,
    pose_a: &Pose,
    b: &Collider,
    pose_b: &Pose,
    gjk_max_iterations: u32,
    epa_max_iterations: u32,
) -> Option<ContactPoint> {
    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            closed_form::sphere_sphere(pose_a, ra, pose_b, rb)
        }
        (Shape::Capsule { radius: ra, length: la }, Shape::Capsule { radius: rb, length: lb }) => {
            closed_form::capsule_capsule(pose_a, ra, la, pose_b, rb, lb)
        }
        (Shape::Sphere { radius: ra }, Shape::Capsule { radius: rb, length: lb }) => {
            closed_form::sphere_capsule(pose_a, ra, pose_b, rb, lb)
        }
        (Shape::Capsule { radius: ra, length: la }, Shape::Sphere { radius: rb }) => {
            closed_form::sphere_capsule(pose_b, rb, pose_a, ra, la).map(swapped)
        }
        (Shape::Box { extents }, Shape::Sphere { radius }) => {
            closed_form::box_sphere(pose_a, extents, pose_b, radius)
        }
        (Shape::Sphere { radius }, Shape::Box { extents }) => {
            closed_form::box_sphere(pose_b, extents, pose_a, radius).map(swapped)
        }
        _ => gjk_epa(a, pose_a, b, pose_b, gjk_max_iterations, epa_max_iterations),
    }
}

/// The CSO support point along world-space `axis`, plus the world-space
/// support points on A and B that produced it.
fn cso_support(a: &Collider, pose_a: &Pose, b: &Collider, pose_b: &Pose, axis: Vec3) -> (Vec3, Vec3, Vec3) {
    let axis_a = Collider::vector_to_local(pose_a, axis);
    let axis_b = Collider::vector_to_local(pose_b, -axis);
    let support_a = Collider::point_to_world(pose_a, a.local_support(axis_a));
    let support_b = Collider::point_to_world(pose_b, b.local_support(axis_b));
    (support_a - support_b, support_a, support_b)
}

/// GJK: decides whether the origin lies in the CSO `A - B`, returning the
/// terminal simplex (for EPA to expand) on intersection.
fn gjk(a: &Collider, pose_a: &Pose, b: &Collider, pose_b: &Pose, max_iterations: u32) -> Option<Simplex> {
    let mut simplex = Simplex::new();
    let (p0, sa0, sb0) = cso_support(a, pose_a, b, pose_b, Vec3::new(1.0, 0.0, 0.0));
    simplex.add(p0, sa0, sb0);

    for _ in 0..max_iterations {
        let (nearest, dim, idx) = simplex.nearest();
        if nearest.dot(nearest) < crate::math::EPSILON {
            return Some(simplex);
        }
        simplex.reduce(dim, idx);

        let search = -nearest.normalize();
        let (p, sa, sb) = cso_support(a, pose_a, b, pose_b, search);
        if search.dot(p) <= search.dot(nearest) {
            return None;
        }
        simplex.add(p, sa, sb);
    }
    None
}

const EPA_EPSILON: f64 = 1e-9;

fn orthogonal(v: Vec3) -> Vec3 {
    let seed = if v.x.abs() < 0.9 { Vec3::new(1.0, 0.0, 0.0) } else { Vec3::new(0.0, 1.0, 0.0) };
    let perp = seed - v * seed.dot(v);
    if perp.magnitude2() > crate::math::EPSILON {
        perp.normalize()
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    }
}

/// Expands a 1-, 2-, or 3-vertex simplex into a non-degenerate tetrahedron
/// via axis-aligned and rotated support searches, matching the reference
/// implementation's EPA bootstrap. Returns `false` if no further support
/// point breaks degeneracy (a near-zero-volume CSO, treated as "no
/// contact").
fn expand_to_tetrahedron(a: &Collider, pose_a: &Pose, b: &Collider, pose_b: &Pose, simplex: &mut Simplex) -> bool {
    if simplex.count() == 1 {
        let v0 = simplex.vertex(0).p;
        let dirs = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        let mut found = false;
        for d in dirs {
            let (p, sa, sb) = cso_support(a, pose_a, b, pose_b, d);
            if (p - v0).magnitude2() > EPA_EPSILON {
                simplex.add(p, sa, sb);
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }

    if simplex.count() == 2 {
        let v0 = simplex.vertex(0).p;
        let v1 = simplex.vertex(1).p;
        let axis = v1 - v0;
        let axis_len_sq = axis.dot(axis);
        let axis_dir = if axis_len_sq > EPA_EPSILON { axis / axis_len_sq.sqrt() } else { Vec3::new(1.0, 0.0, 0.0) };
        let seed = orthogonal(axis_dir);

        let mut found = false;
        for i in 0..6 {
            let angle = cgmath::Rad(std::f64::consts::FRAC_PI_3 * i as f64);
            let rot = cgmath::Quaternion::from_axis_angle(axis_dir, angle);
            let dir = rot * seed;
            let (p, sa, sb) = cso_support(a, pose_a, b, pose_b, dir);
            let t = if axis_len_sq > EPA_EPSILON { (p - v0).dot(axis) / axis_len_sq } else { 0.0 };
            let on_line = v0 + axis * t;
            if (p - on_line).magnitude2() > EPA_EPSILON {
                simplex.add(p, sa, sb);
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }

    if simplex.count() == 3 {
        let v0 = simplex.vertex(0).p;
        let v1 = simplex.vertex(1).p;
        let v2 = simplex.vertex(2).p;
        let raw_normal = (v1 - v0).cross(v2 - v0);
        let normal = if raw_normal.magnitude2() > EPA_EPSILON {
            raw_normal.normalize()
        } else {
            Vec3::new(1.0, 0.0, 0.0)
        };

        let (p, sa, sb) = cso_support(a, pose_a, b, pose_b, normal);
        let side = (p - v0).dot(normal);
        if side < 0.0 {
            let (p2, sa2, sb2) = cso_support(a, pose_a, b, pose_b, -normal);
            simplex.add(p2, sa2, sb2);
        } else {
            simplex.add(p, sa, sb);
        }
    }

    simplex.count() == 4
}

fn gjk_epa(
    a: &Collider,
    pose_a: &Pose,
    b: &Collider,
    pose_b: &Pose,
    gjk_max_iterations: u32,
    epa_max_iterations: u32,
) -> Option<ContactPoint> {
    let mut simplex = gjk(a, pose_a, b, pose_b, gjk_max_iterations)?;
    if !expand_to_tetrahedron(a, pose_a, b, pose_b, &mut simplex) {
        return None;
    }

    let to_poly_vertex = |v: simplex::Vertex| PolyVertex { p: v.p, a: v.a, b: v.b };
    let mut poly = Polytope::from_tetrahedron(
        to_poly_vertex(simplex.vertex(0)),
        to_poly_vertex(simplex.vertex(1)),
        to_poly_vertex(simplex.vertex(2)),
        to_poly_vertex(simplex.vertex(3)),
    );

    let (mut nearest, mut tri_idx, mut len_sq) = poly.nearest();

    for _ in 0..epa_max_iterations {
        let search = poly.normal_at(tri_idx);
        let (p, sa, sb) = cso_support(a, pose_a, b, pose_b, search);
        if !poly.expand(p, sa, sb, tri_idx) {
            break;
        }

        let (new_nearest, new_tri, new_len_sq) = poly.nearest();
        let converged = (len_sq.sqrt() - new_len_sq.sqrt()).abs() < EPA_EPSILON;
        nearest = new_nearest;
        tri_idx = new_tri;
        len_sq = new_len_sq;
        if converged {
            break;
        }
    }

    let depth = len_sq.sqrt();
    if depth <= crate::math::EPSILON {
        return None;
    }
    let normal = nearest / -depth;
    let (on_a_world, on_b_world) = poly.lift(tri_idx, nearest);

    Some(ContactPoint {
        point_a: pose_a.inverse_transform(on_a_world),
        point_b: pose_b.inverse_transform(on_b_world),
        normal,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use cgmath::One;

    fn box_collider(extents: Vec3) -> Collider {
        Collider::new(Shape::new_box(extents).unwrap(), Pose::identity(true), 1)
    }

    fn pose_at(p: Vec3) -> Pose {
        Pose::new(p, Quat::one(), true)
    }

    #[test]
    fn gjk_epa_agrees_with_closed_form_on_overlapping_boxes() {
        let a = box_collider(Vec3::new(1.0, 1.0, 1.0));
        let b = box_collider(Vec3::new(1.0, 1.0, 1.0));
        let pose_a = pose_at(Vec3::new(0.0, 0.0, 0.0));
        let pose_b = pose_at(Vec3::new(1.5, 0.0, 0.0));

        let contact = compute(&a, &pose_a, &b, &pose_b, 16, 28);
        assert!(contact.is_some());
        let contact = contact.unwrap();
        assert!((contact.depth - 0.5).abs() < 1e-3);
    }

    #[test]
    fn gjk_epa_reports_none_for_separated_boxes() {
        let a = box_collider(Vec3::new(1.0, 1.0, 1.0));
        let b = box_collider(Vec3::new(1.0, 1.0, 1.0));
        let pose_a = pose_at(Vec3::new(0.0, 0.0, 0.0));
        let pose_b = pose_at(Vec3::new(10.0, 0.0, 0.0));

        assert!(compute(&a, &pose_a, &b, &pose_b, 16, 28).is_none());
    }
}
