//! Free-standing closest-point and raycast helpers shared by the narrowphase
//! closed forms and the per-shape collider raycasts.

use super::{clamp, sign, Vec3};
use cgmath::{InnerSpace, Zero};

/// Nearest point on segment `a0..a1` to `point`.
pub fn nearest_on_segment(point: Vec3, a0: Vec3, a1: Vec3) -> Vec3 {
    let u = a1 - a0;
    let v = point - a0;
    let len_sq = u.dot(u);
    if len_sq <= super::EPSILON {
        return a0;
    }
    let t = clamp(v.dot(u) / len_sq, 0.0, 1.0);
    a0 + u * t
}

/// Nearest point on the ray `r0 + n*t, t >= 0` to `point`.
pub fn nearest_on_ray(point: Vec3, r0: Vec3, n: Vec3) -> Vec3 {
    r0 + n * (point - r0).dot(n).max(0.0)
}

/// Nearest point on triangle `abc` to `point`, via signed barycentric areas
/// of the point's projection onto the triangle's plane.
pub fn nearest_on_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let u = b - a;
    let v = c - a;
    let n = u.cross(v);
    let nn = n.dot(n);
    if nn <= super::EPSILON {
        // degenerate triangle: fall back to nearest edge
        let e0 = nearest_on_segment(point, a, b);
        let e1 = nearest_on_segment(point, b, c);
        let e2 = nearest_on_segment(point, c, a);
        return [e0, e1, e2]
            .into_iter()
            .min_by(|p, q| (*p - point).magnitude2().partial_cmp(&(*q - point).magnitude2()).unwrap())
            .unwrap();
    }

    let w = point - a;
    let proj = w - n * (w.dot(n) / nn);

    let uxp = u.cross(proj);
    let pxv = proj.cross(v);
    let area_u = uxp.magnitude2() * sign(uxp.dot(n));
    let area_v = pxv.magnitude2() * sign(pxv.dot(n));

    let s = area_u / nn;
    let t = area_v / nn;

    if s >= 0.0 && t >= 0.0 && s.sqrt() + t.sqrt() <= 1.0 {
        return a + proj;
    }

    if s < 0.0 {
        return nearest_on_segment(point, b, c);
    }
    if t < 0.0 {
        return nearest_on_segment(point, c, a);
    }
    nearest_on_segment(point, a, b)
}

/// Nearest point on tetrahedron `abcd` to `point` (assumed the origin-local
/// query used by GJK's simplex reduction is translated into this frame by
/// the caller).
pub fn nearest_on_tetrahedron(point: Vec3, a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let norm_abc = ab.cross(ac);

    let ap = point - a;
    let vol = ad.dot(norm_abc);
    let v0 = ap.dot(norm_abc);

    let norm_abd = ab.cross(ad);
    let v1 = ap.dot(norm_abd) * sign(ac.dot(norm_abd));

    let norm_acd = ac.cross(ad);
    let v2 = ap.dot(norm_acd) * sign(ab.dot(norm_acd));

    if vol.abs() <= super::EPSILON {
        return nearest_on_triangle(point, a, b, c);
    }

    let s = v0 / vol;
    let t = v1 / vol.abs();
    let u = v2 / vol.abs();

    if s >= 0.0 && t >= 0.0 && u >= 0.0 && s + t + u <= 1.0 {
        return point;
    }

    if s < 0.0 {
        return nearest_on_triangle(point, a, b, c);
    }
    if t < 0.0 {
        return nearest_on_triangle(point, a, b, d);
    }
    if u < 0.0 {
        return nearest_on_triangle(point, a, c, d);
    }
    nearest_on_triangle(point, b, c, d)
}

/// Nearest points between two segments `a0..a1` and `b0..b1`, handling the
/// degenerate (point) and near-parallel cases the closed-form capsule pair
/// tests rely on.
pub fn nearest_on_segments(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> (Vec3, Vec3) {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;

    let uu = d1.dot(d1);
    let vv = d2.dot(d2);
    let uv = d1.dot(d2);

    if uu <= super::EPSILON && vv <= super::EPSILON {
        return (a0, b0);
    }
    if uu <= super::EPSILON {
        let b = nearest_on_segment(a0, b0, b1);
        return (a0, b);
    }
    if vv <= super::EPSILON {
        let a = nearest_on_segment(b0, a0, a1);
        return (a, b0);
    }

    let ur = d1.dot(r);
    let vr = d2.dot(r);
    let det = uu * vv - uv * uv;

    let (mut s, mut t);
    if det < 1e-9 * uu * vv {
        // Nearly parallel: pick a fixed parameter and solve the remaining 1D problem.
        s = 0.0;
        t = vr / vv;
    } else {
        s = (uv * vr - vv * ur) / det;
        t = (uu * vr - uv * ur) / det;
    }

    s = clamp(s, 0.0, 1.0);
    t = clamp(t, 0.0, 1.0);

    // One back-substitution pass to keep both parameters consistent after clamping.
    let a = a0 + d1 * s;
    t = clamp((a - b0).dot(d2) / vv, 0.0, 1.0);
    let b = b0 + d2 * t;
    s = clamp((b - a0).dot(d1) / uu, 0.0, 1.0);
    let a = a0 + d1 * s;

    (a, b)
}

/// Ray vs. axis-aligned box centered at the origin with the given
/// half-extents, both expressed in the box's local frame.
pub fn raycast_box(
    extents: Vec3,
    r0: Vec3,
    n: Vec3,
    max_distance: f64,
) -> Option<(Vec3, Vec3, f64)> {
    let inv = Vec3::new(1.0 / n.x, 1.0 / n.y, 1.0 / n.z);
    let t1 = (-extents.x - r0.x) * inv.x;
    let t2 = (extents.x - r0.x) * inv.x;
    let t3 = (-extents.y - r0.y) * inv.y;
    let t4 = (extents.y - r0.y) * inv.y;
    let t5 = (-extents.z - r0.z) * inv.z;
    let t6 = (extents.z - r0.z) * inv.z;

    let (tminx, tmaxx) = (t1.min(t2), t1.max(t2));
    let (tminy, tmaxy) = (t3.min(t4), t3.max(t4));
    let (tminz, tmaxz) = (t5.min(t6), t5.max(t6));

    let tmin = tminx.max(tminy).max(tminz).max(0.0);
    let tmax = tmaxx.min(tmaxy).min(tmaxz);

    if tmax < tmin || tmin > max_distance {
        return None;
    }

    let point = r0 + n * tmin;
    let eps = 1e-6;
    let normal = if (point.x.abs() - extents.x).abs() < eps {
        Vec3::new(sign(point.x), 0.0, 0.0)
    } else if (point.y.abs() - extents.y).abs() < eps {
        Vec3::new(0.0, sign(point.y), 0.0)
    } else {
        Vec3::new(0.0, 0.0, sign(point.z))
    };

    Some((point, normal, tmin))
}

/// Ray vs. sphere at `center` with the given `radius`.
pub fn raycast_sphere(
    center: Vec3,
    radius: f64,
    r0: Vec3,
    n: Vec3,
    max_distance: f64,
) -> Option<(Vec3, Vec3, f64)> {
    let m = r0 - center;
    let b = m.dot(n);
    let c = m.dot(m) - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let mut t = -b - disc.sqrt();
    if t < 0.0 {
        t = 0.0;
    }
    if t > max_distance {
        return None;
    }
    let point = r0 + n * t;
    let normal = (point - center).normalize();
    Some((point, normal, t))
}

/// Ray vs. capsule whose medial segment is `c0..c1` with the given `radius`.
/// Infinite cylinder + two end caps (a true capsule).
pub fn raycast_capsule(
    c0: Vec3,
    c1: Vec3,
    radius: f64,
    r0: Vec3,
    n: Vec3,
    max_distance: f64,
) -> Option<(Vec3, Vec3, f64)> {
    // Sample along the ray, finding the minimum distance-to-segment crossing of `radius`.
    // A closed-form quadratic solve against the infinite cylinder, clipped to the
    // segment's span, with a fallback to the two end-cap spheres.
    let axis = c1 - c0;
    let axis_len_sq = axis.dot(axis);
    if axis_len_sq <= super::EPSILON {
        return raycast_sphere(c0, radius, r0, n, max_distance);
    }
    let axis_dir = axis / axis_len_sq.sqrt();

    let delta_p = r0 - c0;
    let n_perp = n - axis_dir * n.dot(axis_dir);
    let d_perp = delta_p - axis_dir * delta_p.dot(axis_dir);

    let a = n_perp.dot(n_perp);
    let mut best: Option<(Vec3, Vec3, f64)> = None;

    if a > super::EPSILON {
        let b = 2.0 * n_perp.dot(d_perp);
        let c = d_perp.dot(d_perp) - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
                if t < 0.0 || t > max_distance {
                    continue;
                }
                let point = r0 + n * t;
                let along = (point - c0).dot(axis_dir);
                if along >= 0.0 && along <= axis.magnitude() {
                    let axis_point = c0 + axis_dir * along;
                    let normal = (point - axis_point).normalize();
                    if best.map_or(true, |(_, _, bt)| t < bt) {
                        best = Some((point, normal, t));
                    }
                    break;
                }
            }
        }
    }

    for cap in [c0, c1] {
        if let Some((p, nrm, t)) = raycast_sphere(cap, radius, r0, n, max_distance) {
            if best.map_or(true, |(_, _, bt)| t < bt) {
                best = Some((p, nrm, t));
            }
        }
    }

    best
}

/// Ray vs. a finite cylinder (no end caps) whose axis runs `c0..c1`.
pub fn raycast_cylinder(
    c0: Vec3,
    c1: Vec3,
    radius: f64,
    r0: Vec3,
    n: Vec3,
    max_distance: f64,
) -> Option<(Vec3, Vec3, f64)> {
    let axis = c1 - c0;
    let axis_len = axis.magnitude();
    if axis_len <= super::EPSILON {
        return None;
    }
    let axis_dir = axis / axis_len;

    let delta_p = r0 - c0;
    let n_perp = n - axis_dir * n.dot(axis_dir);
    let d_perp = delta_p - axis_dir * delta_p.dot(axis_dir);

    let a = n_perp.dot(n_perp);
    if a <= super::EPSILON {
        return None;
    }
    let b = 2.0 * n_perp.dot(d_perp);
    let c = d_perp.dot(d_perp) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
        if t < 0.0 || t > max_distance {
            continue;
        }
        let point = r0 + n * t;
        let along = (point - c0).dot(axis_dir);
        if along >= 0.0 && along <= axis_len {
            let axis_point = c0 + axis_dir * along;
            let normal = (point - axis_point).normalize();
            return Some((point, normal, t));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_on_segment_clamps_to_endpoints() {
        let a0 = Vec3::new(0.0, 0.0, 0.0);
        let a1 = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(nearest_on_segment(Vec3::new(-5.0, 0.0, 0.0), a0, a1), a0);
        assert_eq!(nearest_on_segment(Vec3::new(5.0, 0.0, 0.0), a0, a1), a1);
    }

    #[test]
    fn nearest_on_segments_parallel_does_not_panic() {
        let (a, b) = nearest_on_segments(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        );
        assert!((a - b).magnitude() > 0.0);
    }

    #[test]
    fn raycast_sphere_hits_front_face() {
        let hit = raycast_sphere(
            Vec3::zero(),
            1.0,
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            10.0,
        );
        assert!(hit.is_some());
        let (_, _, t) = hit.unwrap();
        assert!((t - 4.0).abs() < 1e-9);
    }
}
