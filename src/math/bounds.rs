//! Axis-aligned bounding box stored as (center, extents).

use super::{Ray, Vec3, Vec3Ext};
use cgmath::Zero;

/// An axis-aligned box. `extents` are always non-negative; construction and
/// mutation both clamp via `abs()` to preserve that invariant.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Center of the box.
    pub center: Vec3,
    extents: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            center: Vec3::zero(),
            extents: Vec3::zero(),
        }
    }
}

impl Bounds {
    /// Constructs a box from a center and extents; the extents' absolute
    /// value is taken so the invariant `extents >= 0` always holds.
    pub fn new(center: Vec3, extents: Vec3) -> Self {
        Bounds {
            center,
            extents: extents.abs(),
        }
    }

    /// The (non-negative) half-widths of the box along each axis.
    pub fn extents(&self) -> Vec3 {
        self.extents
    }

    /// Replaces the extents, preserving the non-negative invariant.
    pub fn set_extents(&mut self, extents: Vec3) {
        self.extents = extents.abs();
    }

    /// The minimum corner.
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    /// The maximum corner.
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Total surface area of the box (all six faces).
    pub fn surface_area(&self) -> f64 {
        8.0 * (self.extents.x * self.extents.y
            + self.extents.x * self.extents.z
            + self.extents.y * self.extents.z)
    }

    /// Volume of the box.
    pub fn volume(&self) -> f64 {
        8.0 * self.extents.x * self.extents.y * self.extents.z
    }

    /// Whether `point` lies within the box, boundary included.
    pub fn contains(&self, point: Vec3) -> bool {
        (point.x - self.center.x).abs() <= self.extents.x
            && (point.y - self.center.y).abs() <= self.extents.y
            && (point.z - self.center.z).abs() <= self.extents.z
    }

    /// Whether `point` lies strictly within the box, boundary excluded.
    pub fn contains_exclusive(&self, point: Vec3) -> bool {
        (point.x - self.center.x).abs() < self.extents.x
            && (point.y - self.center.y).abs() < self.extents.y
            && (point.z - self.center.z).abs() < self.extents.z
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        let delta = (other.center - self.center).abs() + other.extents;
        delta.x <= self.extents.x && delta.y <= self.extents.y && delta.z <= self.extents.z
    }

    /// Whether `other` lies strictly within `self`, boundary excluded.
    pub fn contains_bounds_exclusive(&self, other: &Bounds) -> bool {
        let delta = (other.center - self.center).abs() + other.extents;
        delta.x < self.extents.x && delta.y < self.extents.y && delta.z < self.extents.z
    }

    /// The point within the box nearest to `point` (returns `point` itself when inside).
    pub fn nearest(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            super::clamp(point.x, self.center.x - self.extents.x, self.center.x + self.extents.x),
            super::clamp(point.y, self.center.y - self.extents.y, self.center.y + self.extents.y),
            super::clamp(point.z, self.center.z - self.extents.z, self.center.z + self.extents.z),
        )
    }

    /// Inclusive overlap test.
    pub fn intersects(&self, other: &Bounds) -> bool {
        let delta = other.center - self.center;
        let sum = other.extents + self.extents;
        delta.x.abs() <= sum.x && delta.y.abs() <= sum.y && delta.z.abs() <= sum.z
    }

    /// Exclusive overlap test.
    pub fn intersects_exclusive(&self, other: &Bounds) -> bool {
        let delta = other.center - self.center;
        let sum = other.extents + self.extents;
        delta.x.abs() < sum.x && delta.y.abs() < sum.y && delta.z.abs() < sum.z
    }

    /// Ray-box intersection. Returns the signed entry distance (negative if
    /// the ray starts inside the box) when the ray intersects within the
    /// slab test; `None` when it misses entirely.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<f64> {
        let inv_dir = ray.inv_direction();

        let t1 = (self.center.x - self.extents.x - ray.origin.x) * inv_dir.x;
        let t2 = (self.center.x + self.extents.x - ray.origin.x) * inv_dir.x;
        let t3 = (self.center.y - self.extents.y - ray.origin.y) * inv_dir.y;
        let t4 = (self.center.y + self.extents.y - ray.origin.y) * inv_dir.y;
        let t5 = (self.center.z - self.extents.z - ray.origin.z) * inv_dir.z;
        let t6 = (self.center.z + self.extents.z - ray.origin.z) * inv_dir.z;

        let tmin = (t1.min(t2)).max(t3.min(t4)).max(t5.min(t6));
        let tmax = (t1.max(t2)).min(t3.max(t4)).min(t5.max(t6));

        if tmax >= tmin {
            Some(tmin)
        } else {
            None
        }
    }

    /// Grows `self` to also contain `point`.
    pub fn merge(&mut self, point: Vec3) -> &mut Self {
        let min = self.min().zip(point, f64::min);
        let max = self.max().zip(point, f64::max);
        self.extents = (max - min) * 0.5;
        self.center = min + self.extents;
        self
    }

    /// Grows `self` to also contain `other`.
    pub fn merge_bounds(&mut self, other: &Bounds) -> &mut Self {
        let min = self.min().zip(other.min(), f64::min);
        let max = self.max().zip(other.max(), f64::max);
        self.extents = (max - min) * 0.5;
        self.center = min + self.extents;
        self
    }

    /// The smallest box containing both `self` and `point`.
    pub fn merged(&self, point: Vec3) -> Bounds {
        let mut b = *self;
        b.merge(point);
        b
    }

    /// The smallest box containing both `self` and `other`.
    pub fn merged_bounds(&self, other: &Bounds) -> Bounds {
        let mut b = *self;
        b.merge_bounds(other);
        b
    }

    /// Expands every face outward by `amount` (uniformly).
    pub fn expand(&mut self, amount: f64) -> &mut Self {
        self.extents = (self.extents + Vec3::new(amount, amount, amount)).abs();
        self
    }

    /// Expands each face outward by the matching component of `amount`.
    pub fn expand_vec(&mut self, amount: Vec3) -> &mut Self {
        self.extents = (self.extents + amount).abs();
        self
    }

    /// Returns an expanded copy; see [`Bounds::expand`].
    pub fn expanded(&self, amount: f64) -> Bounds {
        Bounds::new(self.center, self.extents + Vec3::new(amount, amount, amount))
    }

    /// Returns an expanded copy; see [`Bounds::expand_vec`].
    pub fn expanded_vec(&self, amount: Vec3) -> Bounds {
        Bounds::new(self.center, self.extents + amount)
    }
}

trait ZipVec3 {
    fn zip(self, other: Vec3, f: impl Fn(f64, f64) -> f64) -> Vec3;
}

impl ZipVec3 for Vec3 {
    fn zip(self, other: Vec3, f: impl Fn(f64, f64) -> f64) -> Vec3 {
        Vec3::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive_at_boundary() {
        let b = Bounds::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        assert!(b.contains(Vec3::new(1.0, 0.0, 0.0)));
        assert!(!b.contains_exclusive(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn merge_grows_to_include_point() {
        let mut b = Bounds::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        b.merge(Vec3::new(3.0, 0.0, 0.0));
        assert!(b.contains(Vec3::new(3.0, 0.0, 0.0)));
        assert!(b.contains(Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn intersects_is_symmetric() {
        let a = Bounds::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        let b = Bounds::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn ray_from_outside_hits_near_face() {
        let b = Bounds::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let dist = b.intersects_ray(&ray).unwrap();
        assert!((dist - 4.0).abs() < 1e-9);
    }

    #[test]
    fn ray_from_inside_reports_negative_distance() {
        let b = Bounds::new(Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
        let dist = b.intersects_ray(&ray).unwrap();
        assert!(dist < 0.0);
    }
}
