//! A ray, stored as an origin and a unit direction.

use super::Vec3;
use cgmath::InnerSpace;

/// A ray with a normalized direction, for use in broadphase and narrowphase raycasts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vec3,
    direction: Vec3,
}

impl Ray {
    /// Constructs a ray from `origin` along `direction`, which is normalized on construction.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Ray {
            origin,
            direction: direction.normalize(),
        }
    }

    /// The ray's (unit-length) direction.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Component-wise reciprocal of the direction, used by the slab test in
    /// [`super::Bounds::intersects_ray`]. Components along axes the ray does
    /// not move along become infinite, which the slab test handles correctly
    /// via IEEE-754 semantics (`x / 0.0 == +-inf`).
    pub fn inv_direction(&self) -> Vec3 {
        Vec3::new(1.0 / self.direction.x, 1.0 / self.direction.y, 1.0 / self.direction.z)
    }

    /// The point at parameter `t` along the ray.
    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }
}
