//! Primitive collision shapes and the uniform dispatch interface
//! (bounds / volume / raycast / support / mass) every caller uses instead of
//! matching on `Shape` directly.
//!
//! The reference implementation stores five function pointers per
//! `Collider` (bounds, volume, raycast, support, computeMass) bound once at
//! construction from the concrete shape type. Rust expresses the same
//! "closed set of shapes, uniform interface" shape with a sum type and a
//! `match` in each free function below -- there is exactly one vtable-sized
//! branch per call and no per-collider heap allocation, matching the design
//! notes' "no heap allocation per collider; no virtual table".

mod box_shape;
mod capsule;
mod cylinder;
mod shape_id;
mod sphere;

pub use shape_id::ShapeId;

use crate::error::{PhysicsError, Result};
use crate::mass::Computer;
use crate::math::{Bounds, Pose, Ray, Vec3};
use crate::store::Ref;

/// A primitive collision shape. The `Hull` variant named in the fixed
/// discriminant table ([`ShapeId::HULL`]) is reserved but not constructible
/// here -- attempting to build one is a caller error, not a panic.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    /// A box with the given half-extents.
    Box {
        /// Half-extents along local x/y/z.
        extents: Vec3,
    },
    /// A sphere of the given radius, centered at the collider's local origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// A capsule whose medial segment runs along local +X with the given half-length.
    Capsule {
        /// Radius of the swept sphere.
        radius: f64,
        /// Full length of the medial segment.
        length: f64,
    },
    /// A cylinder whose axis runs along local +X with the given half-length.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Full length along the axis.
        length: f64,
    },
}

impl Shape {
    /// Constructs a box shape, rejecting non-positive extents.
    pub fn new_box(extents: Vec3) -> Result<Shape> {
        if extents.x <= 0.0 || extents.y <= 0.0 || extents.z <= 0.0 {
            return Err(PhysicsError::InvalidShapeDimension(extents.x.min(extents.y).min(extents.z)));
        }
        Ok(Shape::Box { extents })
    }

    /// Constructs a sphere shape, rejecting non-positive radii.
    pub fn new_sphere(radius: f64) -> Result<Shape> {
        if radius <= 0.0 {
            return Err(PhysicsError::InvalidShapeDimension(radius));
        }
        Ok(Shape::Sphere { radius })
    }

    /// Constructs a capsule shape, rejecting non-positive radius or length.
    pub fn new_capsule(radius: f64, length: f64) -> Result<Shape> {
        if radius <= 0.0 || length <= 0.0 {
            return Err(PhysicsError::InvalidShapeDimension(radius.min(length)));
        }
        Ok(Shape::Capsule { radius, length })
    }

    /// Constructs a cylinder shape, rejecting non-positive radius or length.
    pub fn new_cylinder(radius: f64, length: f64) -> Result<Shape> {
        if radius <= 0.0 || length <= 0.0 {
            return Err(PhysicsError::InvalidShapeDimension(radius.min(length)));
        }
        Ok(Shape::Cylinder { radius, length })
    }

    /// The one-hot [`ShapeId`] bit identifying this shape's variant.
    pub fn shape_id(&self) -> u8 {
        match self {
            Shape::Box { .. } => ShapeId::BOX,
            Shape::Sphere { .. } => ShapeId::SPHERE,
            Shape::Capsule { .. } => ShapeId::CAPSULE,
            Shape::Cylinder { .. } => ShapeId::CYLINDER,
        }
    }
}

/// A collision shape attached to a body (or `None` for a static collider),
/// with its own local pose, collision mask, and surface properties.
#[derive(Clone, Debug)]
pub struct Collider {
    /// The shape geometry.
    pub shape: Shape,
    /// The body this collider moves with; `None` means the collider is static.
    pub body: Option<Ref<crate::body::Body>>,
    /// Pose of the shape relative to its owning body (or, for static colliders, the world).
    pub local_pose: Pose,
    /// 32-bit collision mask; two colliders may interact only if `maskA & maskB != 0`.
    pub mask: u32,
    /// Mass density, used by [`Collider::compute_mass`].
    pub density: f64,
    /// Coulomb static friction coefficient.
    pub static_friction: f64,
    /// Coulomb dynamic friction coefficient.
    pub dynamic_friction: f64,
    /// Coefficient of restitution.
    pub restitution: f64,
}

impl Collider {
    /// Constructs a new collider with unit density and zero friction/restitution.
    pub fn new(shape: Shape, local_pose: Pose, mask: u32) -> Self {
        Collider {
            shape,
            body: None,
            local_pose,
            mask,
            density: 1.0,
            static_friction: 0.2,
            dynamic_friction: 0.2,
            restitution: 0.0,
        }
    }

    /// The world pose of this collider, given the world pose of its owning
    /// body (`None` for a static collider, whose `local_pose` is already
    /// expressed in world space).
    pub fn world_pose(&self, body_pose: Option<&Pose>) -> Pose {
        match body_pose {
            Some(bp) => bp.compose(&self.local_pose),
            None => self.local_pose,
        }
    }

    /// Maps a local-space point into world space given the resolved world pose.
    pub fn point_to_world(world_pose: &Pose, point: Vec3) -> Vec3 {
        world_pose.transform(point)
    }

    /// Maps a local-space vector (no translation) into world space.
    pub fn vector_to_world(world_pose: &Pose, vector: Vec3) -> Vec3 {
        world_pose.rotate(vector)
    }

    /// Maps a world-space point into this collider's local space.
    pub fn point_to_local(world_pose: &Pose, point: Vec3) -> Vec3 {
        world_pose.inverse_transform(point)
    }

    /// Maps a world-space vector into this collider's local space.
    pub fn vector_to_local(world_pose: &Pose, vector: Vec3) -> Vec3 {
        world_pose.inverse_rotate(vector)
    }

    /// Whether the shape's world orientation affects its geometry (spheres do not).
    pub fn has_rotation(&self) -> bool {
        !matches!(self.shape, Shape::Sphere { .. })
    }

    /// World-space bounding box, given the resolved world pose.
    pub fn bounds(&self, world_pose: &Pose) -> Bounds {
        match self.shape {
            Shape::Box { extents } => box_shape::bounds(extents, world_pose),
            Shape::Sphere { radius } => sphere::bounds(radius, world_pose),
            Shape::Capsule { radius, length } => capsule::bounds(radius, length, world_pose),
            Shape::Cylinder { radius, length } => cylinder::bounds(radius, length, world_pose),
        }
    }

    /// Shape volume, independent of pose.
    pub fn volume(&self) -> f64 {
        match self.shape {
            Shape::Box { extents } => crate::mass::volume::box_volume(extents),
            Shape::Sphere { radius } => crate::mass::volume::sphere_volume(radius),
            Shape::Capsule { radius, length } => crate::mass::volume::capsule_volume(radius, length),
            Shape::Cylinder { radius, length } => crate::mass::volume::cylinder_volume(radius, length),
        }
    }

    /// Raycasts this collider in world space, returning `(point, normal, distance)` on a hit.
    pub fn raycast(&self, world_pose: &Pose, ray: &Ray, max_distance: f64) -> Option<(Vec3, Vec3, f64)> {
        match self.shape {
            Shape::Box { extents } => box_shape::raycast(extents, world_pose, ray, max_distance),
            Shape::Sphere { radius } => sphere::raycast(radius, world_pose, ray, max_distance),
            Shape::Capsule { radius, length } => capsule::raycast(radius, length, world_pose, ray, max_distance),
            Shape::Cylinder { radius, length } => cylinder::raycast(radius, length, world_pose, ray, max_distance),
        }
    }

    /// The support point of this shape, in local space, along `axis` (also local space).
    /// Used by GJK/EPA to build CSO vertices.
    pub fn local_support(&self, axis: Vec3) -> Vec3 {
        match self.shape {
            Shape::Box { extents } => box_shape::local_support(extents, axis),
            Shape::Sphere { radius } => sphere::local_support(radius, axis),
            Shape::Capsule { radius, length } => capsule::local_support(radius, length, axis),
            Shape::Cylinder { radius, length } => cylinder::local_support(radius, length, axis),
        }
    }

    /// The world-space support point along world-space `axis`.
    pub fn support(&self, world_pose: &Pose, axis: Vec3) -> Vec3 {
        let local_axis = Self::vector_to_local(world_pose, axis);
        Self::point_to_world(world_pose, self.local_support(local_axis))
    }

    /// Accumulates this collider's mass contribution (at `local_pose`, scaled
    /// by `density`) into `computer`.
    pub fn compute_mass(&self, computer: &mut Computer) {
        match self.shape {
            Shape::Box { extents } => {
                computer.add_box(extents, self.local_pose.position, self.local_pose.rotation, self.density)
            }
            Shape::Sphere { radius } => {
                computer.add_sphere(radius, self.local_pose.position, self.density)
            }
            Shape::Capsule { radius, length } => computer.add_capsule(
                radius,
                length,
                self.local_pose.position,
                self.local_pose.rotation,
                self.density,
            ),
            Shape::Cylinder { radius, length } => computer.add_cylinder(
                radius,
                length,
                self.local_pose.position,
                self.local_pose.rotation,
                self.density,
            ),
        }
    }
}
