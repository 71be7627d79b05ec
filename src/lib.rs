//! A real-time 3D rigid-body physics engine built on Extended Position-Based
//! Dynamics (XPBD): integrate, solve position constraints directly against
//! the pose, derive velocities from the position delta, then solve the
//! velocity-level constraints (restitution, friction, damping).
//!
//! The top-level entry point is [`world::World`]; everything else is the
//! machinery it's built from -- stores, broadphase, narrowphase, bodies,
//! colliders, mass properties, and the constraint framework.

pub mod body;
pub mod broadphase;
pub mod collider;
pub mod config;
pub mod constraint;
pub mod error;
pub mod mass;
pub mod math;
pub mod narrowphase;
pub mod store;
pub mod world;

pub use body::{Body, BodyKind, VelocityPose};
pub use collider::{Collider, Shape, ShapeId};
pub use config::WorldConfig;
pub use constraint::{Constraint, ContactConstraint, DofMask, Joint, Motor};
pub use error::{PhysicsError, Result};
pub use math::{Bounds, Mat3, Pose, Quat, Ray, Vec3};
pub use store::{Ref, Store};
pub use world::World;
