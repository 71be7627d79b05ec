//! The crate's narrow, construction-time-only error surface.
//!
//! Per-step solver code (broadphase, narrowphase, integration, constraint
//! solving) never returns `Result`: every degeneracy enumerated in the
//! design notes is handled locally with a numeric fallback. `PhysicsError`
//! exists only for the handful of situations a caller can trigger before
//! `simulate` ever runs.

use thiserror::Error;

/// Errors raised by the public construction API.
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    /// A shape was constructed with a non-positive extent, radius, or length.
    #[error("shape dimension must be positive, got {0}")]
    InvalidShapeDimension(f64),

    /// A collider was attached to a body `Ref` that does not (or no longer) resolve.
    #[error("collider attached to an invalid body reference")]
    InvalidBodyRef,

    /// `Shape::Hull` was requested; the mesh/hull variant is reserved but unimplemented.
    #[error("hull shapes are not yet implemented")]
    UnimplementedHull,
}

/// Convenience alias for the crate's fallible public API.
pub type Result<T> = std::result::Result<T, PhysicsError>;
