//! Construction-time tuning knobs for a [`crate::world::World`].
//!
//! Bundled into a single `Copy` struct so callers can override individual
//! fields from `Default::default()` rather than threading a dozen
//! constructor parameters through `World::new`.

use crate::math::Vec3;

/// Gravity, substep count, and solver iteration ceilings for a `World`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig {
    /// Uniform gravitational acceleration applied to every dynamic body.
    pub gravity: Vec3,
    /// Number of XPBD substeps per call to `World::simulate`, unless overridden per-call.
    pub substeps: u32,
    /// Broadphase bounds padding factor (multiplies `dt * |velocity|`), see §4.3.
    pub broadphase_pad_factor: f64,
    /// GJK iteration ceiling.
    pub gjk_max_iterations: u32,
    /// EPA iteration ceiling.
    pub epa_max_iterations: u32,
    /// Jacobi rotation iteration ceiling used by the mass computer's diagonalization.
    pub jacobi_max_iterations: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            substeps: 10,
            broadphase_pad_factor: 2.0,
            gjk_max_iterations: 16,
            epa_max_iterations: 28,
            jacobi_max_iterations: 24,
        }
    }
}
