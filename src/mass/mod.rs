//! Per-shape inertia tensor construction and the combine/translate/rotate/
//! diagonalize pipeline that turns a body's collider set into a principal
//! mass frame.
//!
//! [`Computer`] accumulates a (possibly off-diagonal) inertia tensor plus a
//! center of mass and total mass, the same way the reference implementation
//! does: one `Computer` per shape is built in the shape's own local frame,
//! transformed into the body frame, then folded (`add`) into a running
//! total. [`Computer::diagonalize`] performs the final step -- Jacobi
//! rotation to find the principal axes -- once, at the body.

pub mod volume;

use crate::math::{Mat3, Quat, Vec3};
use cgmath::{InnerSpace, One, SquareMatrix, Zero};

const JACOBI_MAX_ITERATIONS: u32 = 24;

fn sign_eq(v: f64) -> f64 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn mat_component(v: Vec3, i: usize) -> f64 {
    match i {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// `m`'s entry at `(row, col)`, both zero-indexed. `cgmath::Matrix3` stores
/// columns, so this is just a double index.
fn mat_get(m: &Mat3, row: usize, col: usize) -> f64 {
    let column = match col {
        0 => m.x,
        1 => m.y,
        _ => m.z,
    };
    mat_component(column, row)
}

fn indexed_rotation(axis: usize, s: f64, c: f64) -> Quat {
    let mut v = Vec3::zero();
    match axis {
        0 => v.x = s,
        1 => v.y = s,
        _ => v.z = s,
    }
    Quat::from_sv(c, v)
}

fn next_index3(i: usize) -> usize {
    (i + 1) % 3
}

/// Jacobi rotation diagonalization of a symmetric 3x3 matrix using
/// quaternions (Stan Melax's method). Converges in well under
/// [`JACOBI_MAX_ITERATIONS`] for any physically realizable inertia tensor;
/// returns the diagonal (which may contain non-positive entries for a
/// degenerate or inverted mass distribution -- the caller decides what to
/// do with that) and the rotation from principal axes to the input frame.
fn diagonalize(m: &Mat3) -> (Vec3, Quat) {
    let mut q = Quat::one();
    let mut d = *m;

    for _ in 0..JACOBI_MAX_ITERATIONS {
        let axes = Mat3::from(q);
        d = axes.transpose() * m * axes;

        let d0 = mat_get(&d, 2, 1).abs();
        let d1 = mat_get(&d, 2, 0).abs();
        let d2 = mat_get(&d, 1, 0).abs();

        let a = if d0 > d1 && d0 > d2 {
            0
        } else if d1 > d2 {
            1
        } else {
            2
        };
        let a1 = next_index3(a);
        let a2 = next_index3(a1);

        if mat_get(&d, a2, a1) == 0.0
            || (mat_get(&d, a1, a1) - mat_get(&d, a2, a2)).abs() > 2e6 * (2.0 * mat_get(&d, a2, a1)).abs()
        {
            break;
        }

        let w = (mat_get(&d, a1, a1) - mat_get(&d, a2, a2)) / (2.0 * mat_get(&d, a2, a1));
        let absw = w.abs();

        let r = if absw > 1000.0 {
            indexed_rotation(a, 1.0 / (4.0 * w), 1.0)
        } else {
            let t = 1.0 / (absw + (w * w + 1.0).sqrt());
            let h = 1.0 / (t * t + 1.0).sqrt();
            indexed_rotation(a, ((1.0 - h) / 2.0).sqrt() * sign_eq(w), ((1.0 + h) / 2.0).sqrt())
        };

        q = q * r;
        q = q.normalize();
    }

    (Vec3::new(mat_get(&d, 0, 0), mat_get(&d, 1, 1), mat_get(&d, 2, 2)), q)
}

/// Accumulates an inertia tensor, center of mass, and total mass across one
/// or more shapes, in a single frame (the owning body's frame).
#[derive(Clone, Copy, Debug)]
pub struct Computer {
    inertia: Mat3,
    com: Vec3,
    mass: f64,
}

impl Default for Computer {
    fn default() -> Self {
        Computer {
            inertia: Mat3::zero(),
            com: Vec3::zero(),
            mass: 0.0,
        }
    }
}

impl Computer {
    /// An empty accumulator (zero mass, zero inertia).
    pub fn new() -> Self {
        Self::default()
    }

    fn set_diagonal(&mut self, diagonal: Vec3, mass: f64) {
        self.inertia = Mat3::new(diagonal.x, 0.0, 0.0, 0.0, diagonal.y, 0.0, 0.0, 0.0, diagonal.z);
        self.mass = mass;
        self.com = Vec3::zero();
    }

    fn rotate(&mut self, rotation: Quat) {
        if rotation == Quat::one() {
            return;
        }
        self.com = rotation * self.com;
        let rot_mat = Mat3::from(rotation);
        self.inertia = rot_mat * self.inertia * rot_mat.transpose();
    }

    fn translate(&mut self, translation: Vec3) {
        if translation == Vec3::zero() {
            return;
        }

        let com = self.com;
        let t1 = Mat3::new(0.0, com.z, -com.y, -com.z, 0.0, com.x, com.y, -com.x, 0.0);

        let sum = com + translation;
        if sum == Vec3::zero() {
            self.inertia += t1 * t1 * self.mass;
        } else {
            let t2 = Mat3::new(0.0, sum.z, -sum.y, -sum.z, 0.0, sum.x, sum.y, -sum.x, 0.0);
            self.inertia += (t1 * t1 - t2 * t2) * self.mass;
        }

        self.com = sum;
    }

    fn transform(&mut self, translation: Vec3, rotation: Quat) {
        self.rotate(rotation);
        self.translate(translation);
    }

    fn center(&mut self) {
        let com = self.com;
        self.translate(-com);
    }

    /// Folds `other`'s mass, inertia, and center of mass into `self`,
    /// combining about a new weighted-average center of mass.
    pub fn add(&mut self, other: &Computer) {
        let total_mass = self.mass + other.mass;
        let com = if total_mass > 0.0 {
            (self.com * self.mass + other.com * other.mass) / total_mass
        } else {
            Vec3::zero()
        };
        self.mass = total_mass;
        self.inertia += other.inertia;
        self.com = com;
    }

    /// Centers the accumulated tensor on its own center of mass and
    /// diagonalizes it via Jacobi rotation. Returns `(diagonal inertia,
    /// rotation from principal axes to body frame, center of mass, total
    /// mass)`, or `None` if the resulting diagonal has a non-positive entry
    /// -- a degenerate or inverted mass distribution that cannot be used as
    /// a rigid body's inertia.
    pub fn diagonalize(&self) -> Option<(Vec3, Quat, Vec3, f64)> {
        let com = self.com;
        let mut centered = *self;
        centered.center();

        let (diag, rot) = diagonalize(&centered.inertia);
        if diag.x > 0.0 && diag.y > 0.0 && diag.z > 0.0 {
            Some((diag, rot, com, self.mass))
        } else {
            None
        }
    }

    fn set_box(&mut self, extents: Vec3, density: f64) {
        let m = volume::box_volume(extents) * density;
        let s = m / 3.0;
        let x = extents.x * extents.x;
        let y = extents.y * extents.y;
        let z = extents.z * extents.z;
        self.set_diagonal(Vec3::new((y + z) * s, (z + x) * s, (x + y) * s), m);
    }

    fn set_sphere(&mut self, radius: f64, density: f64) {
        let m = volume::sphere_volume(radius) * density;
        let s = m * radius * radius * (2.0 / 5.0);
        self.set_diagonal(Vec3::new(s, s, s), m);
    }

    fn set_capsule(&mut self, radius: f64, length: f64, density: f64) {
        let m = volume::capsule_volume(radius, length) * density;

        let r2 = radius * radius;
        let l_2 = length * 0.5;
        let l2 = l_2 * l_2;
        let lr2 = l_2 * r2;
        let r3x8_15 = r2 * radius * (8.0 / 15.0);

        let t = std::f64::consts::PI * r2 * density;
        let i1 = t * (r3x8_15 + lr2);
        let i2 = t * (r3x8_15 + lr2 * 1.5 + l2 * radius * (4.0 / 3.0) + l2 * l_2 * (2.0 / 3.0));

        self.set_diagonal(Vec3::new(i1, i2, i2), m);
    }

    fn set_cylinder(&mut self, radius: f64, length: f64, density: f64) {
        let m = volume::cylinder_volume(radius, length) * density;

        let r2 = radius * radius;
        let l_2 = length * 0.5;
        let m_2 = m * 0.5;

        let i1 = r2 * m_2;
        let i2 = (3.0 * r2 + 4.0 * l_2 * l_2) * m_2 / 6.0;

        self.set_diagonal(Vec3::new(i1, i2, i2), m);
    }

    /// Accumulates a box of the given half-extents, at `translation`/`rotation`
    /// relative to the accumulator's frame, with the given density.
    pub fn add_box(&mut self, extents: Vec3, translation: Vec3, rotation: Quat, density: f64) {
        let mut shape = Computer::new();
        shape.set_box(extents, density);
        shape.transform(translation, rotation);
        self.add(&shape);
    }

    /// Accumulates a sphere of the given radius at `translation`.
    pub fn add_sphere(&mut self, radius: f64, translation: Vec3, density: f64) {
        let mut shape = Computer::new();
        shape.set_sphere(radius, density);
        shape.translate(translation);
        self.add(&shape);
    }

    /// Accumulates a capsule (medial segment along local +X) at
    /// `translation`/`rotation`.
    pub fn add_capsule(&mut self, radius: f64, length: f64, translation: Vec3, rotation: Quat, density: f64) {
        let mut shape = Computer::new();
        shape.set_capsule(radius, length, density);
        shape.transform(translation, rotation);
        self.add(&shape);
    }

    /// Accumulates a cylinder (axis along local +X) at `translation`/`rotation`.
    pub fn add_cylinder(&mut self, radius: f64, length: f64, translation: Vec3, rotation: Quat, density: f64) {
        let mut shape = Computer::new();
        shape.set_cylinder(radius, length, density);
        shape.transform(translation, rotation);
        self.add(&shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_box_matches_closed_form() {
        let s = 2.0;
        let density = 3.0;
        let mut computer = Computer::new();
        computer.add_box(Vec3::new(s / 2.0, s / 2.0, s / 2.0), Vec3::zero(), Quat::one(), density);

        let (diag, _rot, com, mass) = computer.diagonalize().unwrap();
        assert_relative_eq!(mass, density * s * s * s, epsilon = 1e-9);
        assert_relative_eq!(com, Vec3::zero());
        let expected_i = (1.0 / 6.0) * mass * s * s;
        assert_relative_eq!(diag.x, expected_i, epsilon = 1e-6);
        assert_relative_eq!(diag.y, expected_i, epsilon = 1e-6);
        assert_relative_eq!(diag.z, expected_i, epsilon = 1e-6);
    }

    #[test]
    fn sphere_offset_from_origin_moves_center_of_mass() {
        let mut computer = Computer::new();
        computer.add_sphere(1.0, Vec3::new(5.0, 0.0, 0.0), 1.0);
        let (_diag, _rot, com, _mass) = computer.diagonalize().unwrap();
        assert_relative_eq!(com, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn combining_two_spheres_averages_center_of_mass() {
        let mut computer = Computer::new();
        computer.add_sphere(1.0, Vec3::new(-3.0, 0.0, 0.0), 1.0);
        computer.add_sphere(1.0, Vec3::new(3.0, 0.0, 0.0), 1.0);
        let (_diag, _rot, com, _mass) = computer.diagonalize().unwrap();
        assert_relative_eq!(com, Vec3::zero(), epsilon = 1e-9);
    }
}
