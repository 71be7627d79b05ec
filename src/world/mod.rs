//! The simulation loop: owns the body/collider/constraint stores and a
//! broadphase, builds the transient contact pool each step, and steps every
//! body and constraint through the substep XPBD loop.
//!
//! The reference implementation threads these same pieces (and the same
//! ignore-pair bookkeeping) through a single "world" object updated once per
//! frame; this module keeps that shape rather than splitting it into a
//! scheduler plus systems, since nothing here benefits from being more
//! than one object with one entry point.

use crate::body::Body;
use crate::broadphase::{self, Broadphase};
use crate::collider::Collider;
use crate::config::WorldConfig;
use crate::constraint::{Constraint, ContactConstraint};
use crate::math::{Bounds, Ray, Vec3};
use crate::narrowphase::{self, ContactPoint};
use crate::store::{Ref, Store};
use cgmath::Zero;

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Which of the broadphase's two trees a collider's handle lives in --
/// dynamic colliders refit every step, static ones only on explicit update.
#[derive(Clone, Copy, Debug)]
enum ColliderHandle {
    Dynamic(broadphase::Handle),
    Static(broadphase::Handle),
}

/// Top-level simulation state: bodies, colliders, persistent constraints,
/// broadphase, the transient contact pool, and the pairs collision has been
/// told to ignore.
pub struct World {
    /// Gravity, substep count, and solver iteration ceilings.
    pub config: WorldConfig,
    /// All bodies in the world.
    pub bodies: Store<Body>,
    /// All colliders in the world, whether attached to a body or static.
    pub colliders: Store<Collider>,
    /// All persistent joint/motor constraints.
    pub constraints: Store<Constraint>,
    broadphase: Broadphase,
    collider_handles: HashMap<Ref<Collider>, ColliderHandle>,
    contact_pool: Vec<ContactConstraint>,
    live_contacts: usize,
    ignored_body_pairs: HashSet<(u64, u64)>,
    ignored_collider_pairs: HashSet<(u64, u64)>,
}

impl World {
    /// A new, empty world.
    pub fn new(config: WorldConfig) -> Self {
        World {
            broadphase: Broadphase::new(config.broadphase_pad_factor),
            config,
            bodies: Store::new(),
            colliders: Store::new(),
            constraints: Store::new(),
            collider_handles: HashMap::new(),
            contact_pool: Vec::new(),
            live_contacts: 0,
            ignored_body_pairs: HashSet::new(),
            ignored_collider_pairs: HashSet::new(),
        }
    }

    /// Adds a body to the world.
    pub fn add_body(&mut self, body: Body) -> Ref<Body> {
        self.bodies.store(body)
    }

    /// Removes a body and every collider still attached to it.
    pub fn remove_body(&mut self, body_ref: Ref<Body>) {
        let owned = self.bodies.get(body_ref).map(|b| b.colliders.clone()).unwrap_or_default();
        for collider_ref in owned {
            self.remove_collider(collider_ref);
        }
        self.bodies.erase(body_ref);
    }

    /// Adds a collider, attaching it to `body` (or leaving it static if
    /// `None`), and inserts it into the appropriate broadphase tree.
    pub fn add_collider(&mut self, body: Option<Ref<Body>>, mut collider: Collider) -> Ref<Collider> {
        collider.body = body;

        let body_pose = body.and_then(|r| self.bodies.get(r)).map(|b| b.pose);
        let pose = collider.world_pose(body_pose.as_ref());
        let bounds = collider.bounds(&pose);
        let mask = collider.mask;

        let collider_ref = self.colliders.store(collider);

        let handle = match body {
            Some(_) => ColliderHandle::Dynamic(self.broadphase.add(collider_ref, bounds, mask)),
            None => ColliderHandle::Static(self.broadphase.add_static(collider_ref, bounds, mask)),
        };
        self.collider_handles.insert(collider_ref, handle);

        if let Some(body_ref) = body {
            let colliders = &self.colliders;
            if let Some(b) = self.bodies.get_mut(body_ref) {
                b.colliders.push(collider_ref);
                b.update_mass(colliders);
            }
        }

        collider_ref
    }

    /// Removes a collider from both its broadphase tree and its owning
    /// body's collider list, recomputing that body's mass.
    pub fn remove_collider(&mut self, collider_ref: Ref<Collider>) {
        if let Some(handle) = self.collider_handles.remove(&collider_ref) {
            match handle {
                ColliderHandle::Dynamic(h) => self.broadphase.remove(h),
                ColliderHandle::Static(h) => self.broadphase.remove_static(h),
            }
        }

        let owner = self.colliders.get(collider_ref).and_then(|c| c.body);
        self.colliders.erase(collider_ref);

        if let Some(body_ref) = owner {
            let colliders = &self.colliders;
            if let Some(b) = self.bodies.get_mut(body_ref) {
                b.colliders.retain(|&c| c != collider_ref);
                b.update_mass(colliders);
            }
        }
    }

    /// Adds a persistent joint or motor constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Ref<Constraint> {
        self.constraints.store(constraint)
    }

    /// Removes a persistent constraint.
    pub fn remove_constraint(&mut self, constraint_ref: Ref<Constraint>) {
        self.constraints.erase(constraint_ref);
    }

    /// Suppresses contact generation between every collider pair owned by
    /// `a` and `b` -- e.g. for a hinge joining two overlapping bodies.
    pub fn ignore_body_pair(&mut self, a: Ref<Body>, b: Ref<Body>) {
        self.ignored_body_pairs.insert(unordered_key(a, b));
    }

    /// Re-enables contact generation previously suppressed by [`World::ignore_body_pair`].
    pub fn allow_body_pair(&mut self, a: Ref<Body>, b: Ref<Body>) {
        self.ignored_body_pairs.remove(&unordered_key(a, b));
    }

    /// Suppresses contact generation between one specific pair of colliders.
    pub fn ignore_collider_pair(&mut self, a: Ref<Collider>, b: Ref<Collider>) {
        self.ignored_collider_pairs.insert(unordered_key(a, b));
    }

    /// Re-enables contact generation previously suppressed by [`World::ignore_collider_pair`].
    pub fn allow_collider_pair(&mut self, a: Ref<Collider>, b: Ref<Collider>) {
        self.ignored_collider_pairs.remove(&unordered_key(a, b));
    }

    /// Advances the world by `dt`, split into `substeps` (or
    /// `config.substeps` if `None`) equal XPBD substeps.
    pub fn simulate(&mut self, dt: f64, substeps: Option<u32>) {
        let substeps = substeps.unwrap_or(self.config.substeps).max(1);
        let h = dt / substeps as f64;
        let h_inv = 1.0 / h;
        let h_inv_sq = h_inv * h_inv;
        let gravity = self.config.gravity;

        {
            let colliders = &self.colliders;
            let bodies = &self.bodies;
            self.broadphase.update(dt, |collider_ref| {
                let collider = match colliders.get(collider_ref) {
                    Some(c) => c,
                    None => return (Bounds::new(Vec3::zero(), Vec3::zero()), Vec3::zero()),
                };
                let body = collider.body.and_then(|r| bodies.get(r));
                let pose = collider.world_pose(body.map(|b| &b.pose));
                let bounds = collider.bounds(&pose);
                let velocity = body.map(|b| b.velocity.linear).unwrap_or_else(Vec3::zero);
                (bounds, velocity)
            });
        }

        self.build_contacts();

        for step in 0..substeps {
            log::trace!("substep {}/{}, h = {}", step + 1, substeps, h);

            {
                let bodies = &mut self.bodies;
                self.constraints.for_each_mut(|_, c| c.apply_forces(bodies, h));
            }

            self.bodies.for_each_mut(|_, body| body.integrate(h, gravity));

            {
                let colliders = &self.colliders;
                let bodies = &mut self.bodies;
                let gjk = self.config.gjk_max_iterations;
                let epa = self.config.epa_max_iterations;
                for contact in &mut self.contact_pool[..self.live_contacts] {
                    contact.solve_positions(colliders, bodies, h_inv_sq, gjk, epa);
                }
                self.constraints.for_each_mut(|_, c| c.solve_positions(bodies, h_inv_sq));
            }

            self.bodies.for_each_mut(|_, body| body.differentiate(h_inv));

            {
                let colliders = &self.colliders;
                let bodies = &mut self.bodies;
                for contact in &mut self.contact_pool[..self.live_contacts] {
                    contact.solve_velocities(colliders, bodies, h, gravity);
                }
                self.constraints.for_each_mut(|_, c| c.solve_velocities(bodies, h, h_inv_sq));
            }
        }
    }

    /// Rebuilds the transient contact pool from the current broadphase
    /// overlap set, skipping ignored pairs and growing the pool (logging
    /// each growth) rather than ever shrinking it.
    fn build_contacts(&mut self) {
        self.live_contacts = 0;

        let mut pairs: Vec<(Ref<Collider>, Ref<Collider>)> = Vec::new();
        {
            let colliders = &self.colliders;
            self.broadphase
                .for_each_overlap_pair(false, |a, b| same_body(colliders, a, b), |a, b| pairs.push((a, b)));
        }

        for (a, b) in pairs {
            if self.pair_ignored(a, b) {
                continue;
            }

            if self.live_contacts >= self.contact_pool.len() {
                self.contact_pool.push(ContactConstraint::unbound());
                log::debug!("contact pool grown to {} entries", self.contact_pool.len());
            }

            let idx = self.live_contacts;
            let bound = match (self.colliders.get(a), self.colliders.get(b)) {
                (Some(ca), Some(cb)) => {
                    self.contact_pool[idx].bind(a, b, ca, cb);
                    true
                }
                _ => false,
            };
            if bound {
                self.live_contacts += 1;
            }
        }
    }

    fn pair_ignored(&self, a: Ref<Collider>, b: Ref<Collider>) -> bool {
        let (ca, cb) = match (self.colliders.get(a), self.colliders.get(b)) {
            (Some(ca), Some(cb)) => (ca, cb),
            _ => return true,
        };

        if self.ignored_collider_pairs.contains(&unordered_key(a, b)) {
            return true;
        }

        if let (Some(ba), Some(bb)) = (ca.body, cb.body) {
            if self.ignored_body_pairs.contains(&unordered_key(ba, bb)) {
                return true;
            }
            if self.joint_ignores_pair(ba, bb) {
                return true;
            }
        }

        false
    }

    fn joint_ignores_pair(&self, a: Ref<Body>, b: Ref<Body>) -> bool {
        let mut ignored = false;
        self.constraints.for_each(|_, c| {
            if ignored || !c.ignore_collisions {
                return;
            }
            if (c.body_a == Some(a) && c.body_b == Some(b)) || (c.body_a == Some(b) && c.body_b == Some(a)) {
                ignored = true;
            }
        });
        ignored
    }

    /// Casts `ray` up to `max_distance`, against colliders matching `mask`,
    /// invoking `callback` with `(collider, point, normal, distance)` for
    /// each hit. Hits may be delivered in any order.
    pub fn raycast(&self, ray: &Ray, mask: u32, max_distance: f64, mut callback: impl FnMut(Ref<Collider>, Vec3, Vec3, f64)) {
        self.broadphase.raycast(ray, max_distance, mask, |collider_ref| {
            if let Some(collider) = self.colliders.get(collider_ref) {
                let body = collider.body.and_then(|r| self.bodies.get(r));
                let pose = collider.world_pose(body.map(|b| &b.pose));
                if let Some((point, normal, distance)) = collider.raycast(&pose, ray, max_distance) {
                    callback(collider_ref, point, normal, distance);
                }
            }
        });
    }

    /// Invokes `callback` for every currently colliding pair. Replays the
    /// most recent `simulate` call's live contacts if there are any;
    /// otherwise re-runs the broadphase and narrowphase for an ad-hoc,
    /// read-only query.
    pub fn for_each_collision(&self, mut callback: impl FnMut(Ref<Collider>, Ref<Collider>, &ContactPoint)) {
        if self.live_contacts > 0 {
            for contact in &self.contact_pool[..self.live_contacts] {
                if contact.colliding {
                    if let Some(point) = &contact.contact {
                        callback(contact.collider_a, contact.collider_b, point);
                    }
                }
            }
            return;
        }

        let mut pairs = Vec::new();
        self.broadphase.for_each_overlap_pair(
            false,
            |a, b| same_body(&self.colliders, a, b),
            |a, b| pairs.push((a, b)),
        );

        for (a, b) in pairs {
            if self.pair_ignored(a, b) {
                continue;
            }
            if let (Some(ca), Some(cb)) = (self.colliders.get(a), self.colliders.get(b)) {
                let pose_a = ca.world_pose(ca.body.and_then(|r| self.bodies.get(r)).map(|b| &b.pose));
                let pose_b = cb.world_pose(cb.body.and_then(|r| self.bodies.get(r)).map(|b| &b.pose));
                if let Some(contact) = narrowphase::compute(ca, &pose_a, cb, &pose_b, self.config.gjk_max_iterations, self.config.epa_max_iterations) {
                    callback(a, b, &contact);
                }
            }
        }
    }
}

fn same_body(colliders: &Store<Collider>, a: Ref<Collider>, b: Ref<Collider>) -> bool {
    match (colliders.get(a), colliders.get(b)) {
        (Some(ca), Some(cb)) => ca.body.is_some() && ca.body == cb.body,
        _ => false,
    }
}

fn hash_ref<T>(r: Ref<T>) -> u64 {
    let mut hasher = DefaultHasher::new();
    r.hash(&mut hasher);
    hasher.finish()
}

/// A symmetric 64-bit key for an unordered pair of handles, so `(a, b)` and
/// `(b, a)` hash and compare equal in the ignore sets.
fn unordered_key<T>(a: Ref<T>, b: Ref<T>) -> (u64, u64) {
    let (ha, hb) = (hash_ref(a), hash_ref(b));
    if ha <= hb {
        (ha, hb)
    } else {
        (hb, ha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use crate::collider::Shape;
    use crate::math::{Pose, Quat};
    use cgmath::{InnerSpace, One};

    fn sphere_collider(radius: f64) -> Collider {
        Collider::new(Shape::new_sphere(radius).unwrap(), Pose::identity(true), 1)
    }

    #[test]
    fn a_dropped_sphere_comes_to_rest_on_a_static_floor() {
        let mut config = WorldConfig::default();
        config.substeps = 12;
        let mut world = World::new(config);

        let body = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.0, 3.0, 0.0), Quat::one(), true)));
        world.add_collider(Some(body), sphere_collider(0.5));
        world.add_collider(None, sphere_collider(0.5));

        for _ in 0..240 {
            world.simulate(1.0 / 60.0, None);
        }

        let resting_height = world.bodies.get(body).unwrap().pose.position.y;
        assert!((resting_height - 1.0).abs() < 0.1, "resting height was {resting_height}");
    }

    #[test]
    fn ignored_body_pairs_never_produce_a_contact() {
        let mut world = World::new(WorldConfig::default());

        let a = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.0, 0.0, 0.0), Quat::one(), true)));
        let b = world.add_body(Body::new(BodyKind::Rigid, Pose::new(Vec3::new(0.2, 0.0, 0.0), Quat::one(), true)));
        world.add_collider(Some(a), sphere_collider(1.0));
        world.add_collider(Some(b), sphere_collider(1.0));

        world.ignore_body_pair(a, b);
        world.simulate(1.0 / 60.0, Some(1));

        let mut seen = 0;
        world.for_each_collision(|_, _, _| seen += 1);
        assert_eq!(seen, 0);
    }

    #[test]
    fn raycast_hits_a_static_collider_from_outside() {
        let mut world = World::new(WorldConfig::default());
        world.add_collider(None, sphere_collider(1.0));

        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut hit = false;
        world.raycast(&ray, 1, 20.0, |_, point, _, _| {
            hit = true;
            assert!((point.magnitude() - 1.0).abs() < 1e-6);
        });
        assert!(hit);
    }
}
