//! Two dynamic BVHs -- one for moving colliders, one for immobile ones --
//! wrapped behind a single `Ref<Collider>`-keyed API. Velocity-predicted
//! padding keeps the dynamic tree from needing an update every single
//! substep; the static tree only moves when told to explicitly.

mod tree;

use crate::collider::Collider;
use crate::math::{Bounds, Ray, Vec3};
use crate::store::Ref;
pub use tree::Handle;

use std::collections::HashMap;

/// Two-tree broadphase: `Handle`s from the dynamic and static trees are
/// disjoint handle spaces (each its own `slotmap`), so callers must track
/// which tree a collider was added to -- exactly as they already track
/// whether a collider is static via `Collider::body`.
pub struct Broadphase {
    dynamic: tree::BoundsTree,
    static_tree: tree::BoundsTree,
    dynamic_info: HashMap<Handle, (Ref<Collider>, Bounds)>,
    static_info: HashMap<Handle, (Ref<Collider>, Bounds)>,
    pad_factor: f64,
}

impl Broadphase {
    /// A new, empty broadphase. `pad_factor` scales the velocity-predicted
    /// margin added to dynamic bounds (see [`Broadphase::update`]).
    pub fn new(pad_factor: f64) -> Self {
        Broadphase {
            dynamic: tree::BoundsTree::new(),
            static_tree: tree::BoundsTree::new(),
            dynamic_info: HashMap::new(),
            static_info: HashMap::new(),
            pad_factor,
        }
    }

    /// Inserts a moving collider with its current world bounds.
    pub fn add(&mut self, collider: Ref<Collider>, bounds: Bounds, mask: u32) -> Handle {
        let handle = self.dynamic.add(bounds, mask);
        self.dynamic_info.insert(handle, (collider, bounds));
        handle
    }

    /// Removes a previously added moving collider.
    pub fn remove(&mut self, handle: Handle) {
        self.dynamic.remove(handle);
        self.dynamic_info.remove(&handle);
    }

    /// Inserts an immobile collider.
    pub fn add_static(&mut self, collider: Ref<Collider>, bounds: Bounds, mask: u32) -> Handle {
        let handle = self.static_tree.add(bounds, mask);
        self.static_info.insert(handle, (collider, bounds));
        handle
    }

    /// Removes a previously added immobile collider.
    pub fn remove_static(&mut self, handle: Handle) {
        self.static_tree.remove(handle);
        self.static_info.remove(&handle);
    }

    /// Explicitly moves a static collider (there is no implicit dirty
    /// tracking for the static tree).
    pub fn update_static(&mut self, handle: Handle, bounds: Bounds, mask: u32) {
        self.static_tree.update(handle, bounds, mask);
        if let Some(entry) = self.static_info.get_mut(&handle) {
            entry.1 = bounds;
        }
    }

    /// Refreshes every dynamic entry's padded bounds. `current_state`
    /// returns `(current world bounds, linear velocity)` for a collider;
    /// the caller (the world) supplies this since the broadphase does not
    /// itself hold bodies.
    pub fn update(&mut self, dt: f64, mut current_state: impl FnMut(Ref<Collider>) -> (Bounds, Vec3)) {
        let handles: Vec<Handle> = self.dynamic_info.keys().copied().collect();
        for handle in handles {
            let (collider, padded) = self.dynamic_info[&handle];
            let (current_bounds, velocity) = current_state(collider);

            let displacement = velocity * (self.pad_factor * dt);
            let predicted = current_bounds.merged_bounds(&Bounds::new(current_bounds.center + displacement, current_bounds.extents()));

            if !padded.contains_bounds(&predicted) {
                let half_extents = current_bounds.extents() * 0.5;
                let enlarged = padded.merged_bounds(&predicted).expanded_vec(half_extents);
                let mask = self.dynamic.mask(handle);
                self.dynamic.update(handle, enlarged, mask);
                self.dynamic_info.insert(handle, (collider, enlarged));
            }
        }
    }

    /// Raycasts both trees, reporting each hit collider at most once per tree.
    pub fn raycast(&self, ray: &Ray, max_distance: f64, mask: u32, mut callback: impl FnMut(Ref<Collider>)) {
        self.dynamic.raycast(ray, max_distance, mask, |h| {
            if let Some(&(collider, _)) = self.dynamic_info.get(&h) {
                callback(collider);
            }
        });
        self.static_tree.raycast(ray, max_distance, mask, |h| {
            if let Some(&(collider, _)) = self.static_info.get(&h) {
                callback(collider);
            }
        });
    }

    /// Enumerates dynamic-dynamic and dynamic-static overlap pairs.
    /// `same_body` lets the caller drop pairs of colliders owned by the
    /// same body; static-static pairs are never produced (immobile
    /// colliders never need to be tested against each other).
    pub fn for_each_overlap_pair(
        &self,
        exclusive: bool,
        same_body: impl Fn(Ref<Collider>, Ref<Collider>) -> bool,
        mut callback: impl FnMut(Ref<Collider>, Ref<Collider>),
    ) {
        self.dynamic.for_each_overlap_pair(exclusive, |a, b| {
            if let (Some(&(ra, _)), Some(&(rb, _))) = (self.dynamic_info.get(&a), self.dynamic_info.get(&b)) {
                if !same_body(ra, rb) {
                    callback(ra, rb);
                }
            }
        });

        for (&handle, &(collider, bounds)) in &self.dynamic_info {
            let mask = self.dynamic.mask(handle);
            self.static_tree.intersects(&bounds, mask, exclusive, |static_handle| {
                if let Some(&(static_collider, _)) = self.static_info.get(&static_handle) {
                    if !same_body(collider, static_collider) {
                        callback(collider, static_collider);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::Shape;
    use crate::math::Pose;
    use crate::store::Store;

    fn sphere_collider(store: &mut Store<Collider>, radius: f64) -> Ref<Collider> {
        let shape = Shape::new_sphere(radius).unwrap();
        store.store(Collider::new(shape, Pose::identity(true), 1))
    }

    fn bounds_at(center: Vec3, radius: f64) -> Bounds {
        Bounds::new(center, Vec3::new(radius, radius, radius))
    }

    #[test]
    fn dynamic_static_overlap_is_reported_and_same_body_pairs_are_filtered() {
        let mut colliders: Store<Collider> = Store::new();
        let moving = sphere_collider(&mut colliders, 1.0);
        let moving_sibling = sphere_collider(&mut colliders, 1.0);
        let ground = sphere_collider(&mut colliders, 1.0);

        let mut bp = Broadphase::new(2.0);
        bp.add(moving, bounds_at(Vec3::new(0.0, 0.0, 0.0), 1.0), 1);
        bp.add(moving_sibling, bounds_at(Vec3::new(0.3, 0.0, 0.0), 1.0), 1);
        bp.add_static(ground, bounds_at(Vec3::new(0.5, 0.0, 0.0), 1.0), 1);

        let mut pairs = Vec::new();
        bp.for_each_overlap_pair(
            false,
            |a, b| a == moving && b == moving_sibling || a == moving_sibling && b == moving,
            |a, b| pairs.push((a, b)),
        );

        assert!(pairs.iter().any(|&(a, b)| (a == moving && b == ground) || (a == moving_sibling && b == ground)));
        assert!(!pairs.iter().any(|&(a, b)| (a == moving && b == moving_sibling) || (a == moving_sibling && b == moving)));
    }

    #[test]
    fn raycast_reaches_into_both_trees() {
        let mut colliders: Store<Collider> = Store::new();
        let dynamic_ball = sphere_collider(&mut colliders, 1.0);
        let static_ball = sphere_collider(&mut colliders, 1.0);

        let mut bp = Broadphase::new(2.0);
        bp.add(dynamic_ball, bounds_at(Vec3::new(0.0, 0.0, 0.0), 1.0), 1);
        bp.add_static(static_ball, bounds_at(Vec3::new(10.0, 0.0, 0.0), 1.0), 1);

        let ray = Ray::new(Vec3::new(-20.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut hit = Vec::new();
        bp.raycast(&ray, 40.0, 1, |c| hit.push(c));

        assert!(hit.contains(&dynamic_ball));
        assert!(hit.contains(&static_ball));
    }

    #[test]
    fn update_enlarges_padding_to_cover_predicted_motion() {
        let mut colliders: Store<Collider> = Store::new();
        let ball = sphere_collider(&mut colliders, 1.0);

        let mut bp = Broadphase::new(2.0);
        let initial = bounds_at(Vec3::new(0.0, 0.0, 0.0), 1.0);
        bp.add(ball, initial, 1);

        bp.update(1.0, |_| (bounds_at(Vec3::new(0.0, 0.0, 0.0), 1.0), Vec3::new(5.0, 0.0, 0.0)));

        let handle = *bp.dynamic_info.keys().next().unwrap();
        let padded = bp.dynamic_info[&handle].1;
        assert!(padded.contains(Vec3::new(9.0, 0.0, 0.0)));
    }
}
