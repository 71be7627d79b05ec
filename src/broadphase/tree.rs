//! A dynamic bounding-volume hierarchy: SAH-guided insertion plus
//! Catto-style tree rotations during refit, all keyed by a single stable
//! handle per leaf (no separate leaf/node numbering to keep in sync).
//!
//! A leaf's [`Handle`] never changes across [`BoundsTree::update`] calls --
//! only the internal parent nodes above it are torn down and rebuilt, the
//! same swap-erase-and-reuse discipline the rest of the crate follows for
//! stable references.

use crate::math::{Bounds, Ray};
use slotmap::{new_key_type, Key, SlotMap};
use std::collections::HashSet;

new_key_type! {
    /// A handle to a single leaf (or, internally, an internal node) in a [`BoundsTree`].
    pub struct Handle;
}

#[derive(Clone, Copy)]
enum NodeKind {
    Leaf,
    Internal { left: Handle, right: Handle },
}

struct Node {
    bounds: Bounds,
    mask: u32,
    parent: Option<Handle>,
    kind: NodeKind,
}

/// A single dynamic BVH. See the module docs for the handle-stability contract.
#[derive(Default)]
pub struct BoundsTree {
    nodes: SlotMap<Handle, Node>,
    root: Option<Handle>,
    leaves: HashSet<Handle>,
}

impl BoundsTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves currently in the tree.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree holds no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Current bounds of `handle` (leaf or, if queried internally, an ancestor).
    pub fn bounds(&self, handle: Handle) -> Bounds {
        self.nodes[handle].bounds
    }

    /// Current mask of `handle`.
    pub fn mask(&self, handle: Handle) -> u32 {
        self.nodes[handle].mask
    }

    /// Inserts a new leaf with `bounds`/`mask`, returning a handle stable
    /// across future [`BoundsTree::update`] calls.
    pub fn add(&mut self, bounds: Bounds, mask: u32) -> Handle {
        let key = self.nodes.insert(Node {
            bounds,
            mask,
            parent: None,
            kind: NodeKind::Leaf,
        });
        self.leaves.insert(key);
        self.attach(key);
        key
    }

    /// Detaches and reinserts `handle` with new bounds/mask, re-running SAH
    /// insertion. `handle` itself is unchanged.
    pub fn update(&mut self, handle: Handle, bounds: Bounds, mask: u32) {
        self.detach(handle);
        self.nodes[handle].bounds = bounds;
        self.nodes[handle].mask = mask;
        self.attach(handle);
    }

    /// Updates only `handle`'s mask, propagating the OR upward without
    /// touching tree topology.
    pub fn update_mask(&mut self, handle: Handle, mask: u32) {
        self.nodes[handle].mask = mask;
        let mut node = self.nodes[handle].parent;
        while let Some(n) = node {
            if let NodeKind::Internal { left, right } = self.nodes[n].kind {
                self.nodes[n].mask = self.nodes[left].mask | self.nodes[right].mask;
            }
            node = self.nodes[n].parent;
        }
    }

    /// Removes `handle` from the tree entirely.
    pub fn remove(&mut self, handle: Handle) {
        self.leaves.remove(&handle);
        self.detach(handle);
        self.nodes.remove(handle);
    }

    fn attach(&mut self, handle: Handle) {
        match self.root {
            None => self.root = Some(handle),
            Some(_) => {
                let bounds = self.nodes[handle].bounds;
                let sibling = self.find_best_sibling(&bounds);
                self.insert_sibling(handle, sibling);
            }
        }
    }

    /// Splices `handle` out of the tree structure without deleting its node,
    /// leaving it parentless; `root` becomes `None` if it was the sole leaf.
    fn detach(&mut self, handle: Handle) {
        let parent = match self.nodes[handle].parent {
            None => {
                self.root = None;
                return;
            }
            Some(p) => p,
        };
        let grandparent = self.nodes[parent].parent;
        let sibling = match self.nodes[parent].kind {
            NodeKind::Internal { left, right } => {
                if left == handle {
                    right
                } else {
                    left
                }
            }
            NodeKind::Leaf => unreachable!("a leaf's parent is always internal"),
        };

        match grandparent {
            None => {
                self.root = Some(sibling);
                self.nodes[sibling].parent = None;
            }
            Some(g) => {
                self.nodes[sibling].parent = Some(g);
                if let NodeKind::Internal { left, right } = &mut self.nodes[g].kind {
                    if *left == parent {
                        *left = sibling;
                    } else {
                        *right = sibling;
                    }
                }
            }
        }

        self.nodes.remove(parent);
        self.nodes[handle].parent = None;

        if let Some(g) = grandparent {
            self.refit_from(g);
        }
    }

    /// Finds the existing leaf whose SAH insertion cost for `bounds` is
    /// smallest, via branch-and-bound descent from the root.
    fn find_best_sibling(&self, bounds: &Bounds) -> Handle {
        let root = self.root.expect("find_best_sibling requires a non-empty tree");
        let mut best_cost = f64::INFINITY;
        let mut best = root;
        let mut stack = vec![(root, 0.0_f64)];

        while let Some((key, inherited_cost)) = stack.pop() {
            let node = &self.nodes[key];
            let merged_sa = node.bounds.merged_bounds(bounds).surface_area();
            let total_cost = merged_sa + inherited_cost;

            if matches!(node.kind, NodeKind::Leaf) && total_cost < best_cost {
                best_cost = total_cost;
                best = key;
            }

            if let NodeKind::Internal { left, right } = node.kind {
                let child_inherited = inherited_cost + (merged_sa - node.bounds.surface_area());
                if child_inherited < best_cost {
                    stack.push((left, child_inherited));
                    stack.push((right, child_inherited));
                }
            }
        }
        best
    }

    /// Splices `new_leaf` in as `sibling`'s new sibling under a freshly
    /// created internal parent, then refits upward.
    fn insert_sibling(&mut self, new_leaf: Handle, sibling: Handle) {
        let old_parent = self.nodes[sibling].parent;
        let merged = self.nodes[sibling].bounds.merged_bounds(&self.nodes[new_leaf].bounds);
        let merged_mask = self.nodes[sibling].mask | self.nodes[new_leaf].mask;

        let new_parent = self.nodes.insert(Node {
            bounds: merged,
            mask: merged_mask,
            parent: old_parent,
            kind: NodeKind::Internal {
                left: sibling,
                right: new_leaf,
            },
        });
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[new_leaf].parent = Some(new_parent);

        match old_parent {
            None => self.root = Some(new_parent),
            Some(op) => {
                if let NodeKind::Internal { left, right } = &mut self.nodes[op].kind {
                    if *left == sibling {
                        *left = new_parent;
                    } else {
                        *right = new_parent;
                    }
                }
            }
        }

        self.refit_from(new_parent);
    }

    /// Walks from `node` to the root, attempting a rotation then
    /// recomputing bounds/mask (always the OR of *both* children -- the
    /// reference implementation's single-child-OR-with-itself bug is not
    /// reproduced here).
    fn refit_from(&mut self, mut node: Handle) {
        loop {
            self.try_rotate(node);
            if let NodeKind::Internal { left, right } = self.nodes[node].kind {
                self.nodes[node].bounds = self.nodes[left].bounds.merged_bounds(&self.nodes[right].bounds);
                self.nodes[node].mask = self.nodes[left].mask | self.nodes[right].mask;
            }
            match self.nodes[node].parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }

    /// Considers swapping one of `p`'s children with `p`'s aunt (its
    /// parent's other child); performs whichever swap most reduces `p`'s
    /// surface area, if either does.
    fn try_rotate(&mut self, p: Handle) {
        let g = match self.nodes[p].parent {
            Some(g) => g,
            None => return,
        };
        let (p_left, p_right) = match self.nodes[p].kind {
            NodeKind::Internal { left, right } => (left, right),
            NodeKind::Leaf => return,
        };
        let (g_left, g_right) = match self.nodes[g].kind {
            NodeKind::Internal { left, right } => (left, right),
            NodeKind::Leaf => unreachable!("a parent is always internal"),
        };
        let aunt = if g_left == p { g_right } else { g_left };

        let current_cost = self.nodes[p].bounds.surface_area();
        let cost_swap_left = self.nodes[aunt].bounds.merged_bounds(&self.nodes[p_right].bounds).surface_area();
        let cost_swap_right = self.nodes[aunt].bounds.merged_bounds(&self.nodes[p_left].bounds).surface_area();

        if cost_swap_left < current_cost && cost_swap_left <= cost_swap_right {
            self.swap_rotate(p, g, p_left, aunt, p_right);
        } else if cost_swap_right < current_cost {
            self.swap_rotate(p, g, p_right, aunt, p_left);
        }
    }

    /// Moves `moved_into_p` (currently `g`'s child) to become `p`'s child
    /// alongside `kept_in_p`, and moves `moved_out_of_p` up to `g` in its place.
    fn swap_rotate(&mut self, p: Handle, g: Handle, moved_out_of_p: Handle, moved_into_p: Handle, kept_in_p: Handle) {
        self.nodes[p].kind = NodeKind::Internal {
            left: moved_into_p,
            right: kept_in_p,
        };
        self.nodes[moved_into_p].parent = Some(p);
        self.nodes[p].bounds = self.nodes[moved_into_p].bounds.merged_bounds(&self.nodes[kept_in_p].bounds);
        self.nodes[p].mask = self.nodes[moved_into_p].mask | self.nodes[kept_in_p].mask;

        if let NodeKind::Internal { left, right } = &mut self.nodes[g].kind {
            if *left == moved_into_p {
                *left = moved_out_of_p;
            } else {
                *right = moved_out_of_p;
            }
        }
        self.nodes[moved_out_of_p].parent = Some(g);
    }

    /// DFS from the root, reporting every leaf whose bounds the ray hits
    /// within `max_distance` and whose mask overlaps `mask`.
    pub fn raycast(&self, ray: &Ray, max_distance: f64, mask: u32, mut callback: impl FnMut(Handle)) {
        let root = match self.root {
            Some(r) => r,
            None => return,
        };
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            if node.mask & mask == 0 {
                continue;
            }
            let hit = match node.bounds.intersects_ray(ray) {
                Some(t) => t <= max_distance,
                None => false,
            };
            if !hit {
                continue;
            }
            match node.kind {
                NodeKind::Leaf => callback(key),
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// DFS from the root, reporting every leaf whose bounds overlap `query`
    /// and whose mask overlaps `mask`.
    pub fn intersects(&self, query: &Bounds, mask: u32, exclusive: bool, mut callback: impl FnMut(Handle)) {
        let root = match self.root {
            Some(r) => r,
            None => return,
        };
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            if node.mask & mask == 0 {
                continue;
            }
            let hit = if exclusive {
                node.bounds.intersects_exclusive(query)
            } else {
                node.bounds.intersects(query)
            };
            if !hit {
                continue;
            }
            match node.kind {
                NodeKind::Leaf => callback(key),
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Enumerates every pair of leaves whose bounds overlap and whose masks
    /// overlap, each exactly once, never reporting a leaf against itself.
    pub fn for_each_overlap_pair(&self, exclusive: bool, mut callback: impl FnMut(Handle, Handle)) {
        let mut seen: HashSet<(u64, u64)> = HashSet::new();
        for &leaf in &self.leaves {
            let node = &self.nodes[leaf];
            let bounds = node.bounds;
            let mask = node.mask;
            self.intersects(&bounds, mask, exclusive, |other| {
                if other == leaf {
                    return;
                }
                let a = leaf.data().as_ffi();
                let b = other.data().as_ffi();
                let key = if a < b { (a, b) } else { (b, a) };
                if seen.insert(key) {
                    callback(leaf, other);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn leaf_bounds(center: Vec3) -> Bounds {
        Bounds::new(center, Vec3::new(0.5, 0.5, 0.5))
    }

    fn assert_tree_invariants(tree: &BoundsTree) {
        for (key, node) in tree.nodes.iter() {
            if let NodeKind::Internal { left, right } = node.kind {
                let expected_bounds = tree.nodes[left].bounds.merged_bounds(&tree.nodes[right].bounds);
                assert_eq!(node.bounds, expected_bounds, "bounds mismatch at internal node");
                assert_eq!(
                    node.mask,
                    tree.nodes[left].mask | tree.nodes[right].mask,
                    "mask mismatch at internal node"
                );
            }
            let _ = key;
        }
    }

    #[test]
    fn insert_and_refit_maintain_bounds_and_mask_invariants() {
        let mut tree = BoundsTree::new();
        for i in 0..64 {
            let center = Vec3::new(i as f64, (i % 7) as f64, (i % 3) as f64);
            tree.add(leaf_bounds(center), 1 << (i % 4));
        }
        assert_tree_invariants(&tree);
    }

    #[test]
    fn remove_keeps_surviving_handles_valid_and_invariants_hold() {
        let mut tree = BoundsTree::new();
        let handles: Vec<Handle> = (0..32)
            .map(|i| tree.add(leaf_bounds(Vec3::new(i as f64, 0.0, 0.0)), 1))
            .collect();

        tree.remove(handles[5]);
        tree.remove(handles[17]);
        assert_tree_invariants(&tree);
        assert_eq!(tree.len(), 30);

        for (i, &h) in handles.iter().enumerate() {
            if i == 5 || i == 17 {
                continue;
            }
            assert_eq!(tree.bounds(h).center, Vec3::new(i as f64, 0.0, 0.0));
        }
    }

    #[test]
    fn update_preserves_handle_identity() {
        let mut tree = BoundsTree::new();
        let handles: Vec<Handle> = (0..16)
            .map(|i| tree.add(leaf_bounds(Vec3::new(i as f64, 0.0, 0.0)), 1))
            .collect();

        let target = handles[8];
        tree.update(target, leaf_bounds(Vec3::new(100.0, 0.0, 0.0)), 2);
        assert_tree_invariants(&tree);
        assert_eq!(tree.bounds(target).center, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(tree.mask(target), 2);
    }

    #[test]
    fn overlap_pairs_match_brute_force_and_have_no_duplicates_or_self_pairs() {
        let mut tree = BoundsTree::new();
        let mut handles = Vec::new();
        let centers = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.8, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.4, 0.4, 0.0),
        ];
        for c in centers {
            handles.push(tree.add(leaf_bounds(c), 0xFF));
        }

        let mut found: HashSet<(u64, u64)> = HashSet::new();
        tree.for_each_overlap_pair(false, |a, b| {
            assert_ne!(a, b);
            let ka = a.data().as_ffi();
            let kb = b.data().as_ffi();
            let key = if ka < kb { (ka, kb) } else { (kb, ka) };
            assert!(found.insert(key), "duplicate pair reported");
        });

        let mut brute = HashSet::new();
        for i in 0..handles.len() {
            for j in (i + 1)..handles.len() {
                if tree.bounds(handles[i]).intersects(&tree.bounds(handles[j])) {
                    let ka = handles[i].data().as_ffi();
                    let kb = handles[j].data().as_ffi();
                    brute.insert(if ka < kb { (ka, kb) } else { (kb, ka) });
                }
            }
        }
        assert_eq!(found, brute);
    }

    #[test]
    fn raycast_matches_brute_force() {
        let mut tree = BoundsTree::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let center = Vec3::new((i * 3) as f64 - 70.0, 0.0, 0.0);
            handles.push(tree.add(leaf_bounds(center), 1));
        }

        let ray = Ray::new(Vec3::new(-100.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let max_distance = 40.0;

        let mut hit: HashSet<Handle> = HashSet::new();
        tree.raycast(&ray, max_distance, 1, |h| {
            hit.insert(h);
        });

        let mut brute: HashSet<Handle> = HashSet::new();
        for &h in &handles {
            if let Some(t) = tree.bounds(h).intersects_ray(&ray) {
                if t <= max_distance {
                    brute.insert(h);
                }
            }
        }
        assert_eq!(hit, brute);
    }
}
