//! Dense storage with weak references that survive swap-erase elsewhere in
//! the store, built directly on [`slotmap::SlotMap`].
//!
//! Every store in the engine (bodies, colliders, constraints) is a distinct
//! `Store<T>`; a [`Ref<T>`] is only meaningful against the store that
//! produced it. `SlotMap` already gives us the generation-checked weak
//! handle the reference implementation builds by hand with a shared
//! `(id, index)` metadata block, so this module is a thin, typed wrapper
//! rather than a reimplementation.

use slotmap::{new_key_type, Key, SlotMap};
use std::marker::PhantomData;

new_key_type! {
    struct StoreKey;
}

/// A weak handle into a [`Store<T>`]. Valid iff the store that produced it
/// still contains an entry with the same generation; dereferencing a stale
/// `Ref` (via [`Store::get`]/[`Store::get_mut`]) returns `None` rather than
/// aliasing freed memory.
#[derive(Debug)]
pub struct Ref<T> {
    key: StoreKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// A `Ref` that can never resolve in any store; useful as a placeholder
    /// before a value is known, analogous to a null handle.
    pub fn null() -> Self {
        Ref {
            key: StoreKey::null(),
            _marker: PhantomData,
        }
    }

    /// Whether this handle is the null handle. Does not check membership in
    /// any particular store -- use [`Store::get`] for that.
    pub fn is_null(&self) -> bool {
        self.key.is_null()
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Ref<T> {}
impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<T> Eq for Ref<T> {}
impl<T> std::hash::Hash for Ref<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state)
    }
}

/// Dense, swap-erase-on-removal storage for `T`, handing out stable [`Ref<T>`]s.
#[derive(Debug)]
pub struct Store<T> {
    slots: SlotMap<StoreKey, T>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Store {
            slots: SlotMap::with_key(),
        }
    }
}

impl<T> Store<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value`, returning a `Ref` that will dereference to it until erased.
    pub fn store(&mut self, value: T) -> Ref<T> {
        let key = self.slots.insert(value);
        Ref {
            key,
            _marker: PhantomData,
        }
    }

    /// Removes the entry `r` refers to, if any. Returns `true` if something was removed.
    ///
    /// This is O(1): `SlotMap` performs the swap-with-last internally and
    /// bumps the removed slot's generation, which is exactly what makes
    /// every other outstanding `Ref` to the *moved* element keep resolving
    /// correctly while `r` itself (and any other handle to the erased
    /// element) starts reporting `None`.
    pub fn erase(&mut self, r: Ref<T>) -> bool {
        self.slots.remove(r.key).is_some()
    }

    /// Erases every entry matching `predicate`. Snapshots the key set before
    /// mutating so the predicate may safely observe the store mid-iteration
    /// without iterator invalidation.
    pub fn erase_where(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        let keys: Vec<StoreKey> = self.slots.keys().collect();
        for key in keys {
            if let Some(value) = self.slots.get(key) {
                if predicate(value) {
                    self.slots.remove(key);
                }
            }
        }
    }

    /// Looks up `r`, returning `None` if it is stale or refers to a different store.
    pub fn get(&self, r: Ref<T>) -> Option<&T> {
        self.slots.get(r.key)
    }

    /// Mutable lookup; see [`Store::get`].
    pub fn get_mut(&mut self, r: Ref<T>) -> Option<&mut T> {
        self.slots.get_mut(r.key)
    }

    /// Whether `r` currently resolves to an entry in this store.
    pub fn contains(&self, r: Ref<T>) -> bool {
        self.slots.contains_key(r.key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Invokes `callback` for every live entry, in unspecified order.
    pub fn for_each(&self, mut callback: impl FnMut(Ref<T>, &T)) {
        for (key, value) in self.slots.iter() {
            callback(
                Ref {
                    key,
                    _marker: PhantomData,
                },
                value,
            );
        }
    }

    /// Mutable variant of [`Store::for_each`].
    pub fn for_each_mut(&mut self, mut callback: impl FnMut(Ref<T>, &mut T)) {
        for (key, value) in self.slots.iter_mut() {
            callback(
                Ref {
                    key,
                    _marker: PhantomData,
                },
                value,
            );
        }
    }

    /// Iterator over `(Ref<T>, &T)` pairs, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Ref<T>, &T)> {
        self.slots.iter().map(|(key, value)| {
            (
                Ref {
                    key,
                    _marker: PhantomData,
                },
                value,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_is_swap_based_and_keeps_other_refs_valid() {
        let mut store: Store<i32> = Store::new();
        let mut refs = Vec::new();
        for i in 0..100 {
            refs.push(store.store(i));
        }

        let target = refs[42];
        assert_eq!(*store.get(target).unwrap(), 42);

        store.erase(refs[17]);

        assert_eq!(*store.get(target).unwrap(), 42);
        assert!(store.get(refs[17]).is_none());
        assert_eq!(store.len(), 99);

        for (i, r) in refs.iter().enumerate() {
            if i == 17 {
                continue;
            }
            assert_eq!(*store.get(*r).unwrap(), i as i32);
        }
    }

    #[test]
    fn erase_where_snapshots_keys() {
        let mut store: Store<i32> = Store::new();
        for i in 0..10 {
            store.store(i);
        }
        store.erase_where(|v| v % 2 == 0);
        assert_eq!(store.len(), 5);
        store.for_each(|_, v| assert!(v % 2 == 1));
    }

    #[test]
    fn null_ref_never_resolves() {
        let store: Store<i32> = Store::new();
        let r: Ref<i32> = Ref::null();
        assert!(r.is_null());
        assert!(store.get(r).is_none());
    }
}
