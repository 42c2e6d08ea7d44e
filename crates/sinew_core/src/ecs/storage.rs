//! # Component Storage
//!
//! Pre-allocated, dense component storage with lifecycle tracking.
//!
//! The storage uses a dense array strategy:
//! - All component slots are pre-allocated at creation
//! - Access is O(1) via entity index
//! - Every slot remembers which entity owns it, so stale ids miss
//! - Insertions and removals are queued until drained

use super::component::Component;
use super::entity::EntityId;
use std::any::Any;

/// Pre-allocated storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Transform> = ComponentStorage::new(1_000);
/// storage.insert(entity, Transform::default());
/// for added in storage.drain_added() { /* ... */ }
/// ```
pub struct ComponentStorage<C: Component> {
    /// The dense array of components.
    data: Box<[C]>,
    /// Owner of each slot, `EntityId::NULL` when vacant.
    owners: Box<[EntityId]>,
    /// Number of occupied slots.
    len: usize,
    /// Entities that received this component since the last drain.
    added: Vec<EntityId>,
    /// Values removed since the last drain, with their former owner.
    removed: Vec<(EntityId, C)>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates new component storage with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            data: vec![C::default(); capacity].into_boxed_slice(),
            owners: vec![EntityId::NULL; capacity].into_boxed_slice(),
            len: 0,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Returns the capacity of this storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of entities currently holding this component.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no entity holds this component.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks whether `id` currently owns a value in this storage.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        !id.is_null() && self.owners.get(id.index() as usize) == Some(&id)
    }

    /// Gets the component owned by `id`.
    ///
    /// # Returns
    ///
    /// Reference to the component, or None if `id` holds none or is stale.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&C> {
        if self.contains(id) {
            self.data.get(id.index() as usize)
        } else {
            None
        }
    }

    /// Gets the component owned by `id` mutably.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut C> {
        if self.contains(id) {
            self.data.get_mut(id.index() as usize)
        } else {
            None
        }
    }

    /// Stores `component` for `id`.
    ///
    /// Replacing an existing value queues the old one as removed and the
    /// entity as added again, so lifecycle consumers see both edges.
    ///
    /// # Returns
    ///
    /// `false` if the entity index is out of bounds.
    pub fn insert(&mut self, id: EntityId, component: C) -> bool {
        let idx = id.index() as usize;
        if id.is_null() || idx >= self.data.len() {
            return false;
        }

        if self.owners[idx] == id {
            self.removed.push((id, self.data[idx]));
        } else {
            if !self.owners[idx].is_null() {
                // Slot still held by a stale generation.
                self.removed.push((self.owners[idx], self.data[idx]));
                self.len -= 1;
            }
            self.owners[idx] = id;
            self.len += 1;
        }

        self.data[idx] = component;
        self.added.push(id);
        true
    }

    /// Removes the component owned by `id`, queuing it for
    /// [`drain_removed`](Self::drain_removed).
    ///
    /// # Returns
    ///
    /// The removed value, or None if `id` held nothing.
    pub fn remove(&mut self, id: EntityId) -> Option<C> {
        if !self.contains(id) {
            return None;
        }

        let idx = id.index() as usize;
        let value = std::mem::take(&mut self.data[idx]);
        self.owners[idx] = EntityId::NULL;
        self.len -= 1;
        self.removed.push((id, value));
        Some(value)
    }

    /// Iterates over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.owners
            .iter()
            .zip(self.data.iter())
            .filter(|(owner, _)| !owner.is_null())
            .map(|(owner, value)| (*owner, value))
    }

    /// Iterates mutably over occupied slots.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.owners
            .iter()
            .zip(self.data.iter_mut())
            .filter(|(owner, _)| !owner.is_null())
            .map(|(owner, value)| (*owner, value))
    }

    /// Takes the queue of entities that received this component.
    pub fn drain_added(&mut self) -> std::vec::Drain<'_, EntityId> {
        self.added.drain(..)
    }

    /// Takes the queue of removed values.
    pub fn drain_removed(&mut self) -> std::vec::Drain<'_, (EntityId, C)> {
        self.removed.drain(..)
    }

    /// Returns `true` if either lifecycle queue is non-empty.
    #[inline]
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Type-erased view of a storage, held by the [`World`](super::World).
pub(crate) trait AnyStorage: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove_entity(&mut self, id: EntityId);
}

impl<C: Component> AnyStorage for ComponentStorage<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_entity(&mut self, id: EntityId) {
        let _ = self.remove(id);
    }
}
