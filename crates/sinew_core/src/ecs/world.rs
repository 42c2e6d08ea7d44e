//! # ECS World
//!
//! The central container for all entities and components.
//! Entity slots are pre-allocated at creation; each registered component
//! type gets a storage of the same capacity.

use super::component::{Component, Transform};
use super::entity::{Entity, EntityId};
use super::storage::{AnyStorage, ComponentStorage};

/// Number of distinct component ids a world can hold.
const MAX_COMPONENT_TYPES: usize = 64;

/// The ECS World - container for all game state.
///
/// # Capacity
///
/// The world has a fixed capacity set at creation. This cannot be changed
/// at runtime.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(1_000);
///
/// let entity = world.spawn();
/// world.insert(entity, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
/// ```
pub struct World {
    /// All entity slots (pre-allocated).
    entities: Box<[Entity]>,
    /// Free list of entity indices for reuse.
    free_indices: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
    /// Maximum capacity.
    capacity: usize,
    /// Storages indexed by `Component::ID`.
    storages: Vec<Option<Box<dyn AnyStorage>>>,
}

impl World {
    /// Creates a new world with the specified entity capacity.
    ///
    /// [`Transform`] storage is registered up front.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        let entities = vec![Entity::VACANT; capacity].into_boxed_slice();

        // Highest index popped first so spawns start at 0.
        #[allow(clippy::cast_possible_truncation)]
        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        let mut world = Self {
            entities,
            free_indices,
            alive_count: 0,
            capacity,
            storages: (0..MAX_COMPONENT_TYPES).map(|_| None).collect(),
        };
        world.register::<Transform>();
        world
    }

    /// Returns the maximum capacity of this world.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Registers storage for component `C`. Registering twice is a no-op.
    pub fn register<C: Component>(&mut self) {
        let slot = &mut self.storages[usize::from(C::ID)];
        if slot.is_none() {
            *slot = Some(Box::new(ComponentStorage::<C>::new(self.capacity)));
        }
    }

    /// Returns `true` if component `C` has storage in this world.
    #[must_use]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.storage::<C>().is_some()
    }

    /// Storage for component `C`, if registered.
    #[must_use]
    pub fn storage<C: Component>(&self) -> Option<&ComponentStorage<C>> {
        self.storages
            .get(usize::from(C::ID))?
            .as_ref()?
            .as_any()
            .downcast_ref::<ComponentStorage<C>>()
    }

    /// Mutable storage for component `C`, if registered.
    pub fn storage_mut<C: Component>(&mut self) -> Option<&mut ComponentStorage<C>> {
        self.storages
            .get_mut(usize::from(C::ID))?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<C>>()
    }

    /// Spawns a new entity, returning its ID.
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached.
    #[inline]
    pub fn spawn(&mut self) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            return EntityId::NULL;
        };

        let id = self.entities[index as usize].occupy(index);
        self.alive_count += 1;
        id
    }

    /// Despawns an entity, removing every component it holds.
    ///
    /// Removed components land in their storage's removed queue, so
    /// lifecycle consumers observe the despawn.
    ///
    /// # Returns
    ///
    /// `true` if the entity was despawned, `false` if it was already dead
    /// or the ID was invalid/stale.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }

        let held = self.entities[id.index() as usize].vacate();
        for component_id in held.iter() {
            if let Some(Some(storage)) = self.storages.get_mut(usize::from(component_id)) {
                storage.remove_entity(id);
            }
        }
        self.alive_count -= 1;
        self.free_indices.push(id.index());
        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }

        self.entities
            .get(id.index() as usize)
            .is_some_and(|e| e.is_alive() && e.id() == id)
    }

    /// Gets an entity by ID.
    ///
    /// # Returns
    ///
    /// Reference to the entity, or None if not found/dead/stale.
    #[inline]
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.entities[id.index() as usize])
    }

    /// Attaches `component` to `id`, registering storage on first use.
    ///
    /// # Returns
    ///
    /// `false` if the entity is not alive.
    pub fn insert<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.register::<C>();

        let inserted = self
            .storage_mut::<C>()
            .is_some_and(|storage| storage.insert(id, component));
        if inserted {
            self.entities[id.index() as usize].components.insert(C::ID);
        }
        inserted
    }

    /// Detaches component `C` from `id`.
    pub fn remove<C: Component>(&mut self, id: EntityId) -> Option<C> {
        if !self.is_alive(id) {
            return None;
        }
        let removed = self.storage_mut::<C>()?.remove(id);
        if removed.is_some() {
            self.entities[id.index() as usize].components.remove(C::ID);
        }
        removed
    }

    /// Reads component `C` of `id`.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        self.storage::<C>()?.get(id)
    }

    /// Mutably reads component `C` of `id`.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        self.storage_mut::<C>()?.get_mut(id)
    }

    /// Checks whether `id` holds component `C`.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|e| e.components().contains(C::ID))
    }
}
