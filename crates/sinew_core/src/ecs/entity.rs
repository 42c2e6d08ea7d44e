//! # Entities
//!
//! An [`EntityId`] packs a slot index with the slot's generation, so an id
//! kept past its despawn never aliases the slot's next occupant.

/// Generational entity identifier.
///
/// Low 32 bits: slot index. High 32 bits: generation of the slot when the
/// id was handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Id no live entity ever has.
    pub const NULL: Self = Self(u64::MAX);

    /// Packs a slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Slot generation at spawn time.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns `true` for [`EntityId::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    /// Raw packed value, for storing the id outside the ECS.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds an id from [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

/// Set of component ids (0..64) attached to one entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// No components.
    pub const EMPTY: Self = Self(0);

    /// Returns `true` if `id` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, id: u8) -> bool {
        id < 64 && self.0 & (1 << id) != 0
    }

    #[inline]
    pub(crate) fn insert(&mut self, id: u8) {
        self.0 |= 1 << id;
    }

    #[inline]
    pub(crate) fn remove(&mut self, id: u8) {
        self.0 &= !(1 << id);
    }

    /// Returns `true` if no component is attached.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Component ids in the set, ascending.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..64u8).filter(move |&id| self.contains(id))
    }
}

/// One entity slot of a [`World`](super::World).
#[derive(Clone, Copy, Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) components: ComponentMask,
    pub(crate) alive: bool,
}

impl Entity {
    /// Never-used slot.
    pub(crate) const VACANT: Self = Self {
        id: EntityId::new(0, 0),
        components: ComponentMask::EMPTY,
        alive: false,
    };

    /// Takes the slot for a new entity one generation past the last one.
    pub(crate) fn occupy(&mut self, index: u32) -> EntityId {
        let generation = self.id.generation().wrapping_add(1);
        self.id = EntityId::new(index, generation);
        self.components = ComponentMask::EMPTY;
        self.alive = true;
        self.id
    }

    /// Frees the slot, returning the components it held. The id keeps its
    /// generation so the next occupant gets a fresh one.
    pub(crate) fn vacate(&mut self) -> ComponentMask {
        self.alive = false;
        std::mem::take(&mut self.components)
    }

    /// Current (or last) id of the slot.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Components attached.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> ComponentMask {
        self.components
    }

    /// Returns `true` while an entity occupies the slot.
    #[inline]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }
}
