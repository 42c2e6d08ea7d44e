//! # Materials
//!
//! Friction/restitution profiles registered once and referenced by id.
//! Ids start at 1, grow by one per registration and are never reused.

use crate::error::{PhysicsError, PhysicsResult};
use std::num::NonZeroU32;

/// Identifier of a registered [`Material`]. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(NonZeroU32);

impl MaterialId {
    /// Raw id number.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Id of the registry slot at `index`.
    pub(crate) fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1));
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MAX))
    }

    const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "material#{}", self.0)
    }
}

/// Surface profile.
///
/// Values are stored exactly as registered; bodies clamp them when a
/// material is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Friction while at rest.
    pub static_friction: f32,
    /// Friction while sliding. Bodies take this as their friction.
    pub dynamic_friction: f32,
    /// Bounciness.
    pub restitution: f32,
}

impl Material {
    /// 0.5 / 0.5 / 0.0.
    pub const DEFAULT: Self = Self::new(0.5, 0.5, 0.0);

    /// Creates a profile.
    #[inline]
    #[must_use]
    pub const fn new(static_friction: f32, dynamic_friction: f32, restitution: f32) -> Self {
        Self {
            static_friction,
            dynamic_friction,
            restitution,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Registry of materials owned by the physics core.
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
}

impl MaterialRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `material` and returns the next id.
    pub fn register(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId::from_index(self.materials.len() - 1)
    }

    /// Looks up a material by raw id.
    ///
    /// # Errors
    ///
    /// `MaterialNotFound` for 0 and for ids never registered.
    pub fn get(&self, id: u32) -> PhysicsResult<(MaterialId, &Material)> {
        let material_id = NonZeroU32::new(id)
            .map(MaterialId)
            .ok_or(PhysicsError::MaterialNotFound(id))?;
        self.materials
            .get(material_id.index())
            .map(|m| (material_id, m))
            .ok_or(PhysicsError::MaterialNotFound(id))
    }

    /// Number of registered materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns `true` before the first registration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
