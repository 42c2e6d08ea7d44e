//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be Copy and have a fixed size so storages can be pre-allocated.

use bytemuck::{Pod, Zeroable};
use sinew_shared::{Quaternion, Vec3};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Copy`: No heap allocations, bitwise copyable
/// - `Pod`: Plain old data
/// - `Zeroable`: Can be safely zeroed
/// - `Default`: Must have a default value for pre-allocation
///
/// IDs 0..=15 are reserved for this crate; integration crates pick theirs
/// above that range.
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Unique identifier for this component type (0-63).
    ///
    /// This ID is used for the component bitmask in entities.
    const ID: u8;
}

/// World-space pose of an entity.
///
/// Written by gameplay code for things that move on their own and by the
/// physics bridge for simulated bodies.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// Position in world space.
    pub position: Vec3,
    /// Orientation in world space.
    pub orientation: Quaternion,
}

impl Component for Transform {
    const ID: u8 = 0;
}

impl Transform {
    /// Creates a transform from a position and an orientation.
    #[inline]
    #[must_use]
    pub const fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Transform at `position` with identity orientation.
    #[inline]
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self::new(position, Quaternion::IDENTITY)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quaternion::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.orientation, Quaternion::IDENTITY);
    }

    #[test]
    fn test_component_sizes() {
        assert_eq!(std::mem::size_of::<Transform>(), 28);
    }
}
