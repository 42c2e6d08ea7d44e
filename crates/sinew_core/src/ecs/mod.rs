//! # Entity Component System
//!
//! ## Design Philosophy
//!
//! - All entity slots and component arrays are pre-allocated at world creation
//! - Components are stored in dense arrays indexed by entity index
//! - Entity IDs are indices with generation counters
//! - Component additions and removals are recorded per storage so that
//!   integration layers (physics, audio, ...) can react at a well-defined
//!   point in the frame instead of inside a callback

mod component;
mod entity;
mod storage;
mod world;

pub use component::{Component, Transform};
pub use entity::{ComponentMask, Entity, EntityId};
pub use storage::ComponentStorage;
pub use world::World;
