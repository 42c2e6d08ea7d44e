//! # SINEW Core
//!
//! Entity Component System designed for:
//! - Fixed entity capacity chosen at startup
//! - Dense, cache-friendly component arrays
//! - Explicit component lifecycle tracking (added / removed) that
//!   integration layers drain once per frame
//!
//! ## Architecture Rules
//!
//! 1. **Pre-allocated storage** - Entity slots and component arrays are sized at creation
//! 2. **Generational ids** - Stale `EntityId`s are detected, never aliased
//! 3. **No callbacks** - Lifecycle changes are queued, not dispatched
//!
//! ## Example
//!
//! ```rust,ignore
//! use sinew_core::{World, Transform};
//!
//! let mut world = World::new(10_000);
//! let entity = world.spawn();
//! world.insert(entity, Transform::default());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod memory;

pub use ecs::{Component, ComponentMask, ComponentStorage, Entity, EntityId, Transform, World};
pub use memory::{Pool, PoolHandle};
