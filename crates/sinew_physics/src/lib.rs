//! # SINEW Physics
//!
//! Rigid-body simulation kept in sync with a `sinew_core` ECS world.
//! Contacts, integration and sleeping come from `rapier3d`; this crate
//! owns the lifecycle, the body records and their ties to entities.
//!
//! ## Architecture Rules
//!
//! 1. **One owner per resource** - Every acquired part has exactly one
//!    release path, and releasing twice is a no-op
//! 2. **Ordered lifecycle** - Tuning, configuring, stepping and teardown
//!    happen in that order; out-of-order calls are reported, not panicked on
//! 3. **Host types at the boundary** - Bodies, the world manager and the
//!    bridge speak `sinew_shared` vectors and quaternions; `rapier3d` types
//!    stay inside the math adapter, the scene and the body records
//! 4. **Components drive lifetimes** - A body lives exactly as long as the
//!    component that owns it
//!
//! ## Example
//!
//! ```rust,ignore
//! use sinew_physics::{PhysicsBridge, PhysicsConfig, PhysicsSystem, RigidBody};
//!
//! let mut physics = PhysicsSystem::new(PhysicsConfig::load("physics.toml")?);
//! physics.configure()?;
//!
//! let mut bridge = PhysicsBridge::new();
//! PhysicsBridge::register_components(&mut world);
//! bridge.attach_dynamic(&mut world, &mut physics, entity, body)?;
//!
//! loop {
//!     bridge.update(&mut world, &mut physics, dt)?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod body;
pub mod bridge;
pub mod config;
pub mod context;
pub mod debug;
pub mod error;
pub mod material;
pub mod math;
pub mod overlap;
pub mod scene;
pub mod shape;
pub mod system;

pub use body::{BodyHandle, BodyKind, BodyPart, RigidBody};
pub use bridge::{
    DynamicBody, FrameReport, LifecycleReport, OverlapSensor, PhysicsBridge, SensorContact,
    StaticBody,
};
pub use config::{DebugLinkConfig, PhysicsConfig, SleepConfig};
pub use context::{ContextPart, SimulationContext};
pub use debug::{DebugBody, DebugFrame, DebugLink, DebugTransport};
pub use error::{ErrorKind, PhysicsError, PhysicsResult};
pub use material::{Material, MaterialId, MaterialRegistry};
pub use overlap::{ContactEvent, DetectorHandle, OverlapDetector, OverlapHit, QueryFilter};
pub use scene::{PoseUpdate, Scene};
pub use shape::Shape;
pub use system::{PhysicsSystem, StepReport, SystemState};
