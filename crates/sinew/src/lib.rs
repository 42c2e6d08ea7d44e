//! # SINEW
//!
//! Application crate: runs an ECS world and its physics simulation frame by
//! frame and forwards sensor contacts to whoever listens.
//!
//! ## Modules
//!
//! - `events`: contact event bus
//! - `game_loop`: frame orchestration and timing

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod events;
pub mod game_loop;

pub use sinew_core as core;
pub use sinew_physics as physics;

pub use events::{EventBus, EventReceiver, EventSender, PhysicsEvent};
pub use game_loop::{FrameStats, GameError, GameLoop, GameLoopConfig, GameResult};
