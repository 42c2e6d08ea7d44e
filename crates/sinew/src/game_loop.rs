//! # SINEW Game Loop
//!
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. BEGIN FRAME                                                      │
//! │    └─ Measure wall-clock delta, clamp to max_dt                     │
//! │                                                                     │
//! │ 2. PHYSICS (PhysicsBridge::update)                                  │
//! │    ├─ Component adds/removes → stamp / destroy bodies               │
//! │    ├─ Sensors follow their entity's Transform                       │
//! │    ├─ Step the simulation                                           │
//! │    └─ Write simulated poses into Transforms                         │
//! │                                                                     │
//! │ 3. EVENTS                                                           │
//! │    └─ Sensor contact changes → EventBus                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sinew_core::{EntityId, Transform, World};
use sinew_physics::{
    BodyHandle, ContextPart, DebugTransport, DetectorHandle, LifecycleReport, OverlapDetector,
    PhysicsBridge, PhysicsConfig, PhysicsError, PhysicsSystem, RigidBody, SensorContact,
    StepReport,
};
use sinew_shared::{Quaternion, Vec3};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventBus, EventReceiver, EventSender, PhysicsEvent};

/// Frame time above which a warning is logged.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while building or running the loop.
#[derive(Error, Debug)]
pub enum GameError {
    /// Physics rejected an operation.
    #[error("physics: {0}")]
    Physics(#[from] PhysicsError),

    /// Config file could not be read or parsed.
    #[error("config: {0}")]
    Config(String),
}

/// Result alias for the game loop.
pub type GameResult<T> = Result<T, GameError>;

// =============================================================================
// CONFIG
// =============================================================================

/// Configuration for the game loop.
///
/// ```toml
/// entity_capacity = 4096
/// max_dt = 0.05
///
/// [physics]
/// thread_count = 4
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLoopConfig {
    /// Entities the world can hold.
    pub entity_capacity: usize,
    /// Event channel capacity.
    pub event_capacity: usize,
    /// Upper bound on the step delta, so a stall does not explode the
    /// simulation (seconds).
    pub max_dt: f32,
    /// Physics world settings.
    pub physics: PhysicsConfig,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 65_536,
            event_capacity: 2048,
            max_dt: 0.1,
            physics: PhysicsConfig::default(),
        }
    }
}

impl GameLoopConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML or bad loop values, `Physics` for bad
    /// physics values.
    pub fn from_toml_str(text: &str) -> GameResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| GameError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// See [`from_toml_str`](Self::from_toml_str); also `Config` if the file
    /// cannot be read.
    pub fn load(path: impl AsRef<Path>) -> GameResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GameError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Names the first offending field.
    pub fn validate(&self) -> GameResult<()> {
        if self.entity_capacity == 0 || u32::try_from(self.entity_capacity).is_err() {
            return Err(GameError::Config(format!(
                "entity_capacity must be in 1..=u32::MAX, got {}",
                self.entity_capacity
            )));
        }
        if self.event_capacity == 0 {
            return Err(GameError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.max_dt.is_finite() && self.max_dt > 0.0) {
            return Err(GameError::Config(format!(
                "max_dt must be positive, got {}",
                self.max_dt
            )));
        }
        self.physics.validate()?;
        Ok(())
    }
}

// =============================================================================
// FRAME STATS
// =============================================================================

/// Per-frame statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Delta handed to the physics step, after clamping.
    pub delta_time: f32,
    /// Time spent in the physics update in microseconds.
    pub physics_us: u64,
    /// Component lifecycle work.
    pub lifecycle: LifecycleReport,
    /// What the step did.
    pub step: StepReport,
    /// Transforms written from simulated poses.
    pub transforms_written: usize,
    /// Contact events delivered to the bus.
    pub events_sent: usize,
    /// Contact events dropped because the bus was full.
    pub events_dropped: usize,
}

// =============================================================================
// GAME LOOP
// =============================================================================

/// The main loop orchestrator.
///
/// Owns the ECS world, the physics system and its bridge, and the event
/// bus. Dropping the loop tears physics down.
pub struct GameLoop {
    world: World,
    physics: PhysicsSystem,
    bridge: PhysicsBridge,
    events: EventBus,
    sender: EventSender,
    config: GameLoopConfig,
    contacts: Vec<SensorContact>,
    frame_count: u64,
    last_frame_time: Instant,
}

impl GameLoop {
    /// Creates and configures a loop.
    ///
    /// # Errors
    ///
    /// Any config validation or physics configure failure.
    pub fn new(config: GameLoopConfig) -> GameResult<Self> {
        Self::build(config, None)
    }

    /// Creates a loop that publishes debug frames into `transport`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_debug_transport(
        config: GameLoopConfig,
        transport: DebugTransport,
    ) -> GameResult<Self> {
        Self::build(config, Some(transport))
    }

    fn build(config: GameLoopConfig, transport: Option<DebugTransport>) -> GameResult<Self> {
        config.validate()?;

        let mut world = World::new(config.entity_capacity);
        PhysicsBridge::register_components(&mut world);

        let mut physics = PhysicsSystem::new(config.physics.clone());
        if let Some(transport) = transport {
            physics.attach_debug_transport(transport)?;
        }
        physics.configure()?;

        let events = EventBus::new(config.event_capacity);
        let sender = events.sender();

        info!(
            entities = config.entity_capacity,
            events = config.event_capacity,
            max_dt = config.max_dt,
            "Game loop ready"
        );

        Ok(Self {
            world,
            physics,
            bridge: PhysicsBridge::new(),
            events,
            sender,
            config,
            contacts: Vec::new(),
            frame_count: 0,
            last_frame_time: Instant::now(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The ECS world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The ECS world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The physics system.
    #[inline]
    #[must_use]
    pub const fn physics(&self) -> &PhysicsSystem {
        &self.physics
    }

    /// The physics system, mutably.
    #[inline]
    pub fn physics_mut(&mut self) -> &mut PhysicsSystem {
        &mut self.physics
    }

    /// Loop configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// A new receiver for contact events.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        self.events.receiver()
    }

    /// Frames run so far.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Spawns an entity owning `body`. Static and dynamic bodies both work.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the world is full, or whatever adding the body
    /// returns.
    pub fn spawn_body(&mut self, body: RigidBody) -> GameResult<(EntityId, BodyHandle)> {
        let entity = self.world.spawn();
        match self
            .bridge
            .attach(&mut self.world, &mut self.physics, entity, body)
        {
            Ok(handle) => Ok((entity, handle)),
            Err(e) => {
                self.world.despawn(entity);
                Err(e.into())
            }
        }
    }

    /// Spawns an entity carrying a sensor at `position`.
    ///
    /// # Errors
    ///
    /// See [`spawn_body`](Self::spawn_body).
    pub fn spawn_sensor(
        &mut self,
        position: Vec3,
        detector: OverlapDetector,
    ) -> GameResult<(EntityId, DetectorHandle)> {
        let entity = self.world.spawn();
        self.world
            .insert(entity, Transform::new(position, Quaternion::IDENTITY));
        match self
            .bridge
            .attach_sensor(&mut self.world, &mut self.physics, entity, detector)
        {
            Ok(handle) => Ok((entity, handle)),
            Err(e) => {
                self.world.despawn(entity);
                Err(e.into())
            }
        }
    }

    /// Despawns an entity. Its body and sensor go away next frame.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        self.world.despawn(entity)
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Runs one frame with the wall-clock time since the previous frame.
    ///
    /// # Errors
    ///
    /// Any physics error from the update.
    pub fn frame(&mut self) -> GameResult<FrameStats> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;

        if delta > MAX_FRAME_TIME {
            warn!(
                frame = self.frame_count,
                delta_ms = delta.as_millis(),
                "Frame over budget"
            );
        }
        self.tick(delta.as_secs_f32())
    }

    /// Runs one frame with an explicit delta, clamped to `max_dt`.
    ///
    /// # Errors
    ///
    /// Any physics error from the update.
    pub fn tick(&mut self, dt: f32) -> GameResult<FrameStats> {
        let delta_time = dt.min(self.config.max_dt);

        let physics_start = Instant::now();
        let report = self
            .bridge
            .update(&mut self.world, &mut self.physics, delta_time)?;
        let physics_us = u64::try_from(physics_start.elapsed().as_micros()).unwrap_or(u64::MAX);

        self.contacts.clear();
        self.bridge
            .collect_contacts(&self.world, &self.physics, &mut self.contacts)?;

        let mut events_sent = 0;
        let mut events_dropped = 0;
        for contact in self.contacts.drain(..) {
            if self.sender.send(PhysicsEvent::from(contact)) {
                events_sent += 1;
            } else {
                events_dropped += 1;
            }
        }
        if events_dropped > 0 {
            warn!(
                frame = self.frame_count,
                dropped = events_dropped,
                "Event bus full, contact events dropped"
            );
        }

        let stats = FrameStats {
            frame: self.frame_count,
            delta_time,
            physics_us,
            lifecycle: report.lifecycle,
            step: report.step,
            transforms_written: report.transforms_written,
            events_sent,
            events_dropped,
        };
        self.frame_count += 1;
        Ok(stats)
    }

    /// Tears physics down.
    ///
    /// # Returns
    ///
    /// The context parts released, in order. Empty on a second call.
    pub fn shutdown(&mut self) -> Vec<ContextPart> {
        let released = self.physics.teardown();
        debug!(parts = released.len(), frames = self.frame_count, "Game loop shut down");
        released
    }
}
