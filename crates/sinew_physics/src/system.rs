//! # Physics World Manager
//!
//! [`PhysicsSystem`] owns the simulation context and enforces the order in
//! which it may be used:
//!
//! ```text
//! Unconfigured --configure--> Configured --step--> Stepping
//!       |                          |                   |
//!       +-------------------- teardown ----------------+--> Destroyed
//! ```
//!
//! Operations called in the wrong state return
//! [`PhysicsError::Configuration`] and leave the system untouched.

use crate::body::{BodyHandle, BodyPart, RigidBody};
use crate::config::PhysicsConfig;
use crate::context::{ContextPart, SimulationContext};
use crate::debug::{DebugBody, DebugFrame, DebugTransport};
use crate::error::{PhysicsError, PhysicsResult};
use crate::material::{Material, MaterialId};
use crate::overlap::{ContactEvent, DetectorHandle, OverlapDetector};
use crate::scene::{PoseUpdate, Scene};
use sinew_core::EntityId;
use sinew_shared::{Quaternion, Vec3};
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a [`PhysicsSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Created; tuning calls are still accepted.
    Unconfigured,
    /// Context built; no step taken yet.
    Configured,
    /// At least one step taken.
    Stepping,
    /// Torn down. Nothing is accepted.
    Destroyed,
}

impl SystemState {
    /// Returns `true` in states that own a live context.
    #[inline]
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Configured | Self::Stepping)
    }
}

/// What one call to [`PhysicsSystem::step`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Whether time advanced. False for non-positive `dt`.
    pub simulated: bool,
    /// Elapsed simulation time after the step, in seconds.
    pub elapsed: f64,
    /// Body pairs in active contact after the step.
    pub contacts: usize,
    /// Sleeping bodies woken by contacts or by losing their support.
    pub woken: usize,
    /// Bodies that fell asleep.
    pub fell_asleep: usize,
    /// Poses written back.
    pub synced: usize,
    /// Overlap detectors whose results were truncated.
    pub truncated_detectors: usize,
}

/// The physics world manager.
///
/// # Example
///
/// ```rust,ignore
/// let mut physics = PhysicsSystem::new(PhysicsConfig::default());
/// physics.set_thread_count(4)?;
/// physics.configure()?;
///
/// let ball = RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, 5.0, 0.0), Quaternion::IDENTITY)?;
/// let handle = physics.add_body(ball)?;
/// physics.step(1.0 / 60.0)?;
/// ```
#[derive(Debug)]
pub struct PhysicsSystem {
    config: PhysicsConfig,
    state: SystemState,
    context: SimulationContext,
    elapsed: f64,
    steps: u64,
    synced: Vec<PoseUpdate>,
}

impl PhysicsSystem {
    /// Creates an unconfigured system.
    ///
    /// GPU acceleration is not available in this build; a config asking
    /// for it is accepted and the CPU dispatcher is used.
    #[must_use]
    pub fn new(mut config: PhysicsConfig) -> Self {
        if config.gpu_enabled {
            warn!("GPU acceleration is not available, using the CPU dispatcher");
            config.gpu_enabled = false;
        }
        Self {
            config,
            state: SystemState::Unconfigured,
            context: SimulationContext::default(),
            elapsed: 0.0,
            steps: 0,
            synced: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SystemState {
        self.state
    }

    /// Effective configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Owned simulation parts.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> &SimulationContext {
        &self.context
    }

    fn reject(&self, operation: &'static str) -> PhysicsError {
        PhysicsError::Configuration {
            operation,
            state: self.state,
        }
    }

    fn require_unconfigured(&self, operation: &'static str) -> PhysicsResult<()> {
        if self.state == SystemState::Unconfigured {
            Ok(())
        } else {
            warn!(operation, state = ?self.state, "Rejected: system already configured");
            Err(self.reject(operation))
        }
    }

    fn require_live(&self, operation: &'static str) -> PhysicsResult<()> {
        if self.state.is_live() {
            Ok(())
        } else {
            Err(self.reject(operation))
        }
    }

    fn scene(&self, operation: &'static str) -> PhysicsResult<&Scene> {
        self.require_live(operation)?;
        self.context.scene().ok_or_else(|| self.reject(operation))
    }

    fn scene_mut(&mut self, operation: &'static str) -> PhysicsResult<&mut Scene> {
        self.require_live(operation)?;
        let state = self.state;
        self.context
            .scene_mut()
            .ok_or(PhysicsError::Configuration { operation, state })
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Sets the worker count used by [`configure`](Self::configure).
    ///
    /// # Errors
    ///
    /// `Configuration` once configured, `InvalidConfig` for zero threads.
    pub fn set_thread_count(&mut self, threads: usize) -> PhysicsResult<()> {
        self.require_unconfigured("set_thread_count")?;
        if threads == 0 {
            return Err(PhysicsError::InvalidConfig(
                "thread_count must be at least 1".to_string(),
            ));
        }
        self.config.thread_count = threads;
        Ok(())
    }

    /// Requests GPU acceleration.
    ///
    /// Accepted before configure, but not available in this build: a
    /// warning is logged and the CPU dispatcher stays in use.
    ///
    /// # Errors
    ///
    /// `Configuration` once configured.
    pub fn enable_gpu(&mut self, enabled: bool) -> PhysicsResult<()> {
        self.require_unconfigured("enable_gpu")?;
        if enabled {
            warn!("GPU acceleration is not available, using the CPU dispatcher");
        }
        Ok(())
    }

    /// Returns `true` if steps run on a GPU. Always `false` in this build.
    #[inline]
    #[must_use]
    pub const fn gpu_enabled(&self) -> bool {
        self.config.gpu_enabled
    }

    /// Hands a viewer channel to the system. Debug frames are published
    /// into it once configured.
    ///
    /// # Errors
    ///
    /// `Configuration` once configured.
    pub fn attach_debug_transport(&mut self, transport: DebugTransport) -> PhysicsResult<()> {
        self.require_unconfigured("attach_debug_transport")?;
        self.context = SimulationContext::with_transport(transport);
        Ok(())
    }

    /// Builds the simulation context.
    ///
    /// # Errors
    ///
    /// `Configuration` if already configured (the existing context is left
    /// untouched), `Dispatcher` if the worker pool cannot start.
    pub fn configure(&mut self) -> PhysicsResult<()> {
        if self.state != SystemState::Unconfigured {
            warn!(state = ?self.state, "Rejected: configure called twice");
            return Err(self.reject("configure"));
        }
        self.config.validate()?;

        let transport = self.context.take_transport();
        self.context = SimulationContext::build(&self.config, transport)?;
        self.state = SystemState::Configured;

        info!(
            threads = self.config.thread_count,
            solver_iterations = self.config.solver_iterations,
            debug_link = self.context.has_debug_link(),
            "Physics system configured"
        );
        Ok(())
    }

    // =========================================================================
    // World parameters
    // =========================================================================

    /// Replaces world gravity.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn set_gravity(&mut self, gravity: Vec3) -> PhysicsResult<()> {
        self.scene_mut("set_gravity")?.set_gravity(gravity);
        self.config.gravity = gravity.to_array();
        Ok(())
    }

    /// World gravity.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn gravity(&self) -> PhysicsResult<Vec3> {
        Ok(self.scene("gravity")?.gravity())
    }

    /// Seconds simulated so far.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn elapsed_simulation_time(&self) -> PhysicsResult<f64> {
        self.require_live("elapsed_simulation_time")?;
        Ok(self.elapsed)
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advances the simulation by `dt` seconds and blocks until done.
    ///
    /// A non-positive or non-finite `dt` is accepted and changes nothing.
    /// Otherwise, in order: body changes made since the last step reach the
    /// simulation, the back-end steps, poses of dynamic bodies that were
    /// awake and of moved static bodies are collected for
    /// [`synced_poses`], overlap detectors re-query, and a debug frame is
    /// published if a link is open.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    ///
    /// [`synced_poses`]: Self::synced_poses
    pub fn step(&mut self, dt: f32) -> PhysicsResult<StepReport> {
        self.require_live("step")?;
        self.state = SystemState::Stepping;
        self.synced.clear();

        if !(dt.is_finite() && dt > 0.0) {
            trace!(dt, "Step skipped");
            return Ok(StepReport {
                elapsed: self.elapsed,
                ..StepReport::default()
            });
        }

        let span = self.context.span();
        let _entered = span.enter();

        let state = self.state;
        let (scene, core, dispatcher) =
            self.context
                .simulation_parts()
                .ok_or(PhysicsError::Configuration {
                    operation: "step",
                    state,
                })?;

        let stats = scene.simulate(core, dispatcher, dt, &mut self.synced);
        let truncated_detectors = scene.run_detectors();

        self.elapsed += f64::from(dt);
        self.steps += 1;

        let report = StepReport {
            simulated: true,
            elapsed: self.elapsed,
            contacts: stats.contacts,
            woken: stats.woken,
            fell_asleep: stats.fell_asleep,
            synced: self.synced.len(),
            truncated_detectors,
        };
        self.publish_debug_frame(&report);

        trace!(
            step = self.steps,
            dt,
            contacts = report.contacts,
            synced = report.synced,
            "Step complete"
        );
        Ok(report)
    }

    /// Poses written by the last step.
    #[inline]
    #[must_use]
    pub fn synced_poses(&self) -> &[PoseUpdate] {
        &self.synced
    }

    /// Steps taken so far.
    #[inline]
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.steps
    }

    fn publish_debug_frame(&mut self, report: &StepReport) {
        let Some(scene) = self.context.scene() else {
            return;
        };
        if !self.context.has_debug_link() {
            return;
        }

        let bodies = scene
            .iter()
            .filter(|(_, body)| body.pose().is_some())
            .map(|(handle, body)| DebugBody {
                handle,
                kind: body.kind(),
                position: body.position(),
                rotation: body.rotation(),
                sleeping: body.is_sleeping(),
            })
            .collect();
        let frame = DebugFrame {
            step: self.steps,
            elapsed: report.elapsed,
            contacts: report.contacts,
            bodies,
        };

        if let Some(link) = self.context.debug_link_mut() {
            if !link.publish(frame) {
                trace!(dropped = link.dropped(), "Debug frame dropped");
            }
        }
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    /// Adds a body to the scene.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn add_body(&mut self, body: RigidBody) -> PhysicsResult<BodyHandle> {
        let handle = self.scene_mut("add_body")?.insert(body)?;
        debug!(body = ?handle, "Body added");
        Ok(handle)
    }

    /// Adds a shapeless immovable body.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn create_static_body(
        &mut self,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<BodyHandle> {
        self.add_body(RigidBody::new_static(position, rotation))
    }

    /// Adds a shapeless dynamic body of unit mass.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn create_dynamic_body(
        &mut self,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<BodyHandle> {
        self.add_body(RigidBody::new_dynamic(position, rotation))
    }

    /// Removes a body and releases its parts.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `BodyNotFound` for a stale handle.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<Vec<BodyPart>> {
        let mut body = self
            .scene_mut("destroy_body")?
            .remove(handle)
            .ok_or_else(|| handle.not_found())?;
        let parts = body.release();
        debug!(body = ?handle, parts = parts.len(), "Body destroyed");
        Ok(parts)
    }

    /// Body behind `handle`.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `BodyNotFound` for a stale handle.
    pub fn body(&self, handle: BodyHandle) -> PhysicsResult<&RigidBody> {
        self.scene("body")?
            .get(handle)
            .ok_or_else(|| handle.not_found())
    }

    /// Mutable body behind `handle`.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `BodyNotFound` for a stale handle.
    pub fn body_mut(&mut self, handle: BodyHandle) -> PhysicsResult<&mut RigidBody> {
        self.scene_mut("body_mut")?
            .get_mut(handle)
            .ok_or_else(|| handle.not_found())
    }

    /// Number of bodies in the scene, 0 unless configured.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.context.scene().map_or(0, Scene::len)
    }

    /// Stamps a body with the entity that owns it.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `BodyNotFound` for a stale handle.
    pub fn stamp_entity(
        &mut self,
        handle: BodyHandle,
        entity: Option<EntityId>,
    ) -> PhysicsResult<()> {
        self.scene_mut("stamp_entity")?.stamp(handle, entity)
    }

    // =========================================================================
    // Materials
    // =========================================================================

    /// Stores a material exactly as given.
    ///
    /// # Returns
    ///
    /// The next sequential id, starting at 1.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn register_material(&mut self, material: Material) -> PhysicsResult<MaterialId> {
        self.require_live("register_material")?;
        let state = self.state;
        let core = self.context.core_mut().ok_or(PhysicsError::Configuration {
            operation: "register_material",
            state,
        })?;
        let id = core.materials.register(material);
        debug!(%id, "Material registered");
        Ok(id)
    }

    /// Looks up a material by raw id.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `MaterialNotFound` for 0 or an
    /// id never issued.
    pub fn get_material(&self, id: u32) -> PhysicsResult<Material> {
        self.require_live("get_material")?;
        let core = self.context.core().ok_or_else(|| self.reject("get_material"))?;
        core.materials.get(id).map(|(_, m)| *m)
    }

    /// Applies a registered material to a body.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `MaterialNotFound` or
    /// `BodyNotFound` for unknown ids.
    pub fn apply_material(&mut self, handle: BodyHandle, material: u32) -> PhysicsResult<()> {
        self.require_live("apply_material")?;
        let (id, profile) = {
            let core = self
                .context
                .core()
                .ok_or_else(|| self.reject("apply_material"))?;
            let (id, profile) = core.materials.get(material)?;
            (id, *profile)
        };
        self.body_mut(handle)?.apply_material(id, &profile);
        Ok(())
    }

    // =========================================================================
    // Overlap detectors
    // =========================================================================

    /// Registers a standing overlap query, re-run every step.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured.
    pub fn add_overlap_detector(
        &mut self,
        detector: OverlapDetector,
    ) -> PhysicsResult<DetectorHandle> {
        let handle = self
            .scene_mut("add_overlap_detector")?
            .add_detector(detector)?;
        debug!(detector = ?handle, "Overlap detector added");
        Ok(handle)
    }

    /// Unregisters a standing overlap query.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `DetectorNotFound` for a stale
    /// handle.
    pub fn remove_overlap_detector(
        &mut self,
        handle: DetectorHandle,
    ) -> PhysicsResult<OverlapDetector> {
        self.scene_mut("remove_overlap_detector")?
            .remove_detector(handle)
            .ok_or_else(|| handle.not_found())
    }

    /// Detector behind `handle`.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `DetectorNotFound` for a stale
    /// handle.
    pub fn detector(&self, handle: DetectorHandle) -> PhysicsResult<&OverlapDetector> {
        self.scene("detector")?
            .detector(handle)
            .ok_or_else(|| handle.not_found())
    }

    /// Mutable detector behind `handle`.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `DetectorNotFound` for a stale
    /// handle.
    pub fn detector_mut(&mut self, handle: DetectorHandle) -> PhysicsResult<&mut OverlapDetector> {
        self.scene_mut("detector_mut")?
            .detector_mut(handle)
            .ok_or_else(|| handle.not_found())
    }

    /// Contact changes the detector saw in the last step.
    ///
    /// # Errors
    ///
    /// `Configuration` unless configured, `DetectorNotFound` for a stale
    /// handle.
    pub fn contact_events(
        &self,
        handle: DetectorHandle,
    ) -> PhysicsResult<impl Iterator<Item = ContactEvent> + '_> {
        Ok(self.detector(handle)?.events())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Releases the whole context: scene, dispatcher, physics core, debug
    /// link, debug transport, foundation.
    ///
    /// # Returns
    ///
    /// The parts released, in order. Calling again returns nothing.
    pub fn teardown(&mut self) -> Vec<ContextPart> {
        if self.state == SystemState::Destroyed {
            return Vec::new();
        }
        let released = self.context.release_all();
        self.synced.clear();
        self.state = SystemState::Destroyed;
        info!(
            parts = released.len(),
            steps = self.steps,
            elapsed = self.elapsed,
            "Physics system torn down"
        );
        released
    }
}

impl Drop for PhysicsSystem {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn configured() -> PhysicsSystem {
        let mut physics = PhysicsSystem::new(PhysicsConfig::default());
        physics.set_thread_count(2).unwrap();
        physics.configure().unwrap();
        physics
    }

    #[test]
    fn test_starts_unconfigured() {
        let physics = PhysicsSystem::new(PhysicsConfig::default());
        assert_eq!(physics.state(), SystemState::Unconfigured);
        assert_eq!(
            physics.elapsed_simulation_time().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_tuning_rejected_after_configure() {
        let mut physics = configured();
        assert_eq!(physics.context().worker_count(), 2);

        let err = physics.set_thread_count(16).unwrap_err();
        assert_eq!(
            err,
            PhysicsError::Configuration {
                operation: "set_thread_count",
                state: SystemState::Configured
            }
        );
        assert_eq!(physics.config().thread_count, 2);
        assert!(physics.enable_gpu(true).is_err());
    }

    #[test]
    fn test_gpu_request_falls_back_to_cpu() {
        let mut physics = PhysicsSystem::new(PhysicsConfig::default());
        physics.enable_gpu(true).unwrap();
        assert!(!physics.gpu_enabled());
        physics.configure().unwrap();
        assert!(physics.context().worker_count() > 0);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut physics = PhysicsSystem::new(PhysicsConfig::default());
        assert_eq!(
            physics.set_thread_count(0).unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
        assert_eq!(physics.config().thread_count, 8);
    }

    #[test]
    fn test_step_moves_state() {
        let mut physics = configured();
        assert_eq!(physics.state(), SystemState::Configured);
        physics.step(0.01).unwrap();
        assert_eq!(physics.state(), SystemState::Stepping);
        assert!((physics.elapsed_simulation_time().unwrap() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_body_lookup_after_destroy() {
        let mut physics = configured();
        let h = physics
            .create_dynamic_body(Vec3::ZERO, Quaternion::IDENTITY)
            .unwrap();
        assert_eq!(
            physics.destroy_body(h).unwrap(),
            vec![BodyPart::Motion, BodyPart::Handle]
        );
        assert_eq!(physics.body(h).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(physics.destroy_body(h).is_err());
    }

    #[test]
    fn test_teardown_rejects_further_use() {
        let mut physics = configured();
        assert!(!physics.teardown().is_empty());
        assert_eq!(physics.state(), SystemState::Destroyed);
        assert!(physics.step(0.01).is_err());
        assert!(physics.configure().is_err());
        assert!(physics.teardown().is_empty());
    }

    #[test]
    fn test_debug_frames_published() {
        let transport = DebugTransport::new(4);
        let viewer = transport.receiver();

        let mut physics = PhysicsSystem::new(PhysicsConfig::default());
        physics.set_thread_count(1).unwrap();
        physics.attach_debug_transport(transport).unwrap();
        physics.configure().unwrap();
        physics
            .create_dynamic_body(Vec3::new(0.0, 1.0, 0.0), Quaternion::IDENTITY)
            .unwrap();

        physics.step(0.02).unwrap();
        let frame = viewer.try_recv().unwrap();
        assert_eq!(frame.step, 1);
        assert_eq!(frame.bodies.len(), 1);
        assert!(frame.bodies[0].position.y < 1.0);
    }
}
