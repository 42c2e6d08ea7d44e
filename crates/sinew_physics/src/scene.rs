//! # Scene
//!
//! Owns every body the system simulates and every standing overlap query.
//! Records and detectors live in generational arenas, so a destroyed handle
//! never resolves again. The back-end sets (bodies, colliders, islands,
//! broad and narrow phase) live next to them and are only touched from
//! here.
//!
//! ## Step order
//!
//! 1. queued record changes are pushed to the back-end; moving a static
//!    body wakes sleepers around its old and new place
//! 2. the back-end steps on the dispatcher
//! 3. records are refreshed from the back-end in parallel and the poses of
//!    moved bodies are collected

use crate::body::{
    pack_user_data, unpack_user_data, BodyHandle, BodyKind, NativeParts, Pending, RigidBody,
};
use crate::config::SleepConfig;
use crate::context::PhysicsCore;
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{from_isometry, from_native_vec3, to_isometry, to_native_vec3, Isometry};
use crate::overlap::{DetectorHandle, OverlapDetector, OverlapHit, QueryFilter};
use crate::shape::Shape;
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IslandManager, MultibodyJointSet, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{ColliderSet, DefaultBroadPhase, NarrowPhase};
use rapier3d::na::Vector3;
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::pipeline::{QueryFilter as NativeFilter, QueryFilterFlags as NativeFilterFlags};
use rayon::prelude::*;
use rayon::ThreadPool;
use sinew_core::{EntityId, Pool};
use sinew_shared::{Quaternion, Vec3};
use tracing::{trace, warn};

/// Distance around a vanished or moved support within which sleepers wake.
const WAKE_MARGIN: f32 = 0.05;

/// Pose written back to the host after a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseUpdate {
    /// Body that moved.
    pub body: BodyHandle,
    /// Entity stamped on the body, if any.
    pub entity: Option<EntityId>,
    /// New world position.
    pub position: Vec3,
    /// New world orientation.
    pub rotation: Quaternion,
}

/// Counters from one [`Scene::simulate`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct StepStats {
    /// Body pairs in active contact after the step.
    pub(crate) contacts: usize,
    /// Sleeping bodies the step woke.
    pub(crate) woken: usize,
    /// Bodies that went to sleep during the step.
    pub(crate) fell_asleep: usize,
}

/// What refreshing one record produced.
#[derive(Clone, Copy, Debug, Default)]
struct Pulled {
    update: Option<PoseUpdate>,
    woke: bool,
    fell_asleep: bool,
}

/// The simulated scene.
pub struct Scene {
    records: Pool<RigidBody>,
    detectors: Pool<OverlapDetector>,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    gravity: Vector3<f32>,
    sleep: SleepConfig,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("bodies", &self.records.len())
            .field("detectors", &self.detectors.len())
            .field("gravity", &self.gravity)
            .field("sleep", &self.sleep)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Creates an empty scene.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Bodies the arena holds before growing
    /// * `gravity` - World gravity in m/s²
    /// * `sleep` - Rest detection thresholds given to every new body
    #[must_use]
    pub fn new(capacity: usize, gravity: Vec3, sleep: SleepConfig) -> Self {
        Self {
            records: Pool::new(capacity),
            detectors: Pool::new(16),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            gravity: to_native_vec3(gravity),
            sleep,
        }
    }

    /// World gravity.
    #[must_use]
    pub fn gravity(&self) -> Vec3 {
        from_native_vec3(&self.gravity)
    }

    /// Replaces world gravity and wakes every dynamic body.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_native_vec3(gravity);
        for (_, record) in self.records.iter_mut() {
            if record.is_dynamic() {
                record.wake();
            }
        }
    }

    /// Number of live bodies.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the scene holds no bodies.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a body and returns its handle.
    ///
    /// # Errors
    ///
    /// `BodyReleased` for a record whose parts were already released,
    /// `ArenaFull` once the arena's index space is used up.
    pub fn insert(&mut self, mut body: RigidBody) -> PhysicsResult<BodyHandle> {
        if body.motion.is_none() {
            return Err(PhysicsError::BodyReleased);
        }
        body.native = None;
        body.pending = Pending::default();

        let live = self.records.len();
        let handle = self
            .records
            .allocate(body)
            .map(BodyHandle::from_pool)
            .ok_or(PhysicsError::ArenaFull {
                arena: "body",
                live,
            })?;
        let record = self
            .records
            .get_mut(handle.pool())
            .ok_or_else(|| handle.not_found())?;
        record.handle = Some(handle);

        let user_data = pack_user_data(handle, record.entity);
        let native = self.bodies.insert(record.native_body(user_data, &self.sleep));
        let collider = record
            .native_collider(user_data)
            .map(|c| self.colliders.insert_with_parent(c, native, &mut self.bodies));
        record.native = Some(NativeParts {
            body: native,
            collider,
        });
        Ok(handle)
    }

    /// Takes a body out of the scene. Its handle goes stale.
    ///
    /// Sleeping bodies the removed one was touching are woken, so nothing
    /// is left resting on a support that no longer exists.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let mut record = self.records.free(handle.pool())?;
        if let Some(parts) = record.native.take() {
            let footprint = parts
                .collider
                .and_then(|h| self.colliders.get(h))
                .map(|c| c.compute_aabb().loosened(WAKE_MARGIN));
            let _ = self.bodies.remove(
                parts.body,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
            if let Some(footprint) = footprint {
                let woken = wake_touching(&mut self.bodies, &self.colliders, &[footprint]);
                if woken > 0 {
                    trace!(body = ?handle, woken, "Removal woke resting bodies");
                }
            }
        }
        Some(record)
    }

    /// Returns `true` if `handle` resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.records.contains(handle.pool())
    }

    /// Body behind `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.records.get(handle.pool())
    }

    /// Mutable body behind `handle`. Changes reach the simulation on the
    /// next step.
    #[inline]
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.records.get_mut(handle.pool())
    }

    /// Iterates over all bodies in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.records
            .iter()
            .map(|(h, body)| (BodyHandle::from_pool(h), body))
    }

    /// Stamps a body with the entity that owns it.
    ///
    /// # Errors
    ///
    /// `BodyNotFound` for a stale handle.
    pub fn stamp(&mut self, handle: BodyHandle, entity: Option<EntityId>) -> PhysicsResult<()> {
        let record = self
            .records
            .get_mut(handle.pool())
            .ok_or_else(|| handle.not_found())?;
        record.entity = entity;

        let user_data = pack_user_data(handle, entity);
        if let Some(parts) = record.native {
            if let Some(body) = self.bodies.get_mut(parts.body) {
                body.user_data = user_data;
            }
            if let Some(collider) = parts.collider.and_then(|h| self.colliders.get_mut(h)) {
                collider.user_data = user_data;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advances the simulation by `dt` seconds on `dispatcher`.
    ///
    /// `out` receives the pose of every dynamic body that was awake before
    /// or after the step and every static body moved since the last step,
    /// in arena order.
    pub(crate) fn simulate(
        &mut self,
        core: &mut PhysicsCore,
        dispatcher: &ThreadPool,
        dt: f32,
        out: &mut Vec<PoseUpdate>,
    ) -> StepStats {
        out.clear();
        self.push_changes();
        core.parameters.dt = dt;

        let Self {
            records,
            bodies,
            colliders,
            islands,
            broad_phase,
            narrow_phase,
            impulse_joints,
            multibody_joints,
            ccd,
            gravity,
            ..
        } = self;

        let pulled: Vec<Pulled> = dispatcher.install(|| {
            core.pipeline.step(
                gravity,
                &core.parameters,
                islands,
                broad_phase,
                narrow_phase,
                bodies,
                colliders,
                impulse_joints,
                multibody_joints,
                ccd,
                &(),
                &(),
            );
            let bodies = &*bodies;
            records
                .values_mut()
                .into_par_iter()
                .map(|record| pull_record(record, bodies))
                .collect()
        });

        let mut stats = StepStats {
            contacts: narrow_phase
                .contact_pairs()
                .filter(|pair| pair.has_any_active_contact)
                .count(),
            ..StepStats::default()
        };
        for pulled in pulled {
            stats.woken += usize::from(pulled.woke);
            stats.fell_asleep += usize::from(pulled.fell_asleep);
            out.extend(pulled.update);
        }
        stats
    }

    /// Pushes queued record changes to the back-end.
    fn push_changes(&mut self) {
        let mut vacated = Vec::new();

        for (_, record) in self.records.iter_mut() {
            let pending = record.pending.take();
            if pending.is_empty() {
                continue;
            }
            let Some(parts) = record.native else {
                continue;
            };

            if let Some(native) = self.bodies.get_mut(parts.body) {
                if pending.has(Pending::POSE) {
                    if let Some(pose) = record.pose() {
                        if record.is_static() {
                            if let Some(collider) =
                                parts.collider.and_then(|h| self.colliders.get(h))
                            {
                                vacated.push(collider.compute_aabb().loosened(WAKE_MARGIN));
                                vacated.push(
                                    collider
                                        .shape()
                                        .compute_aabb(&pose)
                                        .loosened(WAKE_MARGIN),
                                );
                            }
                        }
                        native.set_position(pose, record.is_dynamic());
                    }
                }
                if pending.has(Pending::VELOCITY) {
                    if let Some(motion) = record.motion {
                        native.set_linvel(motion.linear_velocity, true);
                        native.set_angvel(motion.angular_velocity, true);
                    }
                }
                if pending.has(Pending::DAMPING) {
                    let (linear, angular) = record.damping();
                    native.set_linear_damping(linear);
                    native.set_angular_damping(angular);
                }
                if pending.has(Pending::WAKE) && record.is_dynamic() {
                    native.wake_up(true);
                }
            }

            if pending.has(Pending::SURFACE) {
                if let Some(collider) = parts.collider.and_then(|h| self.colliders.get_mut(h)) {
                    collider.set_friction(record.friction());
                    collider.set_restitution(record.restitution());
                }
            }
        }

        let woken = wake_touching(&mut self.bodies, &self.colliders, &vacated);
        if woken > 0 {
            trace!(woken, "Moved static bodies woke resting bodies");
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn view(&self) -> NativeView<'_> {
        NativeView {
            bodies: &self.bodies,
            colliders: &self.colliders,
            broad_phase: &self.broad_phase,
            narrow_phase: &self.narrow_phase,
        }
    }

    /// Bodies whose shapes overlap `shape` placed at a pose, in arena order.
    ///
    /// Sees the scene as of the last step.
    #[must_use]
    pub fn overlaps(
        &self,
        shape: &Shape,
        position: Vec3,
        rotation: Quaternion,
        filter: &QueryFilter,
    ) -> Vec<OverlapHit> {
        self.view()
            .overlaps(shape, &to_isometry(position, rotation), filter)
    }

    // =========================================================================
    // Overlap detectors
    // =========================================================================

    /// Registers a standing query.
    ///
    /// # Errors
    ///
    /// `ArenaFull` once the arena's index space is used up.
    pub fn add_detector(&mut self, detector: OverlapDetector) -> PhysicsResult<DetectorHandle> {
        let live = self.detectors.len();
        self.detectors
            .allocate(detector)
            .map(DetectorHandle::from_pool)
            .ok_or(PhysicsError::ArenaFull {
                arena: "overlap detector",
                live,
            })
    }

    /// Unregisters a standing query.
    pub fn remove_detector(&mut self, handle: DetectorHandle) -> Option<OverlapDetector> {
        self.detectors.free(handle.pool())
    }

    /// Detector behind `handle`.
    #[inline]
    #[must_use]
    pub fn detector(&self, handle: DetectorHandle) -> Option<&OverlapDetector> {
        self.detectors.get(handle.pool())
    }

    /// Mutable detector behind `handle`.
    #[inline]
    pub fn detector_mut(&mut self, handle: DetectorHandle) -> Option<&mut OverlapDetector> {
        self.detectors.get_mut(handle.pool())
    }

    /// Number of registered detectors.
    #[inline]
    #[must_use]
    pub const fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Starts a new frame on every detector and re-runs its query.
    ///
    /// # Returns
    ///
    /// Number of detectors whose results were truncated.
    pub(crate) fn run_detectors(&mut self) -> usize {
        let view = NativeView {
            bodies: &self.bodies,
            colliders: &self.colliders,
            broad_phase: &self.broad_phase,
            narrow_phase: &self.narrow_phase,
        };

        let mut truncated = 0;
        for (handle, detector) in self.detectors.iter_mut() {
            let hits = view.overlaps(detector.shape(), detector.pose(), detector.filter());
            detector.advance_frame();
            detector.record_hits(hits);

            if let Some(err) = detector.overflow() {
                warn!(detector = handle.index(), %err, "Overlap results truncated");
                truncated += 1;
            }
        }
        truncated
    }
}

/// Refreshes one record from its back-end body.
fn pull_record(record: &mut RigidBody, bodies: &RigidBodySet) -> Pulled {
    let Some(native) = record.native.and_then(|parts| bodies.get(parts.body)) else {
        return Pulled::default();
    };
    let (was_sleeping, now_sleeping) = record.pull(native);
    let moved = match record.kind() {
        BodyKind::Dynamic => !(was_sleeping && now_sleeping),
        BodyKind::Static => std::mem::take(&mut record.dirty),
    };

    let update = if moved {
        record.handle().zip(record.pose()).map(|(body, pose)| {
            let (position, rotation) = from_isometry(&pose);
            PoseUpdate {
                body,
                entity: record.entity(),
                position,
                rotation,
            }
        })
    } else {
        None
    };

    Pulled {
        update,
        woke: was_sleeping && !now_sleeping,
        fell_asleep: !was_sleeping && now_sleeping,
    }
}

/// Wakes every sleeping dynamic body whose collider touches one of
/// `regions`.
///
/// # Returns
///
/// Number of bodies woken.
fn wake_touching(bodies: &mut RigidBodySet, colliders: &ColliderSet, regions: &[Aabb]) -> usize {
    if regions.is_empty() {
        return 0;
    }

    let touching: Vec<RigidBodyHandle> = colliders
        .iter()
        .filter_map(|(_, collider)| {
            let parent = collider.parent()?;
            let bounds = collider.compute_aabb();
            regions
                .iter()
                .any(|region| region.intersects(&bounds))
                .then_some(parent)
        })
        .collect();

    let mut woken = 0;
    for handle in touching {
        let asleep = bodies
            .get(handle)
            .is_some_and(|body| body.is_dynamic() && body.is_sleeping());
        if !asleep {
            continue;
        }
        if let Some(body) = bodies.get_mut(handle) {
            body.wake_up(true);
            woken += 1;
        }
    }
    woken
}

/// Read-only view of the back-end sets a query needs.
struct NativeView<'a> {
    bodies: &'a RigidBodySet,
    colliders: &'a ColliderSet,
    broad_phase: &'a DefaultBroadPhase,
    narrow_phase: &'a NarrowPhase,
}

impl NativeView<'_> {
    fn overlaps(&self, shape: &Shape, pose: &Isometry, filter: &QueryFilter) -> Vec<OverlapHit> {
        let mut native_filter = NativeFilter::default();
        if !filter.include_static {
            native_filter.flags |= NativeFilterFlags::EXCLUDE_FIXED;
        }
        if !filter.include_dynamic {
            native_filter.flags |= NativeFilterFlags::EXCLUDE_DYNAMIC;
        }

        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            self.bodies,
            self.colliders,
            native_filter,
        );

        let mut hits: Vec<OverlapHit> = shape.with_native(|native_shape| {
            query
                .intersect_shape(*pose, native_shape)
                .map(|(_, collider)| {
                    let (body, entity) = unpack_user_data(collider.user_data);
                    OverlapHit { body, entity }
                })
                .filter(|hit| filter.exclude_entity.is_none() || hit.entity != filter.exclude_entity)
                .collect()
        });
        hits.sort_unstable_by_key(|hit| hit.body.pool().index());
        hits
    }
}
