//! Physics Bridge - Ties simulated bodies to ECS entities
//!
//! A body belongs to the entity whose [`DynamicBody`] or [`StaticBody`]
//! component holds its handle. The bridge watches those components:
//!
//! - component added: the body is stamped with the owning entity
//! - component removed (or the entity despawned): the body is destroyed
//!   and its parts released
//!
//! After each step, simulated poses are written into the entities'
//! [`Transform`]s; sensor detectors follow their entity's `Transform`.

use crate::body::{BodyHandle, BodyKind, RigidBody};
use crate::error::{PhysicsError, PhysicsResult};
use crate::overlap::{ContactEvent, DetectorHandle, OverlapDetector, QueryFilter};
use crate::system::{PhysicsSystem, StepReport};
use bytemuck::{Pod, Zeroable};
use sinew_core::{Component, EntityId, Transform, World};
use tracing::{debug, warn};

// ============================================================================
// COMPONENTS
// ============================================================================

/// A simulated body moved by the physics system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DynamicBody {
    /// Body owned by the entity.
    pub handle: BodyHandle,
}

impl Component for DynamicBody {
    const ID: u8 = 16;
}

/// An immovable body, repositioned only by hand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StaticBody {
    /// Body owned by the entity.
    pub handle: BodyHandle,
}

impl Component for StaticBody {
    const ID: u8 = 17;
}

/// A standing overlap query that follows its entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct OverlapSensor {
    /// Detector owned by the entity.
    pub detector: DetectorHandle,
}

impl Component for OverlapSensor {
    const ID: u8 = 18;
}

/// Components that own a body.
trait BodyComponent: Component {
    const KIND: &'static str;
    fn handle(&self) -> BodyHandle;
}

impl BodyComponent for DynamicBody {
    const KIND: &'static str = "dynamic";
    fn handle(&self) -> BodyHandle {
        self.handle
    }
}

impl BodyComponent for StaticBody {
    const KIND: &'static str = "static";
    fn handle(&self) -> BodyHandle {
        self.handle
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Lifecycle changes applied by one sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Bodies stamped with their new owner.
    pub stamped: usize,
    /// Bodies destroyed because their component went away.
    pub destroyed_bodies: usize,
    /// Detectors removed because their component went away.
    pub removed_sensors: usize,
}

/// What one bridge frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Component lifecycle work.
    pub lifecycle: LifecycleReport,
    /// The physics step.
    pub step: StepReport,
    /// Transforms written back.
    pub transforms_written: usize,
}

/// A contact change seen by an entity's sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorContact {
    /// Entity owning the sensor.
    pub sensor: EntityId,
    /// What changed.
    pub event: ContactEvent,
}

// ============================================================================
// BRIDGE
// ============================================================================

/// Keeps a [`World`] and a [`PhysicsSystem`] in step.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut bridge = PhysicsBridge::new();
/// PhysicsBridge::register_components(&mut world);
///
/// let crate_entity = world.spawn();
/// bridge.attach_dynamic(&mut world, &mut physics, crate_entity, crate_body)?;
///
/// // every frame
/// let report = bridge.update(&mut world, &mut physics, dt)?;
/// ```
#[derive(Debug, Default)]
pub struct PhysicsBridge {
    added: Vec<EntityId>,
    removed_bodies: Vec<(EntityId, BodyHandle)>,
    removed_sensors: Vec<(EntityId, DetectorHandle)>,
}

impl PhysicsBridge {
    /// Creates a bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the bridge's component storages.
    pub fn register_components(world: &mut World) {
        world.register::<DynamicBody>();
        world.register::<StaticBody>();
        world.register::<OverlapSensor>();
    }

    // =========================================================================
    // Attach / detach
    // =========================================================================

    /// Adds `body` to the simulation, owned by `entity`.
    ///
    /// The entity gets a [`Transform`] at the body's pose if it has none.
    /// Static and dynamic bodies get the matching component. An entity holds
    /// at most one kind of body; attaching the same kind again replaces the
    /// component and the old body goes away on the next
    /// [`sync_lifecycle`](Self::sync_lifecycle).
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the entity is dead, `BodyConflict` if it already
    /// holds a body of the other kind (the body is not kept in either case);
    /// otherwise whatever adding the body returns.
    pub fn attach(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        entity: EntityId,
        body: RigidBody,
    ) -> PhysicsResult<BodyHandle> {
        if !world.is_alive(entity) {
            return Err(PhysicsError::EntityNotFound(entity));
        }
        let is_static = body.is_static();
        let held = if is_static {
            world.has::<DynamicBody>(entity).then_some(BodyKind::Dynamic)
        } else {
            world.has::<StaticBody>(entity).then_some(BodyKind::Static)
        };
        if let Some(held) = held {
            return Err(PhysicsError::BodyConflict {
                entity,
                held: held.name(),
            });
        }

        let pose = Transform::new(body.position(), body.rotation());
        let handle = system.add_body(body)?;

        if !world.has::<Transform>(entity) {
            world.insert(entity, pose);
        }
        if is_static {
            world.insert(entity, StaticBody { handle });
        } else {
            world.insert(entity, DynamicBody { handle });
        }
        debug!(%entity, body = ?handle, is_static, "Body attached");
        Ok(handle)
    }

    /// Adds a dynamic body owned by `entity`.
    ///
    /// # Errors
    ///
    /// `InvalidMass` if `body` is static; see [`attach`](Self::attach).
    pub fn attach_dynamic(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        entity: EntityId,
        body: RigidBody,
    ) -> PhysicsResult<BodyHandle> {
        if body.is_static() {
            return Err(PhysicsError::InvalidMass(body.mass()));
        }
        self.attach(world, system, entity, body)
    }

    /// Adds a static body owned by `entity`.
    ///
    /// # Errors
    ///
    /// `InvalidMass` if `body` is dynamic; see [`attach`](Self::attach).
    pub fn attach_static(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        entity: EntityId,
        body: RigidBody,
    ) -> PhysicsResult<BodyHandle> {
        if body.is_dynamic() {
            return Err(PhysicsError::InvalidMass(body.mass()));
        }
        self.attach(world, system, entity, body)
    }

    /// Registers `detector` as `entity`'s sensor.
    ///
    /// The sensor never reports its own entity and starts at the entity's
    /// [`Transform`], if any.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` if the entity is dead; otherwise whatever adding
    /// the detector returns.
    pub fn attach_sensor(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        entity: EntityId,
        mut detector: OverlapDetector,
    ) -> PhysicsResult<DetectorHandle> {
        if !world.is_alive(entity) {
            return Err(PhysicsError::EntityNotFound(entity));
        }
        detector.set_filter(QueryFilter {
            exclude_entity: Some(entity),
            ..*detector.filter()
        });
        if let Some(t) = world.get::<Transform>(entity) {
            detector.set_pose(t.position, t.orientation);
        }

        let handle = system.add_overlap_detector(detector)?;
        world.insert(entity, OverlapSensor { detector: handle });
        debug!(%entity, detector = ?handle, "Sensor attached");
        Ok(handle)
    }

    /// Removes every physics component from `entity`.
    ///
    /// The bodies and detectors go away on the next
    /// [`sync_lifecycle`](Self::sync_lifecycle).
    ///
    /// # Returns
    ///
    /// `true` if anything was removed.
    pub fn detach(&mut self, world: &mut World, entity: EntityId) -> bool {
        let dynamic = world.remove::<DynamicBody>(entity).is_some();
        let fixed = world.remove::<StaticBody>(entity).is_some();
        let sensor = world.remove::<OverlapSensor>(entity).is_some();
        dynamic || fixed || sensor
    }

    // =========================================================================
    // Per-frame sync
    // =========================================================================

    /// Applies component additions and removals queued since the last call.
    ///
    /// Stale handles in components are logged and skipped. A body already
    /// destroyed by hand is not destroyed twice.
    ///
    /// # Errors
    ///
    /// `Configuration` unless the system is configured.
    pub fn sync_lifecycle(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
    ) -> PhysicsResult<LifecycleReport> {
        let mut report = LifecycleReport::default();
        self.sync_bodies::<DynamicBody>(world, system, &mut report)?;
        self.sync_bodies::<StaticBody>(world, system, &mut report)?;
        self.sync_sensors(world, system, &mut report)?;
        Ok(report)
    }

    fn sync_bodies<C: BodyComponent>(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        report: &mut LifecycleReport,
    ) -> PhysicsResult<()> {
        self.added.clear();
        self.removed_bodies.clear();
        if let Some(storage) = world.storage_mut::<C>() {
            self.added.extend(storage.drain_added());
            self.removed_bodies
                .extend(storage.drain_removed().map(|(e, c)| (e, c.handle())));
        }

        for &(entity, handle) in &self.removed_bodies {
            match system.destroy_body(handle) {
                Ok(parts) => {
                    debug!(%entity, kind = C::KIND, parts = parts.len(), "Body released with component");
                    report.destroyed_bodies += 1;
                }
                Err(PhysicsError::BodyNotFound { .. }) => {
                    debug!(%entity, kind = C::KIND, "Body already destroyed");
                }
                Err(e) => return Err(e),
            }
        }

        for &entity in &self.added {
            let Some(handle) = world.get::<C>(entity).map(BodyComponent::handle) else {
                continue;
            };
            match system.stamp_entity(handle, Some(entity)) {
                Ok(()) => report.stamped += 1,
                Err(PhysicsError::BodyNotFound { .. }) => {
                    warn!(%entity, kind = C::KIND, body = ?handle, "Component names an unknown body");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn sync_sensors(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        report: &mut LifecycleReport,
    ) -> PhysicsResult<()> {
        self.added.clear();
        self.removed_sensors.clear();
        if let Some(storage) = world.storage_mut::<OverlapSensor>() {
            self.added.extend(storage.drain_added());
            self.removed_sensors
                .extend(storage.drain_removed().map(|(e, s)| (e, s.detector)));
        }

        for &(entity, handle) in &self.removed_sensors {
            match system.remove_overlap_detector(handle) {
                Ok(_) => {
                    debug!(%entity, "Sensor released with component");
                    report.removed_sensors += 1;
                }
                Err(PhysicsError::DetectorNotFound { .. }) => {
                    debug!(%entity, "Sensor already removed");
                }
                Err(e) => return Err(e),
            }
        }

        for &entity in &self.added {
            let Some(sensor) = world.get::<OverlapSensor>(entity).copied() else {
                continue;
            };
            match system.detector_mut(sensor.detector) {
                Ok(detector) => detector.set_filter(QueryFilter {
                    exclude_entity: Some(entity),
                    ..*detector.filter()
                }),
                Err(PhysicsError::DetectorNotFound { .. }) => {
                    warn!(%entity, detector = ?sensor.detector, "Component names an unknown detector");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Moves every sensor to its entity's [`Transform`].
    ///
    /// # Errors
    ///
    /// `Configuration` unless the system is configured.
    pub fn sync_sensor_poses(
        &mut self,
        world: &World,
        system: &mut PhysicsSystem,
    ) -> PhysicsResult<usize> {
        let Some(sensors) = world.storage::<OverlapSensor>() else {
            return Ok(0);
        };
        let mut moved = 0;
        for (entity, sensor) in sensors.iter() {
            let Some(t) = world.get::<Transform>(entity) else {
                continue;
            };
            match system.detector_mut(sensor.detector) {
                Ok(detector) => {
                    detector.set_pose(t.position, t.orientation);
                    moved += 1;
                }
                Err(PhysicsError::DetectorNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(moved)
    }

    /// Writes the poses synced by the last step into entity transforms.
    ///
    /// # Returns
    ///
    /// Number of transforms written.
    pub fn write_transforms(&mut self, world: &mut World, system: &PhysicsSystem) -> usize {
        let mut written = 0;
        for update in system.synced_poses() {
            let Some(entity) = update.entity else {
                continue;
            };
            let pose = Transform::new(update.position, update.rotation);
            if let Some(t) = world.get_mut::<Transform>(entity) {
                *t = pose;
                written += 1;
            } else if world.insert(entity, pose) {
                written += 1;
            }
        }
        written
    }

    /// Runs one frame: lifecycle sync, sensor pose sync, step, transform
    /// write-back. Overlap queries run at the end of the step.
    ///
    /// # Errors
    ///
    /// `Configuration` unless the system is configured.
    pub fn update(
        &mut self,
        world: &mut World,
        system: &mut PhysicsSystem,
        dt: f32,
    ) -> PhysicsResult<FrameReport> {
        let lifecycle = self.sync_lifecycle(world, system)?;
        self.sync_sensor_poses(world, system)?;
        let step = system.step(dt)?;
        let transforms_written = self.write_transforms(world, system);
        Ok(FrameReport {
            lifecycle,
            step,
            transforms_written,
        })
    }

    /// Appends the contact changes every sensor saw in the last step.
    ///
    /// # Errors
    ///
    /// `Configuration` unless the system is configured.
    pub fn collect_contacts(
        &self,
        world: &World,
        system: &PhysicsSystem,
        out: &mut Vec<SensorContact>,
    ) -> PhysicsResult<()> {
        let Some(sensors) = world.storage::<OverlapSensor>() else {
            return Ok(());
        };
        for (sensor, component) in sensors.iter() {
            match system.contact_events(component.detector) {
                Ok(events) => out.extend(events.map(|event| SensorContact { sensor, event })),
                Err(PhysicsError::DetectorNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyPart;
    use crate::config::PhysicsConfig;
    use crate::shape::Shape;
    use sinew_shared::{Quaternion, Vec3};

    fn setup() -> (World, PhysicsSystem, PhysicsBridge) {
        let mut world = World::new(64);
        PhysicsBridge::register_components(&mut world);
        let mut physics = PhysicsSystem::new(PhysicsConfig::default());
        physics.set_thread_count(1).unwrap();
        physics.configure().unwrap();
        (world, physics, PhysicsBridge::new())
    }

    fn ball(y: f32) -> RigidBody {
        RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, y, 0.0), Quaternion::IDENTITY).unwrap()
    }

    #[test]
    fn test_added_component_stamps_body() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let h = bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();
        assert_eq!(physics.body(h).unwrap().entity(), None);

        let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
        assert_eq!(report.stamped, 1);
        assert_eq!(physics.body(h).unwrap().entity(), Some(e));
        assert!(world.has::<Transform>(e));
    }

    #[test]
    fn test_removed_component_destroys_body() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let h = bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();
        bridge.sync_lifecycle(&mut world, &mut physics).unwrap();

        assert!(bridge.detach(&mut world, e));
        let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
        assert_eq!(report.destroyed_bodies, 1);
        assert!(physics.body(h).is_err());
    }

    #[test]
    fn test_despawn_destroys_body_once() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let h = bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();
        assert_eq!(
            physics.destroy_body(h).unwrap(),
            vec![BodyPart::Shape, BodyPart::Motion, BodyPart::Handle]
        );

        world.despawn(e);
        let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
        assert_eq!(report.destroyed_bodies, 0);
    }

    #[test]
    fn test_attach_to_dead_entity() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        world.despawn(e);
        let err = bridge
            .attach_dynamic(&mut world, &mut physics, e, ball(1.0))
            .unwrap_err();
        assert_eq!(err, PhysicsError::EntityNotFound(e));
        assert_eq!(physics.body_count(), 0);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let fixed = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY);
        assert!(bridge.attach_dynamic(&mut world, &mut physics, e, fixed).is_err());
        assert!(bridge
            .attach_static(&mut world, &mut physics, e, ball(0.0))
            .is_err());
    }

    #[test]
    fn test_entity_holds_one_body_kind() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let h = bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();

        let fixed = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY);
        let err = bridge
            .attach_static(&mut world, &mut physics, e, fixed)
            .unwrap_err();
        assert_eq!(
            err,
            PhysicsError::BodyConflict {
                entity: e,
                held: "dynamic"
            }
        );
        assert_eq!(physics.body_count(), 1);
        assert!(!world.has::<StaticBody>(e));
        assert_eq!(world.get::<DynamicBody>(e).unwrap().handle, h);
    }

    #[test]
    fn test_same_kind_reattach_replaces_body() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        let old = bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();
        bridge.sync_lifecycle(&mut world, &mut physics).unwrap();

        let new = bridge.attach_dynamic(&mut world, &mut physics, e, ball(8.0)).unwrap();
        let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
        assert_eq!(report.destroyed_bodies, 1);
        assert!(physics.body(old).is_err());
        assert_eq!(physics.body(new).unwrap().entity(), Some(e));
    }

    #[test]
    fn test_update_writes_transforms() {
        let (mut world, mut physics, mut bridge) = setup();
        let e = world.spawn();
        bridge.attach_dynamic(&mut world, &mut physics, e, ball(5.0)).unwrap();

        let report = bridge.update(&mut world, &mut physics, 1.0 / 60.0).unwrap();
        assert_eq!(report.transforms_written, 1);
        assert!(world.get::<Transform>(e).unwrap().position.y < 5.0);
    }

    #[test]
    fn test_sensor_follows_transform_and_reports() {
        let (mut world, mut physics, mut bridge) = setup();
        let target = world.spawn();
        bridge
            .attach_static(
                &mut world,
                &mut physics,
                target,
                RigidBody::create_sphere(0.5, 0.0, Vec3::ZERO, Quaternion::IDENTITY).unwrap(),
            )
            .unwrap();

        let watcher = world.spawn();
        world.insert(watcher, Transform::from_position(Vec3::new(10.0, 0.0, 0.0)));
        bridge
            .attach_sensor(
                &mut world,
                &mut physics,
                watcher,
                OverlapDetector::new(Shape::sphere(1.0).unwrap(), 4, QueryFilter::default()),
            )
            .unwrap();

        let mut contacts = Vec::new();
        bridge.update(&mut world, &mut physics, 0.01).unwrap();
        bridge.collect_contacts(&world, &physics, &mut contacts).unwrap();
        assert!(contacts.is_empty());

        world.get_mut::<Transform>(watcher).unwrap().position = Vec3::ZERO;
        bridge.update(&mut world, &mut physics, 0.01).unwrap();
        bridge.collect_contacts(&world, &physics, &mut contacts).unwrap();
        assert_eq!(
            contacts,
            vec![SensorContact {
                sensor: watcher,
                event: ContactEvent::Began(target)
            }]
        );
    }
}
