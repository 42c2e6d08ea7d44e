//! Integration tests for the ECS bridge: component-driven body lifetimes,
//! transform write-back and sensor contact deltas.

use sinew_core::{EntityId, Transform, World};
use sinew_physics::{
    ContactEvent, DynamicBody, OverlapDetector, PhysicsBridge, PhysicsConfig, PhysicsSystem,
    QueryFilter, RigidBody, SensorContact, Shape, StaticBody,
};
use sinew_shared::{Quaternion, Vec3};

fn setup() -> (World, PhysicsSystem, PhysicsBridge) {
    let mut world = World::new(128);
    PhysicsBridge::register_components(&mut world);
    let mut physics = PhysicsSystem::new(PhysicsConfig::default());
    physics.set_thread_count(2).unwrap();
    physics.configure().unwrap();
    (world, physics, PhysicsBridge::new())
}

/// Static sphere of radius 0.5 at `(x, 0, 0)`.
fn post(
    world: &mut World,
    physics: &mut PhysicsSystem,
    bridge: &mut PhysicsBridge,
    x: f32,
) -> EntityId {
    let e = world.spawn();
    let body =
        RigidBody::create_sphere(0.5, 0.0, Vec3::new(x, 0.0, 0.0), Quaternion::IDENTITY).unwrap();
    bridge.attach_static(world, physics, e, body).unwrap();
    e
}

#[test]
fn test_sensor_classifies_contact_changes() {
    let (mut world, mut physics, mut bridge) = setup();
    physics.set_gravity(Vec3::ZERO).unwrap();

    let a = post(&mut world, &mut physics, &mut bridge, 0.0);
    let b = post(&mut world, &mut physics, &mut bridge, 1.5);
    let c = post(&mut world, &mut physics, &mut bridge, 3.0);

    let watcher = world.spawn();
    world.insert(watcher, Transform::from_position(Vec3::new(0.75, 0.0, 0.0)));
    let detector = OverlapDetector::new(Shape::sphere(1.0).unwrap(), 8, QueryFilter::default());
    bridge
        .attach_sensor(&mut world, &mut physics, watcher, detector)
        .unwrap();

    // Frame 1: {A, B}
    let mut contacts = Vec::new();
    bridge.update(&mut world, &mut physics, 1.0 / 60.0).unwrap();
    bridge
        .collect_contacts(&world, &physics, &mut contacts)
        .unwrap();
    assert_eq!(contacts.len(), 2);
    for e in [a, b] {
        assert!(contacts.contains(&SensorContact {
            sensor: watcher,
            event: ContactEvent::Began(e)
        }));
    }

    // Frame 2: {B, C}
    world.get_mut::<Transform>(watcher).unwrap().position = Vec3::new(2.25, 0.0, 0.0);
    contacts.clear();
    bridge.update(&mut world, &mut physics, 1.0 / 60.0).unwrap();
    bridge
        .collect_contacts(&world, &physics, &mut contacts)
        .unwrap();

    let events: Vec<ContactEvent> = contacts.iter().map(|c| c.event).collect();
    assert_eq!(events.len(), 3);
    assert!(events.contains(&ContactEvent::Ended(a)));
    assert!(events.contains(&ContactEvent::Continuing(b)));
    assert!(events.contains(&ContactEvent::Began(c)));
}

#[test]
fn test_sensor_never_reports_its_owner() {
    let (mut world, mut physics, mut bridge) = setup();
    let owner = world.spawn();
    bridge
        .attach_static(
            &mut world,
            &mut physics,
            owner,
            RigidBody::create_box(Vec3::ONE, 0.0, Vec3::ZERO, Quaternion::IDENTITY).unwrap(),
        )
        .unwrap();
    bridge
        .attach_sensor(
            &mut world,
            &mut physics,
            owner,
            OverlapDetector::new(Shape::sphere(2.0).unwrap(), 4, QueryFilter::default()),
        )
        .unwrap();

    let mut contacts = Vec::new();
    for _ in 0..3 {
        bridge.update(&mut world, &mut physics, 1.0 / 60.0).unwrap();
        bridge
            .collect_contacts(&world, &physics, &mut contacts)
            .unwrap();
    }
    assert!(contacts.is_empty());
}

#[test]
fn test_falling_entity_transform_follows_body() {
    let (mut world, mut physics, mut bridge) = setup();
    let e = world.spawn();
    world.insert(e, Transform::from_position(Vec3::new(0.0, 10.0, 0.0)));
    let h = bridge
        .attach_dynamic(
            &mut world,
            &mut physics,
            e,
            RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, 10.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();

    let mut last_y = 10.0;
    for _ in 0..30 {
        let report = bridge.update(&mut world, &mut physics, 1.0 / 60.0).unwrap();
        assert_eq!(report.transforms_written, 1);

        let y = world.get::<Transform>(e).unwrap().position.y;
        assert!(y < last_y);
        assert_eq!(y, physics.body(h).unwrap().position().y);
        last_y = y;
    }
    assert_eq!(world.get::<DynamicBody>(e).unwrap().handle, h);
}

#[test]
fn test_lifecycle_follows_components() {
    let (mut world, mut physics, mut bridge) = setup();
    let ground = post(&mut world, &mut physics, &mut bridge, 0.0);
    let movers: Vec<EntityId> = (0..4)
        .map(|i| {
            let e = world.spawn();
            let body = RigidBody::create_sphere(
                0.25,
                1.0,
                Vec3::new(i as f32, 5.0, 0.0),
                Quaternion::IDENTITY,
            )
            .unwrap();
            bridge.attach_dynamic(&mut world, &mut physics, e, body).unwrap();
            e
        })
        .collect();

    let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
    assert_eq!(report.stamped, 5);
    assert_eq!(physics.body_count(), 5);

    let ground_handle = world.get::<StaticBody>(ground).unwrap().handle;
    assert_eq!(physics.body(ground_handle).unwrap().entity(), Some(ground));

    world.despawn(movers[0]);
    assert!(bridge.detach(&mut world, movers[1]));
    assert!(!bridge.detach(&mut world, movers[1]));

    let report = bridge.sync_lifecycle(&mut world, &mut physics).unwrap();
    assert_eq!(report.destroyed_bodies, 2);
    assert_eq!(report.stamped, 0);
    assert_eq!(physics.body_count(), 3);
}
