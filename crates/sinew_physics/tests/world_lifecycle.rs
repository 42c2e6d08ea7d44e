//! Integration tests for the physics world manager lifecycle.

use sinew_physics::{
    BodyHandle, ContextPart, DebugTransport, ErrorKind, PhysicsConfig, PhysicsError, PhysicsSystem,
    RigidBody, SystemState,
};
use sinew_shared::{Quaternion, Vec3};

fn config() -> PhysicsConfig {
    PhysicsConfig::from_toml_str("thread_count = 2").unwrap()
}

fn configured() -> PhysicsSystem {
    let mut physics = PhysicsSystem::new(config());
    physics.configure().unwrap();
    physics
}

#[test]
fn test_double_configure_leaves_context_untouched() {
    let mut physics = configured();
    let body = physics
        .create_dynamic_body(Vec3::new(0.0, 1.0, 0.0), Quaternion::IDENTITY)
        .unwrap();

    let err = physics.configure().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(physics.state(), SystemState::Configured);
    assert_eq!(physics.context().worker_count(), 2);
    assert_eq!(physics.body_count(), 1);
    assert!(physics.body(body).is_ok());
}

#[test]
fn test_operations_before_configure_are_rejected() {
    let mut physics = PhysicsSystem::new(config());
    for err in [
        physics.step(0.01).map(|_| ()).unwrap_err(),
        physics.set_gravity(Vec3::ZERO).unwrap_err(),
        physics.elapsed_simulation_time().map(|_| ()).unwrap_err(),
        physics
            .create_static_body(Vec3::ZERO, Quaternion::IDENTITY)
            .map(|_| ())
            .unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
    assert_eq!(physics.state(), SystemState::Unconfigured);
}

#[test]
fn test_teardown_order_and_idempotence() {
    let mut physics = PhysicsSystem::new(config());
    physics
        .attach_debug_transport(DebugTransport::new(2))
        .unwrap();
    physics.configure().unwrap();
    physics.step(0.01).unwrap();

    assert_eq!(
        physics.teardown(),
        vec![
            ContextPart::Scene,
            ContextPart::Dispatcher,
            ContextPart::PhysicsCore,
            ContextPart::DebugLink,
            ContextPart::DebugTransport,
            ContextPart::Foundation,
        ]
    );
    assert_eq!(physics.state(), SystemState::Destroyed);
    assert!(physics.teardown().is_empty());
    assert!(!physics.context().is_live());
}

#[test]
fn test_teardown_without_configure() {
    let mut physics = PhysicsSystem::new(config());
    assert!(physics.teardown().is_empty());

    let mut physics = PhysicsSystem::new(config());
    physics
        .attach_debug_transport(DebugTransport::new(2))
        .unwrap();
    assert_eq!(physics.teardown(), vec![ContextPart::DebugTransport]);
}

#[test]
fn test_zero_dt_changes_nothing() {
    let mut physics = configured();
    let h = physics
        .add_body(
            RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, 5.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();
    physics
        .body_mut(h)
        .unwrap()
        .set_linear_velocity(Vec3::new(1.0, 0.0, 0.0));

    for dt in [0.0, -0.5] {
        let report = physics.step(dt).unwrap();
        assert!(!report.simulated);
        assert_eq!(physics.elapsed_simulation_time().unwrap(), 0.0);
        let body = physics.body(h).unwrap();
        assert_eq!(body.position(), Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(body.linear_velocity(), Vec3::new(1.0, 0.0, 0.0));
    }
}

#[test]
fn test_free_fall_is_monotone() {
    let mut physics = configured();
    let h = physics
        .add_body(
            RigidBody::create_box(Vec3::ONE, 2.0, Vec3::new(0.0, 100.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();

    let mut last_y = 100.0;
    for _ in 0..120 {
        let report = physics.step(1.0 / 60.0).unwrap();
        assert_eq!(report.synced, 1);

        let update = physics.synced_poses()[0];
        assert_eq!(update.body, h);
        assert!(update.position.y < last_y, "{} !< {last_y}", update.position.y);
        last_y = update.position.y;
    }
    assert!((physics.elapsed_simulation_time().unwrap() - 2.0).abs() < 1e-4);
}

#[test]
fn test_gravity_change_applies() {
    let mut physics = configured();
    physics.set_gravity(Vec3::new(0.0, 9.81, 0.0)).unwrap();
    assert_eq!(physics.gravity().unwrap(), Vec3::new(0.0, 9.81, 0.0));

    let h = physics
        .create_dynamic_body(Vec3::ZERO, Quaternion::IDENTITY)
        .unwrap();
    physics.step(0.1).unwrap();
    assert!(physics.body(h).unwrap().position().y > 0.0);
}

/// 20x1x20 ground with its top face at y = 0 and a unit ball dropped onto it.
fn ground_and_ball(physics: &mut PhysicsSystem) -> (BodyHandle, BodyHandle) {
    let ground = physics
        .add_body(
            RigidBody::create_box(
                Vec3::new(20.0, 1.0, 20.0),
                0.0,
                Vec3::new(0.0, -0.5, 0.0),
                Quaternion::IDENTITY,
            )
            .unwrap(),
        )
        .unwrap();
    let ball = physics
        .add_body(
            RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, 2.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();
    (ground, ball)
}

/// Steps until the ball has settled, returning how many bodies fell asleep.
fn settle(physics: &mut PhysicsSystem) -> usize {
    (0..600)
        .map(|_| physics.step(1.0 / 60.0).unwrap().fell_asleep)
        .sum()
}

#[test]
fn test_ball_comes_to_rest_and_sleeps() {
    let mut physics = configured();
    let (ground, ball) = ground_and_ball(&mut physics);

    let fell_asleep = settle(&mut physics);

    let body = physics.body(ball).unwrap();
    assert!(body.is_sleeping());
    assert!(fell_asleep >= 1);
    assert!((body.position().y - 0.5).abs() < 0.1, "y = {}", body.position().y);

    let floor = physics.body(ground).unwrap();
    assert_eq!(floor.position(), Vec3::new(0.0, -0.5, 0.0));
}

#[test]
fn test_ball_falls_when_ground_destroyed() {
    let mut physics = configured();
    let (ground, ball) = ground_and_ball(&mut physics);
    settle(&mut physics);
    assert!(physics.body(ball).unwrap().is_sleeping());

    physics.destroy_body(ground).unwrap();
    let mut woken = 0;
    for _ in 0..120 {
        woken += physics.step(1.0 / 60.0).unwrap().woken;
    }

    let body = physics.body(ball).unwrap();
    assert!(woken >= 1);
    assert!(!body.is_sleeping());
    assert!(body.position().y < -1.0, "y = {}", body.position().y);
}

#[test]
fn test_ball_falls_when_ground_moved() {
    let mut physics = configured();
    let (ground, ball) = ground_and_ball(&mut physics);
    settle(&mut physics);
    assert!(physics.body(ball).unwrap().is_sleeping());

    physics
        .body_mut(ground)
        .unwrap()
        .set_pose(Vec3::new(0.0, -50.0, 0.0), Quaternion::IDENTITY);
    for _ in 0..120 {
        physics.step(1.0 / 60.0).unwrap();
    }

    let body = physics.body(ball).unwrap();
    assert!(!body.is_sleeping());
    assert!(body.position().y < -1.0, "y = {}", body.position().y);
    assert_eq!(
        physics.body(ground).unwrap().position(),
        Vec3::new(0.0, -50.0, 0.0)
    );
}

#[test]
fn test_static_body_never_moves() {
    let mut physics = configured();
    let wall = physics
        .add_body(
            RigidBody::create_box(Vec3::ONE, 0.0, Vec3::new(0.0, 3.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();
    physics
        .body_mut(wall)
        .unwrap()
        .set_linear_velocity(Vec3::new(5.0, 0.0, 0.0));
    physics
        .add_body(
            RigidBody::create_sphere(0.5, 10.0, Vec3::new(0.0, 5.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();

    for _ in 0..120 {
        physics.step(1.0 / 60.0).unwrap();
    }
    assert_eq!(
        physics.body(wall).unwrap().position(),
        Vec3::new(0.0, 3.0, 0.0)
    );
}

#[test]
fn test_invalid_config_rejected_at_load() {
    let err = PhysicsConfig::from_toml_str("solver_iterations = 0").unwrap_err();
    assert!(matches!(err, PhysicsError::InvalidConfig(_)));
}
