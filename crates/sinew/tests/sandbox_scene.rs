//! Integration test for the game loop driving a small scene end to end.

use sinew::physics::{
    ContextPart, DebugTransport, OverlapDetector, QueryFilter, RigidBody, Shape,
};
use sinew::{GameLoop, GameLoopConfig, PhysicsEvent};
use sinew_core::Transform;
use sinew_shared::{Quaternion, Vec3};

fn sandbox_config() -> GameLoopConfig {
    GameLoopConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/sandbox.toml")).unwrap()
}

#[test]
fn test_sandbox_config_loads() {
    let config = sandbox_config();
    assert_eq!(config.entity_capacity, 1024);
    assert_eq!(config.physics.solver_iterations, 10);
    assert!(config.physics.debug_link.enabled);
}

#[test]
fn test_ball_lands_in_trigger_zone() {
    let transport = DebugTransport::new(4);
    let frames = transport.receiver();
    let mut game = GameLoop::with_debug_transport(sandbox_config(), transport).unwrap();
    let contacts = game.receiver();

    game.spawn_body(
        RigidBody::create_box(
            Vec3::new(20.0, 1.0, 20.0),
            0.0,
            Vec3::new(0.0, -0.5, 0.0),
            Quaternion::IDENTITY,
        )
        .unwrap(),
    )
    .unwrap();
    let (ball, handle) = game
        .spawn_body(
            RigidBody::create_sphere(0.5, 1.0, Vec3::new(0.0, 4.0, 0.0), Quaternion::IDENTITY)
                .unwrap(),
        )
        .unwrap();
    let (zone, _) = game
        .spawn_sensor(
            Vec3::ZERO,
            OverlapDetector::new(
                Shape::sphere(1.5).unwrap(),
                4,
                QueryFilter {
                    include_static: false,
                    ..QueryFilter::default()
                },
            ),
        )
        .unwrap();

    let mut events = Vec::new();
    for _ in 0..240 {
        game.tick(1.0 / 60.0).unwrap();
        events.extend(contacts.drain());
    }

    let began: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, PhysicsEvent::ContactBegan { .. }))
        .collect();
    assert_eq!(
        began,
        vec![&PhysicsEvent::ContactBegan {
            sensor: zone,
            other: ball
        }]
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, PhysicsEvent::ContactEnded { .. })));

    let resting = game.world().get::<Transform>(ball).unwrap().position;
    assert!((resting.y - 0.5).abs() < 0.1, "y = {}", resting.y);
    assert_eq!(resting, game.physics().body(handle).unwrap().position());

    assert!(frames.try_iter().count() > 0);

    assert_eq!(
        game.shutdown(),
        vec![
            ContextPart::Scene,
            ContextPart::Dispatcher,
            ContextPart::PhysicsCore,
            ContextPart::DebugLink,
            ContextPart::DebugTransport,
            ContextPart::Foundation,
        ]
    );
}
