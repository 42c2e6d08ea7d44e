//! # SINEW Sandbox
//!
//! Headless scene: a ground slab, a grid of falling boxes and balls, and a
//! trigger zone on the floor that reports everything landing in it.
//!
//! ```bash
//! # Defaults
//! cargo run --bin sandbox
//!
//! # With a config file and more logging
//! RUST_LOG=sinew_physics=debug cargo run --bin sandbox -- crates/sinew/sandbox.toml
//! ```

use anyhow::{Context, Result};
use sinew::physics::{DebugTransport, OverlapDetector, QueryFilter, RigidBody, Shape};
use sinew::{GameLoop, GameLoopConfig, PhysicsEvent};
use sinew_shared::{Quaternion, Vec3};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Frames simulated before exiting.
const FRAMES: u32 = 600;

/// Fixed step used instead of wall-clock time, so runs are repeatable.
const DT: f32 = 1.0 / 60.0;

/// Bodies per side of the drop grid.
const GRID: usize = 6;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameLoopConfig::load(&path)
            .with_context(|| format!("loading sandbox config from {path}"))?,
        None => GameLoopConfig::default(),
    };
    let frames_capacity = config.physics.debug_link.channel_capacity;

    let transport = DebugTransport::new(frames_capacity);
    let debug_frames = transport.receiver();
    let mut game = GameLoop::with_debug_transport(config, transport)
        .context("building the game loop")?;
    let contacts = game.receiver();

    build_scene(&mut game)?;

    let mut began = 0_u32;
    let mut ended = 0_u32;
    for _ in 0..FRAMES {
        let stats = game.tick(DT).context("running a frame")?;

        for event in contacts.drain() {
            match event {
                PhysicsEvent::ContactBegan { other, .. } => {
                    began += 1;
                    info!(frame = stats.frame, %other, "Entered the trigger zone");
                }
                PhysicsEvent::ContactEnded { other, .. } => {
                    ended += 1;
                    info!(frame = stats.frame, %other, "Left the trigger zone");
                }
                PhysicsEvent::ContactContinuing { .. } => {}
            }
        }

        // The viewer side of the debug link: keep only the newest frame.
        if let Some(frame) = debug_frames.try_iter().last() {
            if stats.frame % 120 == 0 {
                info!(
                    step = frame.step,
                    elapsed = frame.elapsed,
                    bodies = frame.bodies.len(),
                    asleep = frame.bodies.iter().filter(|b| b.sleeping).count(),
                    contacts = frame.contacts,
                    physics_us = stats.physics_us,
                    "Frame"
                );
            }
        }
        if stats.events_dropped > 0 {
            warn!(dropped = stats.events_dropped, "Contact events lost");
        }
    }

    info!(
        frames = game.frame_count(),
        simulated_s = game.physics().elapsed_simulation_time()?,
        began,
        ended,
        "Sandbox finished"
    );
    let released = game.shutdown();
    info!(?released, "Physics released");
    Ok(())
}

fn build_scene(game: &mut GameLoop) -> Result<()> {
    let ground = RigidBody::create_box(
        Vec3::new(40.0, 1.0, 40.0),
        0.0,
        Vec3::new(0.0, -0.5, 0.0),
        Quaternion::IDENTITY,
    )?;
    game.spawn_body(ground).context("spawning the ground")?;

    for i in 0..GRID * GRID {
        let x = (i % GRID) as f32 * 1.5 - GRID as f32 * 0.75;
        let z = (i / GRID) as f32 * 1.5 - GRID as f32 * 0.75;
        let at = Vec3::new(x, 4.0 + (i % 4) as f32, z);

        let mut body = if i % 2 == 0 {
            RigidBody::create_sphere(0.4, 1.0, at, Quaternion::IDENTITY)?
        } else {
            RigidBody::create_box(Vec3::new(0.7, 0.7, 0.7), 2.0, at, Quaternion::IDENTITY)?
        };
        body.set_elasticity(0.2).set_friction(0.6);
        game.spawn_body(body).context("spawning a falling body")?;
    }

    let zone = OverlapDetector::new(
        Shape::cylinder(2.0, 1.0)?,
        GRID * GRID,
        QueryFilter {
            include_static: false,
            ..QueryFilter::default()
        },
    );
    game.spawn_sensor(Vec3::new(0.0, 0.5, 0.0), zone)
        .context("spawning the trigger zone")?;

    info!(bodies = game.physics().body_count(), "Scene built");
    Ok(())
}
