//! # Simulation Context
//!
//! Everything a configured physics system owns. Each part is acquired once
//! by [`SimulationContext::build`] and released once by
//! [`SimulationContext::release_all`], in dependency order.

use crate::config::PhysicsConfig;
use crate::debug::{DebugLink, DebugTransport};
use crate::error::{PhysicsError, PhysicsResult};
use crate::material::MaterialRegistry;
use crate::scene::Scene;
use rapier3d::dynamics::IntegrationParameters;
use rapier3d::pipeline::PhysicsPipeline;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sinew_shared::Vec3;
use std::num::NonZeroUsize;
use tracing::{debug, info_span, Span};

/// Bodies the scene arena holds before growing.
const INITIAL_BODY_CAPACITY: usize = 1024;

/// One owned part of the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextPart {
    /// Bodies and overlap detectors.
    Scene,
    /// Worker pool.
    Dispatcher,
    /// Material registry and stepping pipeline.
    PhysicsCore,
    /// Open debug link.
    DebugLink,
    /// Viewer channel.
    DebugTransport,
    /// Root diagnostics span.
    Foundation,
}

/// Root of everything the system allocates. Owns the diagnostics span every
/// step is recorded under.
#[derive(Debug)]
pub(crate) struct Foundation {
    span: Span,
}

/// Simulation services that outlive any single scene.
pub(crate) struct PhysicsCore {
    pub(crate) materials: MaterialRegistry,
    pub(crate) pipeline: PhysicsPipeline,
    pub(crate) parameters: IntegrationParameters,
}

impl PhysicsCore {
    pub(crate) fn new(solver_iterations: u32) -> Self {
        let iterations = usize::try_from(solver_iterations)
            .ok()
            .and_then(NonZeroUsize::new)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            materials: MaterialRegistry::default(),
            pipeline: PhysicsPipeline::new(),
            parameters: IntegrationParameters {
                num_solver_iterations: iterations,
                ..IntegrationParameters::default()
            },
        }
    }
}

impl std::fmt::Debug for PhysicsCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsCore")
            .field("materials", &self.materials)
            .field("solver_iterations", &self.parameters.num_solver_iterations)
            .finish_non_exhaustive()
    }
}

/// Owned parts of a configured system.
#[derive(Debug, Default)]
pub struct SimulationContext {
    foundation: Option<Foundation>,
    dispatcher: Option<ThreadPool>,
    core: Option<PhysicsCore>,
    scene: Option<Scene>,
    debug_link: Option<DebugLink>,
    debug_transport: Option<DebugTransport>,
}

impl SimulationContext {
    /// Acquires every part for `config`.
    ///
    /// A debug link is opened only if `transport` is present and the config
    /// enables it.
    ///
    /// # Errors
    ///
    /// `Dispatcher` if the worker pool cannot be started. Nothing is kept on
    /// failure.
    pub(crate) fn build(
        config: &PhysicsConfig,
        debug_transport: Option<DebugTransport>,
    ) -> PhysicsResult<Self> {
        let foundation = Foundation {
            span: info_span!("physics", threads = config.thread_count),
        };

        let dispatcher = ThreadPoolBuilder::new()
            .num_threads(config.thread_count)
            .thread_name(|i| format!("sinew-physics-{i}"))
            .build()
            .map_err(|e| PhysicsError::Dispatcher(e.to_string()))?;

        let scene = Scene::new(
            INITIAL_BODY_CAPACITY,
            Vec3::from_array(config.gravity),
            config.sleep,
        );

        let debug_link = debug_transport
            .as_ref()
            .filter(|_| config.debug_link.enabled)
            .map(DebugLink::open);

        debug!(
            threads = config.thread_count,
            debug_link = debug_link.is_some(),
            "Simulation context built"
        );

        Ok(Self {
            foundation: Some(foundation),
            dispatcher: Some(dispatcher),
            core: Some(PhysicsCore::new(config.solver_iterations)),
            scene: Some(scene),
            debug_link,
            debug_transport,
        })
    }

    /// Context holding only a viewer channel, before configuration.
    pub(crate) fn with_transport(transport: DebugTransport) -> Self {
        Self {
            debug_transport: Some(transport),
            ..Self::default()
        }
    }

    /// Takes the viewer channel back out, if any.
    pub(crate) fn take_transport(&mut self) -> Option<DebugTransport> {
        self.debug_transport.take()
    }

    /// Returns `true` while any part is held.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.foundation.is_some()
            || self.dispatcher.is_some()
            || self.core.is_some()
            || self.scene.is_some()
            || self.debug_link.is_some()
            || self.debug_transport.is_some()
    }

    /// Returns `true` if a debug link is open.
    #[must_use]
    pub fn has_debug_link(&self) -> bool {
        self.debug_link.is_some()
    }

    /// Worker threads in the dispatcher, 0 once released.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.dispatcher
            .as_ref()
            .map_or(0, ThreadPool::current_num_threads)
    }

    pub(crate) fn span(&self) -> Span {
        self.foundation
            .as_ref()
            .map_or_else(Span::none, |f| f.span.clone())
    }

    pub(crate) fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub(crate) fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub(crate) fn core(&self) -> Option<&PhysicsCore> {
        self.core.as_ref()
    }

    pub(crate) fn core_mut(&mut self) -> Option<&mut PhysicsCore> {
        self.core.as_mut()
    }

    pub(crate) fn debug_link_mut(&mut self) -> Option<&mut DebugLink> {
        self.debug_link.as_mut()
    }

    /// Scene, physics core and dispatcher together, for stepping.
    pub(crate) fn simulation_parts(
        &mut self,
    ) -> Option<(&mut Scene, &mut PhysicsCore, &ThreadPool)> {
        Some((
            self.scene.as_mut()?,
            self.core.as_mut()?,
            self.dispatcher.as_ref()?,
        ))
    }

    /// Releases every held part in dependency order.
    ///
    /// # Returns
    ///
    /// The parts released. A second call returns nothing.
    pub fn release_all(&mut self) -> Vec<ContextPart> {
        let mut released = Vec::with_capacity(6);

        if self.scene.take().is_some() {
            released.push(ContextPart::Scene);
        }
        if self.dispatcher.take().is_some() {
            released.push(ContextPart::Dispatcher);
        }
        if self.core.take().is_some() {
            released.push(ContextPart::PhysicsCore);
        }
        if self.debug_link.take().is_some() {
            released.push(ContextPart::DebugLink);
        }
        if self.debug_transport.take().is_some() {
            released.push(ContextPart::DebugTransport);
        }
        if self.foundation.take().is_some() {
            released.push(ContextPart::Foundation);
        }

        if !released.is_empty() {
            debug!(parts = released.len(), "Simulation context released");
        }
        released
    }
}
