//! # Body Handle
//!
//! One simulated object: a collision shape, a motion record holding the
//! pose and velocities, and (once inserted into a scene) an arena handle.
//! Releasing a body gives those three back in that order, exactly once.
//!
//! While a body lives in a scene the back-end owns the authoritative
//! state. The record mirrors it after every step, and setters queue their
//! change for the next step.

use crate::config::SleepConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::material::{Material, MaterialId};
use crate::math::{
    from_native_quat, from_native_vec3, to_isometry, to_native_vec3, Isometry,
};
use crate::shape::Shape;
use bytemuck::{Pod, Zeroable};
use rapier3d::dynamics::{RigidBody as NativeBody, RigidBodyBuilder, RigidBodyHandle};
use rapier3d::geometry::{Collider, ColliderBuilder, ColliderHandle};
use rapier3d::na::{Point3, Vector3};
use rapier3d::parry::mass_properties::MassProperties;
use sinew_core::{EntityId, PoolHandle};
use sinew_shared::{Quaternion, Vec3};

/// Stable reference to a body inside a [`PhysicsSystem`](crate::PhysicsSystem).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BodyHandle(PoolHandle);

impl BodyHandle {
    /// Handle that never resolves.
    pub const INVALID: Self = Self(PoolHandle::INVALID);

    #[inline]
    pub(crate) const fn from_pool(handle: PoolHandle) -> Self {
        Self(handle)
    }

    #[inline]
    pub(crate) const fn pool(self) -> PoolHandle {
        self.0
    }

    /// Returns `true` if the handle was issued by a scene.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !self.0.is_invalid()
    }

    pub(crate) fn not_found(self) -> PhysicsError {
        PhysicsError::BodyNotFound {
            index: self.0.index(),
            generation: self.0.generation(),
        }
    }
}

/// Back-end user data: arena handle in the high half, owning entity in the
/// low half ([`EntityId::NULL`] when unstamped).
#[must_use]
pub(crate) fn pack_user_data(handle: BodyHandle, entity: Option<EntityId>) -> u128 {
    (u128::from(handle.pool().to_bits()) << 64)
        | u128::from(entity.unwrap_or(EntityId::NULL).to_bits())
}

/// Inverse of [`pack_user_data`].
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub(crate) fn unpack_user_data(data: u128) -> (BodyHandle, Option<EntityId>) {
    let handle = BodyHandle::from_pool(PoolHandle::from_bits((data >> 64) as u64));
    let entity = EntityId::from_bits(data as u64);
    (handle, (!entity.is_null()).then_some(entity))
}

/// Whether simulation forces move the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Zero mass. Moves only when repositioned by hand.
    Static,
    /// Positive mass. Integrated every step.
    Dynamic,
}

impl BodyKind {
    /// Lower-case name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Owned part handed back by [`RigidBody::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPart {
    /// The collision shape.
    Shape,
    /// The motion record (pose and velocities).
    Motion,
    /// The scene arena slot.
    Handle,
}

/// Pose and velocities of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MotionState {
    pub(crate) pose: Isometry,
    pub(crate) linear_velocity: Vector3<f32>,
    pub(crate) angular_velocity: Vector3<f32>,
}

impl MotionState {
    fn at(pose: Isometry) -> Self {
        Self {
            pose,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// Record changes not yet pushed to the back-end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pending(u8);

impl Pending {
    pub(crate) const POSE: u8 = 1 << 0;
    pub(crate) const VELOCITY: u8 = 1 << 1;
    pub(crate) const SURFACE: u8 = 1 << 2;
    pub(crate) const DAMPING: u8 = 1 << 3;
    pub(crate) const WAKE: u8 = 1 << 4;

    #[inline]
    fn mark(&mut self, bits: u8) {
        self.0 |= bits;
    }

    #[inline]
    pub(crate) const fn has(self, bits: u8) -> bool {
        self.0 & bits != 0
    }

    #[inline]
    pub(crate) const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Back-end objects a scene created for a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NativeParts {
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: Option<ColliderHandle>,
}

/// A simulated rigid or static body.
///
/// # Example
///
/// ```rust,ignore
/// let mut body = RigidBody::create_sphere(0.5, 2.0, Vec3::new(0.0, 10.0, 0.0), Quaternion::IDENTITY)?;
/// body.set_friction(0.8).set_elasticity(0.3);
/// let handle = system.add_body(body)?;
/// ```
#[derive(Clone, Debug)]
pub struct RigidBody {
    pub(crate) shape: Option<Shape>,
    pub(crate) motion: Option<MotionState>,
    pub(crate) handle: Option<BodyHandle>,
    pub(crate) kind: BodyKind,
    pub(crate) mass: f32,
    pub(crate) local_inertia: Vec3,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) material: Option<MaterialId>,
    pub(crate) sleeping: bool,
    pub(crate) dirty: bool,
    pub(crate) entity: Option<EntityId>,
    pub(crate) pending: Pending,
    pub(crate) native: Option<NativeParts>,
}

impl RigidBody {
    fn build(
        shape: Option<Shape>,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        if !mass.is_finite() || mass < 0.0 {
            return Err(PhysicsError::InvalidMass(mass));
        }

        let local_inertia = match shape {
            Some(shape) => shape.local_inertia(mass),
            // Shapeless dynamic bodies get unit inertia per unit mass.
            None => Vec3::splat(mass),
        };

        Ok(Self {
            shape,
            motion: Some(MotionState::at(to_isometry(position, rotation))),
            handle: None,
            kind: if mass > 0.0 {
                BodyKind::Dynamic
            } else {
                BodyKind::Static
            },
            mass,
            local_inertia,
            linear_damping: 0.0,
            angular_damping: 0.05,
            friction: Material::DEFAULT.dynamic_friction,
            restitution: Material::DEFAULT.restitution,
            material: None,
            sleeping: false,
            dirty: false,
            entity: None,
            pending: Pending::default(),
            native: None,
        })
    }

    /// Box with full edge lengths `size`.
    ///
    /// # Arguments
    ///
    /// * `size` - Edge lengths along local X, Y, Z
    /// * `mass` - 0 for an immovable body
    /// * `position` - World position of the centre
    /// * `rotation` - World orientation
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` for a non-positive edge, `InvalidMass` for a
    /// negative or non-finite mass.
    pub fn create_box(
        size: Vec3,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        Self::build(Some(Shape::cuboid(size)?), mass, position, rotation)
    }

    /// Sphere of `radius`.
    ///
    /// # Errors
    ///
    /// See [`RigidBody::create_box`].
    pub fn create_sphere(
        radius: f32,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        Self::build(Some(Shape::sphere(radius)?), mass, position, rotation)
    }

    /// Cone of base `radius` and `height`, apex along local +Y.
    ///
    /// # Errors
    ///
    /// See [`RigidBody::create_box`].
    pub fn create_cone(
        radius: f32,
        height: f32,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        Self::build(Some(Shape::cone(radius, height)?), mass, position, rotation)
    }

    /// Cylinder of `radius` and `height` along local Y.
    ///
    /// # Errors
    ///
    /// See [`RigidBody::create_box`].
    pub fn create_cylinder(
        radius: f32,
        height: f32,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        Self::build(
            Some(Shape::cylinder(radius, height)?),
            mass,
            position,
            rotation,
        )
    }

    /// Capsule of `radius` with a straight section of `height` along local Y.
    ///
    /// # Errors
    ///
    /// See [`RigidBody::create_box`].
    pub fn create_capsule(
        radius: f32,
        height: f32,
        mass: f32,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<Self> {
        Self::build(
            Some(Shape::capsule(radius, height)?),
            mass,
            position,
            rotation,
        )
    }

    /// Shapeless immovable body at a pose.
    #[must_use]
    pub fn new_static(position: Vec3, rotation: Quaternion) -> Self {
        let mut body = Self::shapeless(position, rotation);
        body.kind = BodyKind::Static;
        body.mass = 0.0;
        body.local_inertia = Vec3::ZERO;
        body
    }

    /// Shapeless dynamic body of unit mass at a pose.
    #[must_use]
    pub fn new_dynamic(position: Vec3, rotation: Quaternion) -> Self {
        Self::shapeless(position, rotation)
    }

    fn shapeless(position: Vec3, rotation: Quaternion) -> Self {
        Self {
            shape: None,
            motion: Some(MotionState::at(to_isometry(position, rotation))),
            handle: None,
            kind: BodyKind::Dynamic,
            mass: 1.0,
            local_inertia: Vec3::ONE,
            linear_damping: 0.0,
            angular_damping: 0.05,
            friction: Material::DEFAULT.dynamic_friction,
            restitution: Material::DEFAULT.restitution,
            material: None,
            sleeping: false,
            dirty: false,
            entity: None,
            pending: Pending::default(),
            native: None,
        }
    }

    // =========================================================================
    // Shape & mass
    // =========================================================================

    /// Static or dynamic.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Returns `true` for zero-mass bodies.
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    /// Returns `true` for bodies the simulation moves.
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Mass in kilograms; 0 for static bodies.
    #[inline]
    #[must_use]
    pub const fn mass(&self) -> f32 {
        self.mass
    }

    /// Principal inertia about the centre of mass.
    #[inline]
    #[must_use]
    pub const fn local_inertia(&self) -> Vec3 {
        self.local_inertia
    }

    /// Collision shape, if the body has one.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    // =========================================================================
    // Pose & velocity
    // =========================================================================

    /// World position, or the origin once released.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.motion.map_or(Vec3::ZERO, |m| {
            from_native_vec3(&m.pose.translation.vector)
        })
    }

    /// World orientation, or identity once released.
    #[must_use]
    pub fn rotation(&self) -> Quaternion {
        self.motion
            .map_or(Quaternion::IDENTITY, |m| from_native_quat(&m.pose.rotation))
    }

    /// Moves the body. Static bodies become dirty, dynamic bodies wake.
    pub fn set_pose(&mut self, position: Vec3, rotation: Quaternion) -> &mut Self {
        if let Some(motion) = &mut self.motion {
            motion.pose = to_isometry(position, rotation);
        }
        self.pending.mark(Pending::POSE);
        match self.kind {
            BodyKind::Static => self.dirty = true,
            BodyKind::Dynamic => self.wake(),
        }
        self
    }

    /// Linear velocity in m/s.
    #[must_use]
    pub fn linear_velocity(&self) -> Vec3 {
        self.motion
            .map_or(Vec3::ZERO, |m| from_native_vec3(&m.linear_velocity))
    }

    /// Angular velocity in rad/s.
    #[must_use]
    pub fn angular_velocity(&self) -> Vec3 {
        self.motion
            .map_or(Vec3::ZERO, |m| from_native_vec3(&m.angular_velocity))
    }

    /// Sets linear velocity immediately, bypassing forces. Wakes the body.
    ///
    /// Static bodies have no velocity; the call is ignored for them.
    pub fn set_linear_velocity(&mut self, velocity: Vec3) -> &mut Self {
        if self.is_static() {
            return self;
        }
        if let Some(motion) = &mut self.motion {
            motion.linear_velocity = to_native_vec3(velocity);
        }
        self.pending.mark(Pending::VELOCITY);
        self.wake();
        self
    }

    /// Sets angular velocity immediately. Wakes the body.
    ///
    /// Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, velocity: Vec3) -> &mut Self {
        if self.is_static() {
            return self;
        }
        if let Some(motion) = &mut self.motion {
            motion.angular_velocity = to_native_vec3(velocity);
        }
        self.pending.mark(Pending::VELOCITY);
        self.wake();
        self
    }

    // =========================================================================
    // Surface & damping
    // =========================================================================

    /// Friction coefficient in `[0, 1]`.
    #[inline]
    #[must_use]
    pub const fn friction(&self) -> f32 {
        self.friction
    }

    /// Restitution in `[0, 1]`.
    #[inline]
    #[must_use]
    pub const fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Stores `value` clamped into `[0, 1]` as the friction coefficient.
    pub fn set_friction(&mut self, value: f32) -> &mut Self {
        self.friction = value.clamp(0.0, 1.0);
        self.pending.mark(Pending::SURFACE);
        self
    }

    /// Stores `value` clamped into `[0, 1]` as the restitution.
    pub fn set_elasticity(&mut self, value: f32) -> &mut Self {
        self.restitution = value.clamp(0.0, 1.0);
        self.pending.mark(Pending::SURFACE);
        self
    }

    /// `(linear, angular)` damping.
    #[inline]
    #[must_use]
    pub const fn damping(&self) -> (f32, f32) {
        (self.linear_damping, self.angular_damping)
    }

    /// Stores both damping values as given.
    pub fn set_damping(&mut self, linear: f32, angular: f32) -> &mut Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self.pending.mark(Pending::DAMPING);
        self
    }

    /// Copies a material's dynamic friction and restitution onto the body
    /// through the clamping setters.
    pub fn apply_material(&mut self, id: MaterialId, material: &Material) -> &mut Self {
        self.set_friction(material.dynamic_friction);
        self.set_elasticity(material.restitution);
        self.material = Some(id);
        self
    }

    /// Material last applied.
    #[inline]
    #[must_use]
    pub const fn material(&self) -> Option<MaterialId> {
        self.material
    }

    // =========================================================================
    // Sleep, dirty flag, identity
    // =========================================================================

    /// Returns `true` while the body is asleep.
    #[inline]
    #[must_use]
    pub const fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Wakes the body and restarts its rest timer.
    pub fn wake(&mut self) {
        self.sleeping = false;
        self.pending.mark(Pending::WAKE);
    }

    /// Returns `true` for a static body moved since its last sync.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Entity this body was stamped with.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Arena handle, once inserted into a scene.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<BodyHandle> {
        self.handle
    }

    pub(crate) fn pose(&self) -> Option<Isometry> {
        self.motion.map(|m| m.pose)
    }

    // =========================================================================
    // Back-end mirror
    // =========================================================================

    /// Back-end body carrying this record's state.
    pub(crate) fn native_body(&self, user_data: u128, sleep: &SleepConfig) -> NativeBody {
        let motion = self
            .motion
            .unwrap_or_else(|| MotionState::at(Isometry::identity()));
        let builder = match self.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .linvel(motion.linear_velocity)
                .angvel(motion.angular_velocity),
        };
        let mut builder = builder
            .position(motion.pose)
            .linear_damping(self.linear_damping)
            .angular_damping(self.angular_damping)
            .sleeping(self.sleeping)
            .user_data(user_data);

        if self.shape.is_none() && self.is_dynamic() {
            builder = builder.additional_mass_properties(MassProperties::new(
                Point3::origin(),
                self.mass,
                to_native_vec3(self.local_inertia),
            ));
        }

        let mut body = builder.build();
        let activation = body.activation_mut();
        activation.normalized_linear_threshold = sleep.linear_threshold;
        activation.angular_threshold = sleep.angular_threshold;
        activation.time_until_sleep = sleep.time_to_sleep;
        body
    }

    /// Back-end collider for the shape, if there is one.
    pub(crate) fn native_collider(&self, user_data: u128) -> Option<Collider> {
        let shape = self.shape?;
        let builder = ColliderBuilder::new(shape.to_shared())
            .friction(self.friction)
            .restitution(self.restitution)
            .user_data(user_data);
        let builder = match self.kind {
            BodyKind::Dynamic => builder.mass(self.mass),
            BodyKind::Static => builder,
        };
        Some(builder.build())
    }

    /// Refreshes the mirror from the back-end after a step.
    ///
    /// # Returns
    ///
    /// `(was_sleeping, now_sleeping)`.
    pub(crate) fn pull(&mut self, native: &NativeBody) -> (bool, bool) {
        let was_sleeping = self.sleeping;
        if self.is_dynamic() {
            if let Some(motion) = &mut self.motion {
                motion.pose = *native.position();
                motion.linear_velocity = *native.linvel();
                motion.angular_velocity = *native.angvel();
            }
            self.sleeping = native.is_sleeping();
        }
        (was_sleeping, self.sleeping)
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Releases shape, motion record and arena handle, in that order.
    ///
    /// Parts never allocated or already released are skipped, so a second
    /// call returns nothing. A body still held by a scene releases nothing;
    /// destroy it through the system instead.
    pub fn release(&mut self) -> Vec<BodyPart> {
        if self.native.is_some() {
            return Vec::new();
        }
        let mut released = Vec::with_capacity(3);
        if self.shape.take().is_some() {
            released.push(BodyPart::Shape);
        }
        if self.motion.take().is_some() {
            released.push(BodyPart::Motion);
        }
        if self.handle.take().is_some() {
            released.push(BodyPart::Handle);
        }
        released
    }

    /// Returns `true` once every part has been released.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.shape.is_none() && self.motion.is_none() && self.handle.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> (Vec3, Quaternion) {
        (Vec3::ZERO, Quaternion::IDENTITY)
    }

    #[test]
    fn test_zero_mass_is_static_with_zero_inertia() {
        let (p, r) = origin();
        let body = RigidBody::create_box(Vec3::ONE, 0.0, p, r).unwrap();
        assert!(body.is_static());
        assert_eq!(body.local_inertia(), Vec3::ZERO);
    }

    #[test]
    fn test_positive_mass_is_dynamic_with_inertia() {
        let (p, r) = origin();
        for body in [
            RigidBody::create_box(Vec3::ONE, 2.0, p, r).unwrap(),
            RigidBody::create_sphere(0.5, 2.0, p, r).unwrap(),
            RigidBody::create_cone(0.5, 1.0, 2.0, p, r).unwrap(),
            RigidBody::create_cylinder(0.5, 1.0, 2.0, p, r).unwrap(),
            RigidBody::create_capsule(0.5, 1.0, 2.0, p, r).unwrap(),
        ] {
            assert!(body.is_dynamic());
            let inertia = body.local_inertia();
            assert!(inertia.x > 0.0 && inertia.y > 0.0 && inertia.z > 0.0);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let (p, r) = origin();
        assert!(matches!(
            RigidBody::create_sphere(-1.0, 1.0, p, r),
            Err(PhysicsError::InvalidGeometry { .. })
        ));
        assert_eq!(
            RigidBody::create_sphere(1.0, -2.0, p, r).unwrap_err(),
            PhysicsError::InvalidMass(-2.0)
        );
        assert!(RigidBody::create_sphere(1.0, f32::NAN, p, r).is_err());
    }

    #[test]
    fn test_friction_and_elasticity_clamp() {
        let (p, r) = origin();
        let mut body = RigidBody::create_sphere(1.0, 1.0, p, r).unwrap();
        for (input, expected) in [(-0.5, 0.0), (0.25, 0.25), (1.0, 1.0), (7.0, 1.0)] {
            body.set_friction(input).set_elasticity(input);
            assert!((body.friction() - expected).abs() < f32::EPSILON);
            assert!((body.restitution() - expected).abs() < f32::EPSILON);
        }
        assert!(body.pending.has(Pending::SURFACE));
    }

    #[test]
    fn test_damping_is_not_clamped() {
        let (p, r) = origin();
        let mut body = RigidBody::create_sphere(1.0, 1.0, p, r).unwrap();
        body.set_damping(-3.0, 42.0);
        assert_eq!(body.damping(), (-3.0, 42.0));
    }

    #[test]
    fn test_set_linear_velocity_wakes() {
        let (p, r) = origin();
        let mut body = RigidBody::create_sphere(1.0, 1.0, p, r).unwrap();
        body.sleeping = true;
        body.set_linear_velocity(Vec3::new(0.0, 3.0, 0.0));
        assert!(!body.is_sleeping());
        assert_eq!(body.linear_velocity(), Vec3::new(0.0, 3.0, 0.0));
        assert!(body.pending.has(Pending::VELOCITY | Pending::WAKE));
    }

    #[test]
    fn test_static_ignores_velocity() {
        let mut body = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY);
        body.set_linear_velocity(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(body.linear_velocity(), Vec3::ZERO);
        assert!(body.pending.is_empty());
    }

    #[test]
    fn test_moving_static_marks_dirty() {
        let mut body = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY);
        assert!(!body.is_dirty());
        body.set_pose(Vec3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY);
        assert!(body.is_dirty());
        assert!(body.pending.has(Pending::POSE));
        assert_eq!(body.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_shapeless_defaults() {
        let body = RigidBody::new_dynamic(Vec3::ZERO, Quaternion::IDENTITY);
        assert!(body.is_dynamic());
        assert!((body.mass() - 1.0).abs() < f32::EPSILON);
        assert!(body.shape().is_none());
        assert!(body.native_collider(0).is_none());

        let body = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY);
        assert!(body.is_static());
        assert_eq!(body.mass(), 0.0);
    }

    #[test]
    fn test_native_body_carries_record_state() {
        let mut body = RigidBody::create_sphere(
            0.5,
            2.0,
            Vec3::new(1.0, 2.0, 3.0),
            Quaternion::IDENTITY,
        )
        .unwrap();
        body.set_linear_velocity(Vec3::new(0.0, -1.0, 0.0));
        let sleep = SleepConfig::default();

        let native = body.native_body(42, &sleep);
        assert!(native.is_dynamic());
        assert_eq!(native.user_data, 42);
        assert_eq!(native.position().translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(*native.linvel(), Vector3::new(0.0, -1.0, 0.0));
        assert!((native.activation().time_until_sleep - sleep.time_to_sleep).abs() < 1e-6);

        let fixed = RigidBody::new_static(Vec3::ZERO, Quaternion::IDENTITY).native_body(0, &sleep);
        assert!(fixed.is_fixed());
    }

    #[test]
    fn test_user_data_roundtrip() {
        let handle = BodyHandle::from_pool(PoolHandle::from_bits((3 << 32) | 9));
        let entity = EntityId::new(12, 4);

        assert_eq!(
            unpack_user_data(pack_user_data(handle, Some(entity))),
            (handle, Some(entity))
        );
        assert_eq!(unpack_user_data(pack_user_data(handle, None)), (handle, None));
    }

    #[test]
    fn test_release_order_and_idempotence() {
        let (p, r) = origin();
        let mut body = RigidBody::create_box(Vec3::ONE, 1.0, p, r).unwrap();
        body.handle = Some(BodyHandle::INVALID);

        assert_eq!(
            body.release(),
            vec![BodyPart::Shape, BodyPart::Motion, BodyPart::Handle]
        );
        assert!(body.is_released());
        assert!(body.release().is_empty());
    }

    #[test]
    fn test_release_skips_missing_parts() {
        let mut body = RigidBody::new_dynamic(Vec3::ZERO, Quaternion::IDENTITY);
        assert_eq!(body.release(), vec![BodyPart::Motion]);
    }

    #[test]
    fn test_apply_material_clamps() {
        let (p, r) = origin();
        let mut body = RigidBody::create_sphere(1.0, 1.0, p, r).unwrap();
        let material = Material::new(2.0, 1.5, -0.2);
        let id = MaterialId::from_index(0);
        body.apply_material(id, &material);
        assert!((body.friction() - 1.0).abs() < f32::EPSILON);
        assert_eq!(body.restitution(), 0.0);
        assert_eq!(body.material(), Some(id));
    }
}
