//! # Collision Shapes
//!
//! Validated shape dimensions. Geometry, mass properties and contact
//! generation are the back-end's; this module only checks the numbers and
//! builds the native shape on demand. Round shapes are aligned with the
//! local Y axis and centred on the body origin.

use crate::error::{PhysicsError, PhysicsResult};
use crate::math::to_native_vec3;
use rapier3d::geometry::SharedShape;
use rapier3d::parry::shape::{self as native, Shape as NativeShape};
use sinew_shared::Vec3;

/// Convex collision shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Box given by its half extents.
    Cuboid {
        /// Half size along each local axis.
        half_extents: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Cone with its apex at `+height/2` and base at `-height/2`.
    Cone {
        /// Base radius.
        radius: f32,
        /// Apex to base distance.
        height: f32,
    },
    /// Cylinder.
    Cylinder {
        /// Radius.
        radius: f32,
        /// Cap to cap distance.
        height: f32,
    },
    /// Capsule: a segment of length `height` swept by `radius`.
    Capsule {
        /// Radius of the hemispherical caps.
        radius: f32,
        /// Length of the straight section.
        height: f32,
    },
}

fn positive(shape: &'static str, dimension: &'static str, value: f32) -> PhysicsResult<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidGeometry {
            shape,
            dimension,
            value,
        })
    }
}

impl Shape {
    /// Box with full edge lengths `size`.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if any edge is non-positive or non-finite.
    pub fn cuboid(size: Vec3) -> PhysicsResult<Self> {
        let x = positive("box", "width", size.x)?;
        let y = positive("box", "height", size.y)?;
        let z = positive("box", "depth", size.z)?;
        Ok(Self::Cuboid {
            half_extents: Vec3::new(x, y, z) * 0.5,
        })
    }

    /// Sphere of `radius`.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if the radius is non-positive or non-finite.
    pub fn sphere(radius: f32) -> PhysicsResult<Self> {
        Ok(Self::Sphere {
            radius: positive("sphere", "radius", radius)?,
        })
    }

    /// Cone of base `radius` and `height`.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if a dimension is non-positive or non-finite.
    pub fn cone(radius: f32, height: f32) -> PhysicsResult<Self> {
        Ok(Self::Cone {
            radius: positive("cone", "radius", radius)?,
            height: positive("cone", "height", height)?,
        })
    }

    /// Cylinder of `radius` and `height`.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if a dimension is non-positive or non-finite.
    pub fn cylinder(radius: f32, height: f32) -> PhysicsResult<Self> {
        Ok(Self::Cylinder {
            radius: positive("cylinder", "radius", radius)?,
            height: positive("cylinder", "height", height)?,
        })
    }

    /// Capsule of `radius` with a straight section of `height`.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if a dimension is non-positive or non-finite.
    pub fn capsule(radius: f32, height: f32) -> PhysicsResult<Self> {
        Ok(Self::Capsule {
            radius: positive("capsule", "radius", radius)?,
            height: positive("capsule", "height", height)?,
        })
    }

    /// Short name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cuboid { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Cone { .. } => "cone",
            Self::Cylinder { .. } => "cylinder",
            Self::Capsule { .. } => "capsule",
        }
    }

    /// Runs `f` on the native shape without allocating.
    pub fn with_native<R>(&self, f: impl FnOnce(&dyn NativeShape) -> R) -> R {
        match *self {
            Self::Cuboid { half_extents } => f(&native::Cuboid::new(to_native_vec3(half_extents))),
            Self::Sphere { radius } => f(&native::Ball::new(radius)),
            Self::Cone { radius, height } => f(&native::Cone::new(height * 0.5, radius)),
            Self::Cylinder { radius, height } => f(&native::Cylinder::new(height * 0.5, radius)),
            Self::Capsule { radius, height } => f(&native::Capsule::new_y(height * 0.5, radius)),
        }
    }

    /// Reference-counted native shape, as colliders hold it.
    #[must_use]
    pub fn to_shared(&self) -> SharedShape {
        match *self {
            Self::Cuboid { half_extents } => {
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            Self::Sphere { radius } => SharedShape::ball(radius),
            Self::Cone { radius, height } => SharedShape::cone(height * 0.5, radius),
            Self::Cylinder { radius, height } => SharedShape::cylinder(height * 0.5, radius),
            Self::Capsule { radius, height } => SharedShape::capsule_y(height * 0.5, radius),
        }
    }

    /// Principal inertia about the centre of mass for `mass`.
    ///
    /// Zero when `mass` is zero.
    #[must_use]
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        if mass == 0.0 {
            return Vec3::ZERO;
        }
        let unit = self.with_native(|shape| shape.mass_properties(1.0));
        let inertia = unit.principal_inertia() * (mass / unit.mass());
        Vec3::new(inertia.x, inertia.y, inertia.z)
    }
}
