//! # Math Adapter
//!
//! Conversions between host math types ([`sinew_shared`]) and the native
//! simulation types (the `nalgebra` types re-exported by [`rapier3d`]).
//! Values pass through unchanged; in particular quaternions are never
//! normalized here.

use rapier3d::na::{self, Isometry3, Translation3, UnitQuaternion, Vector3};
use sinew_shared::{Quaternion, Vec3};

/// Native rigid transform: translation plus rotation.
pub type Isometry = Isometry3<f32>;

/// Host vector to native vector.
#[inline]
#[must_use]
pub fn to_native_vec3(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

/// Native vector to host vector.
#[inline]
#[must_use]
pub fn from_native_vec3(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Host quaternion to native quaternion, without renormalizing.
#[inline]
#[must_use]
pub fn to_native_quat(q: Quaternion) -> UnitQuaternion<f32> {
    UnitQuaternion::new_unchecked(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Native quaternion to host quaternion.
#[inline]
#[must_use]
pub fn from_native_quat(q: &UnitQuaternion<f32>) -> Quaternion {
    Quaternion::new(q.i, q.j, q.k, q.w)
}

/// Host (position, rotation) pair to native transform.
#[inline]
#[must_use]
pub fn to_isometry(position: Vec3, rotation: Quaternion) -> Isometry {
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        to_native_quat(rotation),
    )
}

/// Native transform to host (position, rotation) pair.
#[inline]
#[must_use]
pub fn from_isometry(iso: &Isometry) -> (Vec3, Quaternion) {
    (
        from_native_vec3(&iso.translation.vector),
        from_native_quat(&iso.rotation),
    )
}
