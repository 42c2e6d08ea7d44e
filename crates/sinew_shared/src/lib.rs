//! # SINEW Shared
//!
//! Host-side math types used at every public boundary of the workspace.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on the simulation. The physics crate owns
//! the conversion to its native types (see `sinew_physics::math`).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{Quaternion, Vec3};
