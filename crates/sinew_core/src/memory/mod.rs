//! # Memory Management
//!
//! Generational pools for records that are created and destroyed while the
//! simulation runs.
//!
//! ## Design Philosophy
//!
//! - Slots are reused through a free list
//! - Handles carry a generation so a freed slot never answers to an old handle
//! - Capacity is reserved up front and grows only when exceeded

mod pool;

pub use pool::{Pool, PoolHandle};
