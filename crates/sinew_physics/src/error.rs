//! # Physics Error Types
//!
//! All errors that can occur in the physics system.

use crate::system::SystemState;
use sinew_core::EntityId;
use thiserror::Error;

/// Coarse category of a [`PhysicsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation invalid for the current world state.
    Configuration,
    /// Lookup of something never registered or already destroyed.
    NotFound,
    /// Shape dimension or mass out of range.
    InvalidGeometry,
    /// A fixed-capacity buffer was smaller than the data offered to it.
    ResourceExhausted,
    /// Configuration file could not be read or failed validation.
    InvalidConfig,
    /// Request contradicts what an entity already holds.
    Conflict,
}

/// Errors that can occur in the physics system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Operation not allowed in the current world state.
    #[error("{operation} is not allowed while the physics system is {state:?}")]
    Configuration {
        /// The rejected operation.
        operation: &'static str,
        /// State the world was in.
        state: SystemState,
    },

    /// Material id was never registered.
    #[error("material not found: {0}")]
    MaterialNotFound(u32),

    /// Body handle is stale or was never issued.
    #[error("body not found: slot {index} generation {generation}")]
    BodyNotFound {
        /// Slot index of the handle.
        index: u32,
        /// Generation of the handle.
        generation: u32,
    },

    /// Overlap detector handle is stale or was never issued.
    #[error("overlap detector not found: slot {index} generation {generation}")]
    DetectorNotFound {
        /// Slot index of the handle.
        index: u32,
        /// Generation of the handle.
        generation: u32,
    },

    /// Body record was released and cannot be simulated again.
    #[error("body record was already released")]
    BodyReleased,

    /// Entity is dead or its id is stale.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Shape dimension is non-positive or non-finite.
    #[error("invalid {shape} {dimension}: {value}")]
    InvalidGeometry {
        /// Shape being built.
        shape: &'static str,
        /// Offending dimension.
        dimension: &'static str,
        /// Value supplied.
        value: f32,
    },

    /// Mass is negative or non-finite.
    #[error("invalid mass: {0}")]
    InvalidMass(f32),

    /// Query produced more hits than its buffer holds.
    #[error("result buffer exhausted: capacity {capacity}, hits {hits}")]
    ResourceExhausted {
        /// Entries the buffer holds.
        capacity: usize,
        /// Hits the query actually produced.
        hits: usize,
    },

    /// A generational arena ran out of slot indices.
    #[error("{arena} arena is full with {live} live entries")]
    ArenaFull {
        /// Arena that refused the insert.
        arena: &'static str,
        /// Live entries at the time.
        live: usize,
    },

    /// Entity already holds a body of the other kind.
    #[error("entity {entity} already holds a {held} body")]
    BodyConflict {
        /// Entity the body was offered to.
        entity: EntityId,
        /// Kind of body it already holds.
        held: &'static str,
    },

    /// Configuration file is unreadable or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Worker pool could not be built.
    #[error("dispatcher unavailable: {0}")]
    Dispatcher(String),
}

impl PhysicsError {
    /// Category this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::Dispatcher(_) => ErrorKind::Configuration,
            Self::MaterialNotFound(_)
            | Self::BodyNotFound { .. }
            | Self::DetectorNotFound { .. }
            | Self::BodyReleased
            | Self::EntityNotFound(_) => ErrorKind::NotFound,
            Self::InvalidGeometry { .. } | Self::InvalidMass(_) => ErrorKind::InvalidGeometry,
            Self::ResourceExhausted { .. } | Self::ArenaFull { .. } => ErrorKind::ResourceExhausted,
            Self::BodyConflict { .. } => ErrorKind::Conflict,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Result type for physics operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = PhysicsError::Configuration {
            operation: "configure",
            state: SystemState::Configured,
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(PhysicsError::MaterialNotFound(0).kind(), ErrorKind::NotFound);
        assert_eq!(PhysicsError::InvalidMass(-1.0).kind(), ErrorKind::InvalidGeometry);
        assert_eq!(
            PhysicsError::ResourceExhausted { capacity: 2, hits: 5 }.kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(PhysicsError::BodyReleased.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_arena_full_is_not_a_query_overflow() {
        let err = PhysicsError::ArenaFull {
            arena: "body",
            live: 7,
        };
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(err.to_string(), "body arena is full with 7 live entries");
        assert!(!matches!(err, PhysicsError::ResourceExhausted { .. }));
    }

    #[test]
    fn test_body_conflict_names_held_kind() {
        let err = PhysicsError::BodyConflict {
            entity: EntityId::new(4, 2),
            held: "static",
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().ends_with("already holds a static body"));
    }

    #[test]
    fn test_messages() {
        let err = PhysicsError::InvalidGeometry {
            shape: "sphere",
            dimension: "radius",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "invalid sphere radius: -1");

        let err = PhysicsError::Configuration {
            operation: "set_gravity",
            state: SystemState::Unconfigured,
        };
        assert_eq!(
            err.to_string(),
            "set_gravity is not allowed while the physics system is Unconfigured"
        );
    }
}
