//! # SINEW Event System
//!
//! Sensor contact changes leave the game loop through a bounded crossbeam
//! channel.
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │  GameLoop   │─────>│   Event     │─────>│  Gameplay / │
//! │  (physics)  │      │   Channel   │      │  audio / UI │
//! └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! Sending never blocks the frame: a full channel drops the event and the
//! sender counts it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sinew_core::EntityId;
use sinew_physics::{ContactEvent, SensorContact};

/// Events emitted by the physics frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsEvent {
    // =========================================================================
    // Sensor contacts
    // =========================================================================
    /// Something entered a sensor this frame.
    ContactBegan {
        /// Entity owning the sensor.
        sensor: EntityId,
        /// Entity that entered.
        other: EntityId,
    },

    /// Something stayed inside a sensor.
    ContactContinuing {
        /// Entity owning the sensor.
        sensor: EntityId,
        /// Entity still inside.
        other: EntityId,
    },

    /// Something left a sensor this frame.
    ContactEnded {
        /// Entity owning the sensor.
        sensor: EntityId,
        /// Entity that left.
        other: EntityId,
    },
}

impl PhysicsEvent {
    /// Entity owning the sensor.
    #[inline]
    #[must_use]
    pub const fn sensor(&self) -> EntityId {
        match *self {
            Self::ContactBegan { sensor, .. }
            | Self::ContactContinuing { sensor, .. }
            | Self::ContactEnded { sensor, .. } => sensor,
        }
    }

    /// The other entity.
    #[inline]
    #[must_use]
    pub const fn other(&self) -> EntityId {
        match *self {
            Self::ContactBegan { other, .. }
            | Self::ContactContinuing { other, .. }
            | Self::ContactEnded { other, .. } => other,
        }
    }
}

impl From<SensorContact> for PhysicsEvent {
    fn from(contact: SensorContact) -> Self {
        let sensor = contact.sensor;
        match contact.event {
            ContactEvent::Began(other) => Self::ContactBegan { sensor, other },
            ContactEvent::Continuing(other) => Self::ContactContinuing { sensor, other },
            ContactEvent::Ended(other) => Self::ContactEnded { sensor, other },
        }
    }
}

/// Event bus for physics events.
///
/// Pre-allocates a bounded channel so memory never grows in the hot path.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<PhysicsEvent>,
    receiver: Receiver<PhysicsEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum events in flight before sends start dropping.
    ///   Raised to 1 if zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Creates a receiver handle (clone for multiple consumers).
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Events dropped by any sender of this bus.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<PhysicsEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` if the channel is full or every receiver is gone;
    /// the event is dropped and counted.
    #[inline]
    pub fn send(&self, event: PhysicsEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<PhysicsEvent>,
}

impl EventReceiver {
    /// Receives all pending events without blocking.
    #[inline]
    pub fn drain(&self) -> Vec<PhysicsEvent> {
        let mut events = Vec::with_capacity(self.receiver.len());
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Receives one event without blocking.
    #[inline]
    pub fn try_recv(&self) -> Option<PhysicsEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if events are pending.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}
