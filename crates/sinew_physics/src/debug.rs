//! # Debug-Visualization Link
//!
//! A viewer attaches a [`DebugTransport`] before the system is configured.
//! Configuring opens a [`DebugLink`] over it, and every step then publishes a
//! [`DebugFrame`] snapshot without blocking. Frames the viewer has not
//! drained yet are dropped and counted.

use crate::body::{BodyHandle, BodyKind};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sinew_shared::{Quaternion, Vec3};

/// One body in a debug snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugBody {
    /// Body handle.
    pub handle: BodyHandle,
    /// Static or dynamic.
    pub kind: BodyKind,
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quaternion,
    /// Asleep at snapshot time.
    pub sleeping: bool,
}

/// Snapshot of the scene after one step.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugFrame {
    /// Steps taken so far, including this one.
    pub step: u64,
    /// Elapsed simulation time in seconds.
    pub elapsed: f64,
    /// Contacts resolved during the step.
    pub contacts: usize,
    /// Every body with a motion record.
    pub bodies: Vec<DebugBody>,
}

/// Bounded channel a viewer reads debug frames from.
///
/// Pre-allocates the channel with bounded capacity so a stalled viewer
/// cannot grow memory.
#[derive(Debug)]
pub struct DebugTransport {
    sender: Sender<DebugFrame>,
    receiver: Receiver<DebugFrame>,
}

impl DebugTransport {
    /// Creates a transport holding at most `capacity` undelivered frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    /// Viewer end. Clone freely.
    #[must_use]
    pub fn receiver(&self) -> Receiver<DebugFrame> {
        self.receiver.clone()
    }

    pub(crate) fn sender(&self) -> Sender<DebugFrame> {
        self.sender.clone()
    }
}

/// Open link publishing frames into a transport.
#[derive(Debug)]
pub struct DebugLink {
    sender: Sender<DebugFrame>,
    published: u64,
    dropped: u64,
}

impl DebugLink {
    /// Opens a link over `transport`.
    #[must_use]
    pub fn open(transport: &DebugTransport) -> Self {
        Self {
            sender: transport.sender(),
            published: 0,
            dropped: 0,
        }
    }

    /// Sends a frame without blocking.
    ///
    /// Returns `false` if the viewer is behind or gone; the frame is dropped.
    pub fn publish(&mut self, frame: DebugFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => {
                self.published += 1;
                true
            }
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                false
            }
        }
    }

    /// Frames delivered so far.
    #[inline]
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Frames dropped so far.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
