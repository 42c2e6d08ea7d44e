//! # Overlap Detection
//!
//! A detector re-issues one overlap query per frame and reports how its
//! contacts changed since the previous frame.
//!
//! ## Frame protocol
//!
//! 1. [`OverlapDetector::advance_frame`] swaps current results into the
//!    previous slot and clears the current slot
//! 2. the scene query writes at most `capacity` hits through
//!    [`OverlapDetector::record_hits`], remembering the true count
//! 3. [`OverlapDetector::events`] yields began / continuing / ended contacts
//!    for exactly this frame

use crate::body::BodyHandle;
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{to_isometry, Isometry};
use crate::shape::Shape;
use bytemuck::{Pod, Zeroable};
use sinew_core::{EntityId, PoolHandle};
use sinew_shared::{Quaternion, Vec3};

/// Stable reference to a detector inside a [`PhysicsSystem`](crate::PhysicsSystem).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct DetectorHandle(PoolHandle);

impl DetectorHandle {
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

    /// Returns `true` if the handle was issued by a system.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !self.0.is_invalid()
    }

    pub(crate) fn not_found(self) -> PhysicsError {
        PhysicsError::DetectorNotFound {
            index: self.0.index(),
            generation: self.0.generation(),
        }
    }
}

/// Which bodies a query may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryFilter {
    /// Report static bodies.
    pub include_static: bool,
    /// Report dynamic bodies.
    pub include_dynamic: bool,
    /// Never report bodies stamped with this entity.
    pub exclude_entity: Option<EntityId>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            include_static: true,
            include_dynamic: true,
            exclude_entity: None,
        }
    }
}

/// One body found by a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlapHit {
    /// The body hit.
    pub body: BodyHandle,
    /// Entity stamped on the body, if any.
    pub entity: Option<EntityId>,
}

/// Change in a contact between two consecutive frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactEvent {
    /// Present this frame, absent last frame.
    Began(EntityId),
    /// Present in both frames.
    Continuing(EntityId),
    /// Present last frame, absent this frame.
    Ended(EntityId),
}

impl ContactEvent {
    /// Entity the event is about.
    #[inline]
    #[must_use]
    pub const fn entity(self) -> EntityId {
        match self {
            Self::Began(e) | Self::Continuing(e) | Self::Ended(e) => e,
        }
    }
}

// ============================================================================
// FRAME BUFFERS
// ============================================================================

/// Two result slots, current and previous, exchanged by swapping.
#[derive(Clone, Debug)]
pub struct FrameBuffers<T> {
    current: Vec<T>,
    previous: Vec<T>,
}

impl<T> FrameBuffers<T> {
    /// Both slots pre-sized for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            current: Vec::with_capacity(capacity),
            previous: Vec::with_capacity(capacity),
        }
    }

    /// Moves current into previous and empties current. No copy.
    #[inline]
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// This frame's entries.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &[T] {
        &self.current
    }

    /// Last frame's entries.
    #[inline]
    #[must_use]
    pub fn previous(&self) -> &[T] {
        &self.previous
    }

    #[inline]
    fn current_mut(&mut self) -> &mut Vec<T> {
        &mut self.current
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

/// A standing overlap query with per-frame contact history.
#[derive(Clone, Debug)]
pub struct OverlapDetector {
    shape: Shape,
    pose: Isometry,
    filter: QueryFilter,
    capacity: usize,
    buffers: FrameBuffers<OverlapHit>,
    hit_count: usize,
}

impl OverlapDetector {
    /// Creates a detector.
    ///
    /// # Arguments
    ///
    /// * `shape` - Query volume
    /// * `capacity` - Hits kept per frame; extra hits are counted, not stored
    /// * `filter` - Bodies eligible for reporting
    #[must_use]
    pub fn new(shape: Shape, capacity: usize, filter: QueryFilter) -> Self {
        Self {
            shape,
            pose: Isometry::identity(),
            filter,
            capacity,
            buffers: FrameBuffers::with_capacity(capacity),
            hit_count: 0,
        }
    }

    /// Places the detector.
    pub fn set_pose(&mut self, position: Vec3, rotation: Quaternion) {
        self.pose = to_isometry(position, rotation);
    }

    /// Query volume.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub(crate) const fn pose(&self) -> &Isometry {
        &self.pose
    }

    /// Query filter.
    #[inline]
    #[must_use]
    pub const fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Replaces the query filter.
    pub fn set_filter(&mut self, filter: QueryFilter) {
        self.filter = filter;
    }

    /// Hits kept per frame.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hits the last query produced, including any not stored.
    #[inline]
    #[must_use]
    pub const fn hit_count(&self) -> usize {
        self.hit_count
    }

    /// Hits stored this frame.
    #[inline]
    #[must_use]
    pub fn hits(&self) -> &[OverlapHit] {
        self.buffers.current()
    }

    /// Hits stored last frame.
    #[inline]
    #[must_use]
    pub fn previous_hits(&self) -> &[OverlapHit] {
        self.buffers.previous()
    }

    /// Starts a new frame.
    pub fn advance_frame(&mut self) {
        self.buffers.advance();
        self.hit_count = 0;
    }

    /// Writes this frame's hits, keeping the first `capacity` and counting
    /// all of them.
    pub fn record_hits<I>(&mut self, hits: I)
    where
        I: IntoIterator<Item = OverlapHit>,
    {
        let capacity = self.capacity;
        let current = self.buffers.current_mut();
        let mut total = 0;
        for hit in hits {
            total += 1;
            if current.len() < capacity {
                current.push(hit);
            }
        }
        self.hit_count = total;
    }

    /// Truncation report for the current frame.
    #[must_use]
    pub fn overflow(&self) -> Option<PhysicsError> {
        (self.hit_count > self.capacity).then_some(PhysicsError::ResourceExhausted {
            capacity: self.capacity,
            hits: self.hit_count,
        })
    }

    /// Same as [`overflow`](Self::overflow) as a result.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` if the last query was truncated.
    pub fn check_capacity(&self) -> PhysicsResult<()> {
        self.overflow().map_or(Ok(()), Err)
    }

    /// Contact changes between the previous and the current frame.
    ///
    /// Hits without an entity stamp are skipped.
    pub fn events(&self) -> impl Iterator<Item = ContactEvent> + '_ {
        let current = self.buffers.current();
        let previous = self.buffers.previous();
        let seen_in = |hits: &[OverlapHit], entity: EntityId| {
            hits.iter().any(|h| h.entity == Some(entity))
        };

        let present = current.iter().filter_map(|h| h.entity).map(move |entity| {
            if seen_in(previous, entity) {
                ContactEvent::Continuing(entity)
            } else {
                ContactEvent::Began(entity)
            }
        });
        let ended = previous
            .iter()
            .filter_map(|h| h.entity)
            .filter(move |entity| !seen_in(current, *entity))
            .map(ContactEvent::Ended);

        present.chain(ended)
    }
}
