//! # Generational Pool
//!
//! Slot allocator whose handles go stale once their slot is freed.

use bytemuck::{Pod, Zeroable};

/// Handle to an object stored in a [`Pool`].
///
/// Generation 0 is never issued, so a zeroed handle never resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(C)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    /// Handle that never resolves.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at allocation time.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns `true` for handles that can never resolve.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.generation == 0
    }

    /// Packs the handle into one word: generation high, index low.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: (bits & 0xFFFF_FFFF) as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A generational pool.
///
/// # Thread Safety
///
/// The pool itself is not synchronized. Parallel passes borrow the live
/// values through [`Pool::values_mut`] and split the work themselves.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: Pool<Body> = Pool::new(1024);
/// let handle = pool.allocate(body)?;
/// pool.free(handle);
/// assert!(pool.get(handle).is_none());
/// ```
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    /// Indices of vacant slots.
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Pool<T> {
    /// Creates a pool with room for `capacity` objects before it grows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    /// Returns the number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the pool holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` and returns its handle.
    ///
    /// # Returns
    ///
    /// None once the slot index space is exhausted.
    pub fn allocate(&mut self, value: T) -> Option<PoolHandle> {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.len += 1;
            return Some(PoolHandle {
                index,
                generation: slot.generation,
            });
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|i| *i != u32::MAX)?;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        self.len += 1;
        Some(PoolHandle {
            index,
            generation: 1,
        })
    }

    /// Removes the object behind `handle`.
    ///
    /// # Returns
    ///
    /// The freed object, or None if the handle was stale or invalid.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;

        // Skip 0 on wrap so zeroed handles stay invalid.
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free_list.push(handle.index);
        self.len -= 1;

        Some(value)
    }

    /// Returns `true` if `handle` still resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a live object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a live object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    /// Iterates over all live objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().zip(0u32..).filter_map(|(slot, index)| {
            slot.value.as_ref().map(|value| {
                (
                    PoolHandle {
                        index,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Iterates mutably over all live objects.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots.iter_mut().zip(0u32..).filter_map(|(slot, index)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (PoolHandle { index, generation }, value))
        })
    }

    /// Mutable references to every live object, ready to hand to a
    /// parallel iterator.
    pub fn values_mut(&mut self) -> Vec<&mut T> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.value.as_mut())
            .collect()
    }

    /// Drops every object. Outstanding handles go stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (slot, index) in self.slots.iter_mut().zip(0u32..) {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1).max(1);
            }
            self.free_list.push(index);
        }
        self.free_list.reverse();
        self.len = 0;
    }

    fn slot_mut(&mut self, handle: PoolHandle) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation).then_some(slot)
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocate_free() {
        let mut pool: Pool<u32> = Pool::new(10);

        let h1 = pool.allocate(42).unwrap();
        assert_eq!(pool.get(h1), Some(&42));
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.free(h1), Some(42));
        assert!(pool.is_empty());
        assert_eq!(pool.free(h1), None);
    }

    #[test]
    fn test_pool_reuse_bumps_generation() {
        let mut pool: Pool<u32> = Pool::new(1);

        let h1 = pool.allocate(1).unwrap();
        pool.free(h1);

        let h2 = pool.allocate(2).unwrap();
        assert_eq!(h1.index(), h2.index());
        assert_ne!(h1.generation(), h2.generation());
        assert!(pool.get(h1).is_none());
        assert_eq!(pool.get(h2), Some(&2));
    }

    #[test]
    fn test_pool_grows_past_capacity() {
        let mut pool: Pool<u8> = Pool::new(1);
        let handles: Vec<_> = (0..5).map(|i| pool.allocate(i).unwrap()).collect();
        assert_eq!(pool.len(), 5);
        assert!(handles.iter().all(|h| pool.contains(*h)));
    }

    #[test]
    fn test_zeroed_handle_never_resolves() {
        let mut pool: Pool<u8> = Pool::new(1);
        let _ = pool.allocate(9);
        assert!(pool.get(PoolHandle::zeroed()).is_none());
        assert!(pool.get(PoolHandle::default()).is_none());
    }

    #[test]
    fn test_handle_bits() {
        let mut pool: Pool<u32> = Pool::new(4);
        let _ = pool.allocate(1).unwrap();
        let b = pool.allocate(2).unwrap();
        assert_eq!(PoolHandle::from_bits(b.to_bits()), b);
        assert_eq!(pool.get(PoolHandle::from_bits(b.to_bits())), Some(&2));
        assert!(PoolHandle::from_bits(PoolHandle::INVALID.to_bits()).is_invalid());
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut pool: Pool<u32> = Pool::new(4);
        let a = pool.allocate(1).unwrap();
        pool.clear();
        assert!(pool.get(a).is_none());
        let b = pool.allocate(3).unwrap();
        assert_eq!(b.index(), 0);
    }
}
