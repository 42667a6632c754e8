//! Sample storage
//!
//! Every sample buffer the parrot uses is carved once, at startup, from a
//! single caller-provided region. [`SampleArena`] hands out disjoint
//! slices of that region; running out of room is the allocation failure
//! the engine reacts to. Nothing allocates after startup.

use crate::types::{AllocError, Sample};

/// Bump allocator over one sample region
pub struct SampleArena<'a> {
    free: &'a mut [Sample],
}

impl<'a> SampleArena<'a> {
    /// Create an arena over the given pool
    #[must_use]
    pub fn new(pool: &'a mut [Sample]) -> Self {
        Self { free: pool }
    }

    /// Samples still available
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Reserve a buffer of `capacity` samples
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when fewer than `capacity` samples remain.
    /// The arena is left untouched in that case.
    pub fn take(&mut self, capacity: usize) -> Result<SampleBuffer<'a>, AllocError> {
        if capacity > self.free.len() {
            return Err(AllocError {
                requested: capacity,
                available: self.free.len(),
            });
        }
        let free = core::mem::take(&mut self.free);
        let (head, tail) = free.split_at_mut(capacity);
        self.free = tail;
        Ok(SampleBuffer::new(head))
    }
}

/// Fixed-capacity sample buffer with a fill level
///
/// Writes beyond capacity are dropped, never reallocated.
pub struct SampleBuffer<'a> {
    storage: &'a mut [Sample],
    len: usize,
}

impl<'a> SampleBuffer<'a> {
    /// Wrap storage as an empty buffer
    #[must_use]
    pub fn new(storage: &'a mut [Sample]) -> Self {
        Self { storage, len: 0 }
    }

    /// Get capacity in samples
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Get number of valid samples
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if no more samples fit
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len >= self.storage.len()
    }

    /// Reset the fill level to zero
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append as many samples as fit, returning how many were taken
    pub fn extend_clamped(&mut self, samples: &[Sample]) -> usize {
        let room = self.storage.len() - self.len;
        let n = samples.len().min(room);
        self.storage[self.len..self.len + n].copy_from_slice(&samples[..n]);
        self.len += n;
        n
    }

    /// Replace the contents with up to capacity samples from `source`
    pub fn overwrite(&mut self, source: &[Sample]) -> usize {
        self.len = 0;
        self.extend_clamped(source)
    }

    /// Valid samples
    #[must_use]
    pub fn as_slice(&self) -> &[Sample] {
        &self.storage[..self.len]
    }

    /// The last `n` valid samples, if at least `n` are present
    #[must_use]
    pub fn recent(&self, n: usize) -> Option<&[Sample]> {
        if n > self.len {
            None
        } else {
            Some(&self.storage[self.len - n..self.len])
        }
    }
}
