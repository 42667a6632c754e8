//! Clip Store
//!
//! A fixed number of fixed-capacity clip slots written in circular order.
//! Slots are reserved once at startup; a slot whose storage could not be
//! reserved stays empty for the life of the store.

use heapless::Vec;

use crate::buffer::{SampleArena, SampleBuffer};
use crate::config::MAX_CLIP_SLOTS;
use crate::types::Sample;

/// Slot counts handed to the macro expander
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSummary {
    /// Slot the next save lands in, 1-based
    pub next_slot: usize,
    /// Slots holding a clip
    pub used: usize,
    /// Slots in the store
    pub total: usize,
}

/// Where a save landed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Saved {
    /// Slot index written
    pub slot: usize,
    /// Samples stored (0 if the slot has no storage)
    pub samples: usize,
}

/// Circular store of recorded clips
pub struct ClipStore<'a> {
    slots: Vec<Option<SampleBuffer<'a>>, MAX_CLIP_SLOTS>,
    next: usize,
}

impl<'a> ClipStore<'a> {
    /// Reserve `slots` clips of `capacity` samples each from the arena
    ///
    /// Never fails: slots that cannot be reserved are left without
    /// storage and reported by [`ClipStore::missing`].
    pub fn allocate(arena: &mut SampleArena<'a>, slots: usize, capacity: usize) -> Self {
        let count = slots.clamp(1, MAX_CLIP_SLOTS);
        let mut store = Vec::new();
        for index in 0..count {
            let slot = match arena.take(capacity) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    warn!("clip slot {} unavailable: {}", index, e.requested);
                    None
                }
            };
            let _ = store.push(slot);
        }
        let this = Self { slots: store, next: 0 };
        if this.missing() > 0 {
            warn!(
                "clip store degraded: {} of {} slots without storage",
                this.missing(),
                this.len()
            );
        } else {
            info!("clip store ready: {} slots x {} samples", this.len(), capacity);
        }
        this
    }

    /// Copy a recording into the next slot and advance the write index
    pub fn save(&mut self, samples: &[Sample]) -> Saved {
        let slot = self.next;
        let stored = match self.slots.get_mut(slot) {
            Some(Some(buffer)) => buffer.overwrite(samples),
            _ => {
                warn!("clip slot {} has no storage, recording not kept", slot);
                0
            }
        };
        self.next = (self.next + 1) % self.slots.len().max(1);
        info!("saved {} samples to slot {}", stored, slot);
        Saved {
            slot,
            samples: stored,
        }
    }

    /// Get the clip in a slot, `None` if empty or out of range
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[Sample]> {
        match self.slots.get(index) {
            Some(Some(buffer)) if !buffer.is_empty() => Some(buffer.as_slice()),
            _ => None,
        }
    }

    /// Get the slot the next save writes
    #[must_use]
    pub const fn next_index(&self) -> usize {
        self.next
    }

    /// Get the number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the store has no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Count slots holding a clip
    #[must_use]
    pub fn used(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.as_ref().is_some_and(|b| !b.is_empty()))
            .count()
    }

    /// Count slots without storage
    #[must_use]
    pub fn missing(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Check if any slot is without storage
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.missing() > 0
    }

    /// Counts for message expansion
    #[must_use]
    pub fn summary(&self) -> SlotSummary {
        SlotSummary {
            next_slot: self.next + 1,
            used: self.used(),
            total: self.len(),
        }
    }
}
