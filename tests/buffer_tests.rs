//! Sample Storage Tests
//!
//! Tests for the startup arena, sample buffers and the circular clip store.

use radio_parrot::buffer::{SampleArena, SampleBuffer};
use radio_parrot::radio::clips::{ClipStore, Saved, SlotSummary};

// ============================================================================
// Arena Tests
// ============================================================================

#[test]
fn test_arena_exhaustion_reports_sizes() {
    let mut pool = [0i16; 10];
    let mut arena = SampleArena::new(&mut pool);
    assert!(arena.take(6).is_ok());
    let err = arena.take(6).err().unwrap();
    assert_eq!(err.requested, 6);
    assert_eq!(err.available, 4);
    // failed take leaves the remainder usable
    assert_eq!(arena.available(), 4);
    assert!(arena.take(4).is_ok());
}

#[test]
fn test_arena_zero_capacity() {
    let mut pool = [0i16; 0];
    let mut arena = SampleArena::new(&mut pool);
    let buf = arena.take(0).unwrap();
    assert_eq!(buf.capacity(), 0);
    assert!(buf.is_full());
}

// ============================================================================
// Sample Buffer Tests
// ============================================================================

#[test]
fn test_buffer_drops_overflow() {
    let mut storage = [0i16; 4];
    let mut buf = SampleBuffer::new(&mut storage);
    assert_eq!(buf.extend_clamped(&[1, 2, 3]), 3);
    assert_eq!(buf.extend_clamped(&[4, 5, 6]), 1);
    assert!(buf.is_full());
    assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    assert_eq!(buf.extend_clamped(&[7]), 0);
}

#[test]
fn test_buffer_recent_window() {
    let mut storage = [0i16; 8];
    let mut buf = SampleBuffer::new(&mut storage);
    buf.extend_clamped(&[1, 2, 3, 4, 5]);
    assert_eq!(buf.recent(2), Some(&[4, 5][..]));
    assert_eq!(buf.recent(5), Some(&[1, 2, 3, 4, 5][..]));
    assert_eq!(buf.recent(6), None);
}

#[test]
fn test_buffer_clear_keeps_capacity() {
    let mut storage = [0i16; 3];
    let mut buf = SampleBuffer::new(&mut storage);
    buf.extend_clamped(&[1, 2, 3]);
    buf.clear();
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), 3);
}

// ============================================================================
// Clip Store Tests
// ============================================================================

#[test]
fn test_store_keeps_most_recent_n() {
    let mut pool = vec![0i16; 3 * 4];
    let mut arena = SampleArena::new(&mut pool);
    let mut store = ClipStore::allocate(&mut arena, 3, 4);

    // N + 2 saves into N slots
    for i in 1..=5i16 {
        store.save(&[i; 2]);
    }
    assert_eq!(store.get(0), Some(&[4, 4][..]));
    assert_eq!(store.get(1), Some(&[5, 5][..]));
    assert_eq!(store.get(2), Some(&[3, 3][..]));
    assert_eq!(store.next_index(), 2);
    assert_eq!(store.used(), 3);
}

#[test]
fn test_store_overwrite_replaces_length() {
    let mut pool = vec![0i16; 4];
    let mut arena = SampleArena::new(&mut pool);
    let mut store = ClipStore::allocate(&mut arena, 1, 4);
    store.save(&[1, 2, 3, 4]);
    store.save(&[9]);
    assert_eq!(store.get(0), Some(&[9][..]));
}

#[test]
fn test_store_empty_save_reads_as_empty() {
    let mut pool = vec![0i16; 8];
    let mut arena = SampleArena::new(&mut pool);
    let mut store = ClipStore::allocate(&mut arena, 2, 4);
    assert_eq!(store.save(&[]), Saved { slot: 0, samples: 0 });
    assert_eq!(store.get(0), None);
    assert_eq!(store.used(), 0);
}

#[test]
fn test_store_fully_degraded_still_cycles() {
    let mut pool = vec![0i16; 2];
    let mut arena = SampleArena::new(&mut pool);
    let mut store = ClipStore::allocate(&mut arena, 2, 4);
    assert_eq!(store.len(), 2);
    assert_eq!(store.missing(), 2);
    assert_eq!(store.save(&[1]).slot, 0);
    assert_eq!(store.save(&[1]).slot, 1);
    assert_eq!(store.save(&[1]).slot, 0);
    assert_eq!(store.used(), 0);
}

#[test]
fn test_store_summary_is_one_based() {
    let mut pool = vec![0i16; 8 * 2];
    let mut arena = SampleArena::new(&mut pool);
    let mut store = ClipStore::allocate(&mut arena, 8, 2);
    store.save(&[1]);
    store.save(&[2]);
    assert_eq!(
        store.summary(),
        SlotSummary {
            next_slot: 3,
            used: 2,
            total: 8
        }
    );
}
