//! The lock-free MPMC ring and its commit protocol (spec §4.A).
//!
//! A single monotonic `head` counter is the slot allocator; a per-slot `seq`
//! is the commit flag. No producer ever blocks, no consumer ever blocks a
//! producer, and any number of producers may race `head` simultaneously —
//! the allocator is a single `fetch_add`, never a CAS loop.

use crate::entry::{Entry, MAX_PAYLOAD};
use crate::error::{BtelemError, Result};
use crate::invariants::debug_assert_seq_matches_index;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// 128-byte alignment to keep `head` off the cache line(s) touched by
/// per-slot data, the same prefetcher-false-sharing concern the teacher's
/// `Ring<T>` documents for its own hot fields.
#[repr(align(128))]
struct CacheAligned<T>(T);

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Everything about a slot except the commit flag. Plain, non-atomic bytes:
/// their visibility is published entirely through `Slot::seq` (spec §9,
/// "per-slot seq atomicity").
#[derive(Clone, Copy)]
struct SlotBody {
    timestamp: u64,
    id: u16,
    payload_size: u16,
    payload: [u8; MAX_PAYLOAD],
}

impl SlotBody {
    const ZERO: SlotBody = SlotBody {
        timestamp: 0,
        id: 0,
        payload_size: 0,
        payload: [0; MAX_PAYLOAD],
    };
}

struct Slot {
    /// Commit flag: `0` while being written, `index + 1` once published.
    seq: AtomicU64,
    body: UnsafeCell<SlotBody>,
}

impl Slot {
    fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            body: UnsafeCell::new(SlotBody::ZERO),
        }
    }
}

// SAFETY: `body` is only written by the single producer that owns the slot
// for the current generation (serialized by `seq`'s release/acquire pair),
// and only read by a consumer after observing the matching `seq` via
// acquire. No two threads ever touch `body` without that synchronization.
unsafe impl Sync for Slot {}

/// Outcome of reading a single slot under the torn-read-safe protocol.
pub(crate) enum SlotRead {
    /// The producer has not yet committed this slot (`seq < index + 1`).
    NotYetCommitted,
    /// The slot was overwritten by a later generation before or during the
    /// read (`seq > index + 1`, or `seq` changed between the two loads).
    Torn,
    /// A coherent snapshot.
    Entry(Entry),
}

/// The ring buffer: fixed capacity, a single monotonic `head`, and an inline
/// array of [`Slot`]s.
pub struct Ring {
    head: CacheAligned<AtomicU64>,
    capacity: usize,
    mask: usize,
    slots: Box<[Slot]>,
}

impl Ring {
    /// Creates a new ring with `capacity` slots. `capacity` must be a
    /// nonzero power of two.
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(BtelemError::CapacityNotPowerOfTwo(capacity));
        }
        let slots = (0..capacity).map(|_| Slot::new()).collect::<Vec<_>>();
        Ok(Self {
            head: CacheAligned(AtomicU64::new(0)),
            capacity: capacity as usize,
            mask: capacity as usize - 1,
            slots: slots.into_boxed_slice(),
        })
    }

    /// Ring capacity (a power of two).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current head value: the absolute index of the next slot a producer
    /// will reserve.
    #[inline]
    pub fn head(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Logs a record of payload type `T` under `id`, at `timestamp`.
    ///
    /// The payload size check is a compile-time assertion: a `T` larger
    /// than [`MAX_PAYLOAD`] fails to build rather than failing at runtime,
    /// preserving the source's `_Static_assert` at the `BTELEM_LOG` call
    /// site (spec §9).
    ///
    /// Returns the absolute slot index this record was committed to.
    #[inline]
    pub fn log<T: Copy>(&self, id: u16, payload: T, timestamp: u64) -> u64 {
        const fn check<T>() {
            assert!(
                std::mem::size_of::<T>() <= MAX_PAYLOAD,
                "btelem: payload exceeds MAX_PAYLOAD"
            );
        }
        const { check::<T>() };

        // Step 1: fetch-and-add head, relaxed — slot allocation needs no
        // synchronization with anything other than itself.
        let slot_index = self.head.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[(slot_index as usize) & self.mask];

        // Step 3: mark the slot as being written. Any consumer that sees
        // this must stop (NotYetCommitted) rather than read stale data.
        slot.seq.store(0, Ordering::Release);

        // Step 4: plain writes, protected by the release stores on either
        // side.
        //
        // SAFETY: this producer exclusively owns `slot.body` between the
        // two `seq` stores — no other producer can reserve the same
        // `slot_index` again until `head` wraps past `capacity` more
        // allocations from now, and no consumer reads `body` without first
        // observing `seq == slot_index + 1` via acquire.
        unsafe {
            let body = &mut *slot.body.get();
            body.timestamp = timestamp;
            body.id = id;
            body.payload_size = std::mem::size_of::<T>() as u16;
            std::ptr::copy_nonoverlapping(
                (&payload as *const T).cast::<u8>(),
                body.payload.as_mut_ptr(),
                std::mem::size_of::<T>(),
            );
        }

        // Step 5: publish. Synchronizes-with a consumer's acquire load of
        // the same `seq`, making the writes above visible.
        slot.seq.store(slot_index + 1, Ordering::Release);

        slot_index
    }

    /// Reads the slot at absolute `index` under the torn-read-safe protocol
    /// (spec §4.A steps 3–6).
    pub(crate) fn read_at(&self, index: u64) -> SlotRead {
        let slot = &self.slots[(index as usize) & self.mask];
        let expected = index + 1;

        let seq1 = slot.seq.load(Ordering::Acquire);
        if seq1 < expected {
            return SlotRead::NotYetCommitted;
        }
        if seq1 != expected {
            return SlotRead::Torn;
        }

        // SAFETY: `seq1 == expected` means the producer's release store of
        // `seq` has happened-before this acquire load, so its prior plain
        // writes to `body` are visible. We snapshot eagerly, then re-check
        // `seq` below to detect a concurrent overwrite during the copy.
        let body = unsafe { *slot.body.get() };

        let seq2 = slot.seq.load(Ordering::Acquire);
        if seq2 != seq1 {
            return SlotRead::Torn;
        }

        debug_assert_seq_matches_index!(seq1, index);
        SlotRead::Entry(Entry::new(seq1, body.timestamp, body.id, body.payload_size, body.payload))
    }
}

// SAFETY: producers only ever write their own allocated slot between its
// two `seq` stores; consumers only ever read a slot after observing the
// matching `seq` via acquire. The ring itself holds no other shared mutable
// state.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}
