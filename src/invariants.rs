//! Debug assertion macros for the properties listed in spec.md §8.
//!
//! Active only in debug builds (`debug_assert!` compiles out under
//! `--release`), so there is zero overhead on the hot path in production.
//! Mirrors the teacher crate's `invariants.rs` convention of one
//! named-invariant macro per `debug_assert!` call site.

// =============================================================================
// I-SEQ: slot sequence uniqueness
// =============================================================================

/// A slot's committed `seq` must equal its owning absolute index plus one.
///
/// Used in: [`crate::ring::Ring::read_at`] once a coherent read is taken.
macro_rules! debug_assert_seq_matches_index {
    ($seq:expr, $index:expr) => {
        debug_assert!(
            $seq == $index + 1,
            "I-SEQ violated: slot seq {} does not equal index {} + 1",
            $seq,
            $index
        )
    };
}

// =============================================================================
// I-CURSOR: monotone cursors
// =============================================================================

/// A client's cursor only ever advances.
///
/// Used in: [`crate::drain::drain`], [`crate::packet::drain_packed`] after
/// any cursor update.
macro_rules! debug_assert_cursor_monotonic {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "I-CURSOR violated: cursor went from {} to {}",
            $old,
            $new
        )
    };
}

// =============================================================================
// I-CONSERVE: observed + dropped accounts for every allocated slot
// =============================================================================

/// `observed + dropped == head_seen - cursor_open` at any quiescent moment.
///
/// Used in: integration tests, not the hot path (requires bookkeeping only
/// a test harness keeps).
macro_rules! debug_assert_conservation {
    ($observed:expr, $dropped:expr, $head_seen:expr, $cursor_open:expr) => {
        debug_assert!(
            $observed + $dropped == $head_seen - $cursor_open,
            "I-CONSERVE violated: observed {} + dropped {} != head_seen {} - cursor_open {}",
            $observed,
            $dropped,
            $head_seen,
            $cursor_open
        )
    };
}

// =============================================================================
// I-PACKET: packed-packet self-consistency
// =============================================================================

/// A packed entry's offset plus its size must not exceed the packet's
/// declared payload region.
///
/// Used in: [`crate::packet::drain_packed`] after computing each entry's
/// relative offset.
macro_rules! debug_assert_offset_in_payload {
    ($offset:expr, $size:expr, $payload_size:expr) => {
        debug_assert!(
            $offset + $size <= $payload_size,
            "I-PACKET violated: entry at offset {} size {} exceeds payload_size {}",
            $offset,
            $size,
            $payload_size
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_conservation;
pub(crate) use debug_assert_cursor_monotonic;
pub(crate) use debug_assert_offset_in_payload;
pub(crate) use debug_assert_seq_matches_index;
