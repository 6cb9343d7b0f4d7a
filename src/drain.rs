//! Callback drain: walks a client's unread range of the ring, delivering
//! one entry at a time (spec §4.F).
//!
//! Three things can happen at each cursor position: the slot isn't
//! committed yet (stop, nothing to report), the slot was overwritten
//! since the client last looked (skip the client forward to the oldest
//! still-available entry, counting the gap as dropped), or the slot holds
//! a coherent entry (filter it, maybe deliver it, advance).

use crate::client::ClientState;
use crate::entry::Entry;
use crate::invariants::{debug_assert_conservation, debug_assert_cursor_monotonic};
use crate::ring::{Ring, SlotRead};

/// Drains as much of `client`'s unread range as is available, calling
/// `callback` with each entry that passes the client's filter.
///
/// `callback` returns `true` to keep draining, `false` to stop early. The
/// entry passed to a `false`-returning call has already been consumed
/// (the cursor advances past it) — only entries not yet shown to the
/// callback remain for the next call.
///
/// Returns the number of entries delivered to `callback` (i.e. after
/// filtering; entries the filter rejects still advance the cursor but are
/// not counted here and never reach `callback`).
pub fn drain<F: FnMut(&Entry) -> bool>(ring: &Ring, client: &mut ClientState, mut callback: F) -> usize {
    let head = ring.head();
    let mut delivered = 0usize;

    loop {
        if client.cursor >= head {
            break;
        }

        let cursor_before = client.cursor;
        let dropped_before = client.dropped;
        match ring.read_at(client.cursor) {
            SlotRead::NotYetCommitted => break,

            SlotRead::Torn => {
                // A torn read is definitionally a slot that was overwritten
                // before or during this read — it always counts as exactly
                // one dropped entry, never a free pass. The overrun-skip
                // branch above folds a whole run of such slots into one
                // bulk add; this branch handles the single-slot case a
                // racing producer's `head` can still produce even after the
                // bulk skip (the `head` snapshot at the top of this drain
                // call can be stale relative to a concurrent fetch_add).
                let oldest_available = head.saturating_sub(ring.capacity() as u64);
                if oldest_available > client.cursor {
                    client.dropped += oldest_available - client.cursor;
                    client.cursor = oldest_available;
                } else {
                    client.dropped += 1;
                    client.cursor += 1;
                }
                debug_assert_cursor_monotonic!(cursor_before, client.cursor);
                debug_assert_conservation!(0u64, client.dropped - dropped_before, client.cursor, cursor_before);
            }

            SlotRead::Entry(entry) => {
                client.cursor += 1;
                debug_assert_cursor_monotonic!(cursor_before, client.cursor);
                debug_assert_conservation!(1u64, client.dropped - dropped_before, client.cursor, cursor_before);
                if client.filter.passes(entry.id) {
                    delivered += 1;
                    if !callback(&entry) {
                        break;
                    }
                }
            }
        }
    }

    delivered
}
