//! Packed batch drain: serializes a run of entries into a single
//! self-contained byte buffer instead of one callback per entry (spec
//! §4.G, §6).
//!
//! The buffer layout is `[PacketHeader][EntryHeader; entry_count][payload
//! bytes...]`. The entry count isn't known until the walk finishes (each
//! entry's payload size varies), so entries are tentatively written past
//! the *worst-case* table size — one [`ENTRY_HEADER_SIZE`] per byte of
//! remaining space — and the payload region is memmove'd down to close
//! the gap once the real count is known. Every multi-byte wire field is
//! little-endian, matching the schema codec's wire convention (spec §9).

use crate::client::ClientState;
use crate::error::{BtelemError, Result};
use crate::invariants::{debug_assert_conservation, debug_assert_offset_in_payload};
use crate::ring::{Ring, SlotRead};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Fixed header prefixed to every packed batch.
pub const PACKET_HEADER_SIZE: usize = 16;
/// Fixed header prefixed to every entry within a packed batch's table.
pub const ENTRY_HEADER_SIZE: usize = 16;

const _: () = assert!(PACKET_HEADER_SIZE == 16);
const _: () = assert!(ENTRY_HEADER_SIZE == 16);

/// Decoded form of a packed batch's 16-byte header: `entry_count, flags,
/// payload_size, dropped, _reserved` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Number of entries in this batch.
    pub entry_count: u16,
    /// Reserved for future use; always 0 in this core.
    pub flags: u16,
    /// Total bytes in the payload region following the entry table.
    pub payload_size: u32,
    /// Entries dropped to overrun since this client's previous drain call.
    pub dropped: u32,
}

/// Decoded form of one packed entry's 16-byte table record: `id,
/// payload_size, payload_offset, timestamp` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub id: u16,
    pub payload_size: u16,
    /// Byte offset into the payload region (relative to its start).
    pub payload_offset: u32,
    pub timestamp: u64,
}

fn write_packet_header(buf: &mut [u8], header: &PacketHeader) {
    let mut w = &mut buf[..PACKET_HEADER_SIZE];
    w.write_u16::<LittleEndian>(header.entry_count).unwrap();
    w.write_u16::<LittleEndian>(header.flags).unwrap();
    w.write_u32::<LittleEndian>(header.payload_size).unwrap();
    w.write_u32::<LittleEndian>(header.dropped).unwrap();
    w.write_u32::<LittleEndian>(0).unwrap(); // _reserved
}

fn write_entry_header(buf: &mut [u8], header: &EntryHeader) {
    let mut w = &mut buf[..ENTRY_HEADER_SIZE];
    w.write_u16::<LittleEndian>(header.id).unwrap();
    w.write_u16::<LittleEndian>(header.payload_size).unwrap();
    w.write_u32::<LittleEndian>(header.payload_offset).unwrap();
    w.write_u64::<LittleEndian>(header.timestamp).unwrap();
}

/// Decodes a packed batch's header from its first [`PACKET_HEADER_SIZE`]
/// bytes.
pub fn decode_packet_header(buf: &[u8]) -> Result<PacketHeader> {
    if buf.len() < PACKET_HEADER_SIZE {
        return Err(BtelemError::BufferTooSmall { got: buf.len(), min: PACKET_HEADER_SIZE });
    }
    let mut r = &buf[..PACKET_HEADER_SIZE];
    let entry_count = r.read_u16::<LittleEndian>().unwrap();
    let flags = r.read_u16::<LittleEndian>().unwrap();
    let payload_size = r.read_u32::<LittleEndian>().unwrap();
    let dropped = r.read_u32::<LittleEndian>().unwrap();
    Ok(PacketHeader { entry_count, flags, payload_size, dropped })
}

/// Decodes one entry's table record from an [`ENTRY_HEADER_SIZE`]-byte
/// slice.
pub fn decode_entry_header(buf: &[u8]) -> Result<EntryHeader> {
    if buf.len() < ENTRY_HEADER_SIZE {
        return Err(BtelemError::BufferTooSmall { got: buf.len(), min: ENTRY_HEADER_SIZE });
    }
    let mut r = &buf[..ENTRY_HEADER_SIZE];
    let id = r.read_u16::<LittleEndian>().unwrap();
    let payload_size = r.read_u16::<LittleEndian>().unwrap();
    let payload_offset = r.read_u32::<LittleEndian>().unwrap();
    let timestamp = r.read_u64::<LittleEndian>().unwrap();
    Ok(EntryHeader { id, payload_size, payload_offset, timestamp })
}

/// Drains as much of `client`'s unread range as fits in `buf`, packing it
/// into `[PacketHeader][EntryHeader...][payload...]`.
///
/// Returns the number of meaningful bytes written at the front of `buf`
/// (always `<= buf.len()`; the remainder of `buf` is left untouched).
///
/// Fails only if `buf` can't even hold [`PACKET_HEADER_SIZE`] bytes.
/// Everything else — zero entries fitting, overrun mid-walk, a filter
/// rejecting every candidate — is a valid, successful zero-or-more-entry
/// batch.
pub fn drain_packed(ring: &Ring, client: &mut ClientState, buf: &mut [u8]) -> Result<usize> {
    if buf.len() < PACKET_HEADER_SIZE {
        return Err(BtelemError::BufferTooSmall { got: buf.len(), min: PACKET_HEADER_SIZE });
    }

    let head = ring.head();
    let table_start = PACKET_HEADER_SIZE;
    let available_for_table = buf.len() - table_start;
    // Upper bound on entry count: every entry needs at least one table
    // slot even with an empty payload, and there's no point reserving more
    // slots than there are pending entries to fill them.
    let pending = head.saturating_sub(client.cursor) as usize;
    let max_entries = (available_for_table / ENTRY_HEADER_SIZE)
        .min(pending)
        .min(ring.capacity())
        .min(u16::MAX as usize);
    let tentative_payload_start = table_start + max_entries * ENTRY_HEADER_SIZE;

    let mut count = 0usize;
    let mut payload_cursor = tentative_payload_start;

    while count < max_entries && client.cursor < head {
        let cursor_before = client.cursor;
        let dropped_before = client.dropped;
        match ring.read_at(client.cursor) {
            SlotRead::NotYetCommitted => break,

            SlotRead::Torn => {
                // See drain.rs's matching arm: a torn read always counts as
                // one dropped entry, whether folded into a bulk overrun
                // skip or handled one slot at a time.
                let oldest_available = head.saturating_sub(ring.capacity() as u64);
                if oldest_available > client.cursor {
                    client.dropped += oldest_available - client.cursor;
                    client.cursor = oldest_available;
                } else {
                    client.dropped += 1;
                    client.cursor += 1;
                }
                debug_assert_conservation!(0u64, client.dropped - dropped_before, client.cursor, cursor_before);
            }

            SlotRead::Entry(entry) => {
                if !client.filter.passes(entry.id) {
                    client.cursor += 1;
                    debug_assert_conservation!(1u64, client.dropped - dropped_before, client.cursor, cursor_before);
                    continue;
                }

                let payload_size = entry.payload_size as usize;
                if payload_cursor + payload_size > buf.len() {
                    // No room left for this entry's payload; stop here and
                    // leave it for the next drain call.
                    break;
                }

                let relative_offset = (payload_cursor - tentative_payload_start) as u32;
                debug_assert_offset_in_payload!(
                    relative_offset as usize,
                    payload_size,
                    buf.len() - tentative_payload_start
                );
                let table_offset = table_start + count * ENTRY_HEADER_SIZE;
                write_entry_header(
                    &mut buf[table_offset..table_offset + ENTRY_HEADER_SIZE],
                    &EntryHeader {
                        id: entry.id,
                        payload_size: entry.payload_size,
                        payload_offset: relative_offset,
                        timestamp: entry.timestamp,
                    },
                );
                buf[payload_cursor..payload_cursor + payload_size]
                    .copy_from_slice(&entry.payload[..payload_size]);

                payload_cursor += payload_size;
                count += 1;
                client.cursor += 1;
                debug_assert_conservation!(1u64, client.dropped - dropped_before, client.cursor, cursor_before);
            }
        }
    }

    // The real table only needs `count` records, not the worst-case
    // `max_entries` we reserved room for. Close the gap by sliding the
    // payload bytes down to immediately follow the real table. Relative
    // payload offsets already written into the entry table are unaffected
    // by this shift.
    let actual_table_end = table_start + count * ENTRY_HEADER_SIZE;
    let payload_len = payload_cursor - tentative_payload_start;
    if actual_table_end != tentative_payload_start && payload_len > 0 {
        buf.copy_within(tentative_payload_start..tentative_payload_start + payload_len, actual_table_end);
    }

    let dropped_delta = client.dropped.saturating_sub(client.dropped_reported).min(u32::MAX as u64) as u32;
    client.dropped_reported = client.dropped;

    write_packet_header(
        &mut buf[0..PACKET_HEADER_SIZE],
        &PacketHeader {
            entry_count: count as u16,
            flags: 0,
            payload_size: payload_len as u32,
            dropped: dropped_delta,
        },
    );

    Ok(actual_table_end + payload_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientTable, Filter};

    #[test]
    fn packs_entries_with_exact_header_and_table() {
        let ring = Ring::new(16).unwrap();
        ring.log(7u16, [1u8, 2, 3], 100u64);
        ring.log(7u16, [4u8, 5, 6, 7], 200u64);

        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        let client = table.get_mut(id).unwrap();

        let mut buf = vec![0u8; 256];
        let len = drain_packed(&ring, client, &mut buf).unwrap();

        let header = decode_packet_header(&buf).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(header.dropped, 0);
        assert_eq!(header.flags, 0);
        assert_eq!(header.payload_size, 7);

        let e0 = decode_entry_header(&buf[PACKET_HEADER_SIZE..]).unwrap();
        assert_eq!(e0.id, 7);
        assert_eq!(e0.payload_size, 3);
        assert_eq!(e0.payload_offset, 0);
        assert_eq!(e0.timestamp, 100);

        let e1 = decode_entry_header(&buf[PACKET_HEADER_SIZE + ENTRY_HEADER_SIZE..]).unwrap();
        assert_eq!(e1.payload_size, 4);
        assert_eq!(e1.payload_offset, 3);

        let payload_start = PACKET_HEADER_SIZE + 2 * ENTRY_HEADER_SIZE;
        assert_eq!(&buf[payload_start..payload_start + 3], &[1, 2, 3]);
        assert_eq!(&buf[payload_start + 3..payload_start + 3 + 4], &[4, 5, 6, 7]);
        assert_eq!(len, payload_start + 3 + 4);
    }

    /// spec.md §8 Scenario 4, literally.
    #[test]
    fn scenario_4_packed_packet_bytes() {
        let ring = Ring::new(16).unwrap();
        ring.log(0u16, 0xDEADBEEFu32.to_le_bytes(), 0);
        ring.log(0u16, 0xCAFEBABEu32.to_le_bytes(), 0);

        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        let client = table.get_mut(id).unwrap();

        let mut buf = vec![0u8; 4096];
        let len = drain_packed(&ring, client, &mut buf).unwrap();
        assert_eq!(len, 56);

        let header = decode_packet_header(&buf).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(header.flags, 0);
        assert_eq!(header.payload_size, 8);
        assert_eq!(header.dropped, 0);

        let e0 = decode_entry_header(&buf[PACKET_HEADER_SIZE..]).unwrap();
        assert_eq!(e0.id, 0);
        assert_eq!(e0.payload_size, 4);
        assert_eq!(e0.payload_offset, 0);

        let e1 = decode_entry_header(&buf[PACKET_HEADER_SIZE + ENTRY_HEADER_SIZE..]).unwrap();
        assert_eq!(e1.payload_size, 4);
        assert_eq!(e1.payload_offset, 4);

        let payload_start = PACKET_HEADER_SIZE + 2 * ENTRY_HEADER_SIZE;
        assert_eq!(
            &buf[payload_start..payload_start + 8],
            &[0xEF, 0xBE, 0xAD, 0xDE, 0xBE, 0xBA, 0xFE, 0xCA]
        );

        // Second drain returns an empty packet.
        let len2 = drain_packed(&ring, client, &mut buf).unwrap();
        let header2 = decode_packet_header(&buf[..len2]).unwrap();
        assert_eq!(header2.entry_count, 0);
        assert_eq!(len2, PACKET_HEADER_SIZE);
    }

    #[test]
    fn dropped_delta_resets_after_each_call() {
        let ring = Ring::new(2).unwrap();
        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();

        for i in 0..5u32 {
            ring.log(0u16, i, i as u64);
        }

        let client = table.get_mut(id).unwrap();
        let mut buf = vec![0u8; 256];
        let len = drain_packed(&ring, client, &mut buf).unwrap();
        let header = decode_packet_header(&buf[..len]).unwrap();
        assert!(header.dropped > 0);

        // Nothing new has overrun since the last call: the delta must be 0
        // even though the cumulative `dropped` counter is still nonzero.
        let len2 = drain_packed(&ring, client, &mut buf).unwrap();
        let header2 = decode_packet_header(&buf[..len2]).unwrap();
        assert_eq!(header2.dropped, 0);
        assert_eq!(header2.entry_count, 0);
    }

    #[test]
    fn buffer_too_small_for_header_fails() {
        let ring = Ring::new(16).unwrap();
        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        let client = table.get_mut(id).unwrap();

        let mut buf = vec![0u8; 4];
        assert!(matches!(
            drain_packed(&ring, client, &mut buf),
            Err(BtelemError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn zero_entries_available_yields_empty_batch() {
        let ring = Ring::new(16).unwrap();
        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        let client = table.get_mut(id).unwrap();

        let mut buf = vec![0u8; 256];
        let len = drain_packed(&ring, client, &mut buf).unwrap();
        let header = decode_packet_header(&buf[..len]).unwrap();
        assert_eq!(header.entry_count, 0);
        assert_eq!(len, PACKET_HEADER_SIZE);
    }

    #[test]
    fn filtered_entries_are_skipped_but_still_consumed() {
        let ring = Ring::new(16).unwrap();
        ring.log(0u16, 1u32, 1);
        ring.log(9u16, 2u32, 2);
        ring.log(0u16, 3u32, 3);

        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        table.set_filter(id, Filter::accepting([9])).unwrap();
        let client = table.get_mut(id).unwrap();

        let mut buf = vec![0u8; 256];
        let len = drain_packed(&ring, client, &mut buf).unwrap();
        let header = decode_packet_header(&buf[..len]).unwrap();
        assert_eq!(header.entry_count, 1);
        assert_eq!(client.cursor(), 3);
    }

    #[test]
    fn undersized_buffer_stops_before_payload_overflow() {
        let ring = Ring::new(16).unwrap();
        ring.log(0u16, [0u8; 50], 1);
        ring.log(0u16, [0u8; 50], 2);

        let mut table = ClientTable::new();
        let id = table.open(0).unwrap();
        let client = table.get_mut(id).unwrap();

        // Two pending entries reserve a worst-case 2-slot table; what's
        // left after that comfortably fits the first 50-byte payload but
        // not a second.
        let mut buf = vec![0u8; PACKET_HEADER_SIZE + 2 * ENTRY_HEADER_SIZE + 50 + 10];
        let len = drain_packed(&ring, client, &mut buf).unwrap();
        let header = decode_packet_header(&buf[..len]).unwrap();
        assert_eq!(header.entry_count, 1);
        assert_eq!(client.cursor(), 1); // second entry left for next call
    }
}
