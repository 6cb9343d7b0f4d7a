//! The fixed-size ring entry and the compile-time limits that size it.
//!
//! Mirrors `struct btelem_entry` in the original C header: `seq` first so a
//! consumer touches one cache line to decide whether the rest is worth
//! reading, then a plain, non-atomic tail that is only ever published
//! through `seq`.

/// Maximum inline payload size in bytes. Default 232, giving a 256-byte
/// entry (`seq` 8 + `timestamp` 8 + `id` 2 + `payload_size` 2 + 4 pad +
/// 232 payload).
pub const MAX_PAYLOAD: usize = 232;

/// Maximum number of concurrently open clients.
pub const MAX_CLIENTS: usize = 8;

/// Maximum number of registrable schema ids on the producer side.
/// Decoders should accept up to 256 (spec §6).
pub const MAX_SCHEMA_ENTRIES: usize = 64;

/// Maximum schema/field name length, including the terminating zero byte.
pub const NAME_MAX: usize = 64;

/// Maximum schema description length, including the terminating zero byte.
pub const DESC_MAX: usize = 128;

/// Maximum number of fields per schema.
pub const MAX_FIELDS: usize = 16;

/// Maximum characters (including terminator) per enum label.
pub const ENUM_LABEL_MAX: usize = 32;

/// Maximum number of labelled values per enum field.
pub const ENUM_MAX_VALUES: usize = 64;

/// Maximum number of named bits per bitfield field.
pub const BITFIELD_MAX_BITS: usize = 16;

/// Maximum characters (including terminator) per bitfield bit name.
pub const BIT_NAME_MAX: usize = 32;

/// A single fixed-size telemetry record.
///
/// `seq == 0` means "never written, or not yet committed for this
/// generation". `seq == slot_index + 1` means "committed with this slot
/// index". The commit flag is published independently of the rest of the
/// fields via release/acquire on `seq` (see [`crate::ring::Ring`]).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Entry {
    /// Published sequence number: `slot_index + 1` once committed.
    pub seq: u64,
    /// Monotonic-clock nanosecond timestamp, written by the producer.
    pub timestamp: u64,
    /// Schema id this entry's payload decodes against.
    pub id: u16,
    /// Number of valid bytes in `payload`.
    pub payload_size: u16,
    _reserved: [u8; 4],
    /// Inline payload bytes; only the first `payload_size` are meaningful.
    pub payload: [u8; MAX_PAYLOAD],
}

impl Entry {
    /// An all-zero entry (uncommitted, `seq == 0`).
    pub const ZERO: Entry = Entry {
        seq: 0,
        timestamp: 0,
        id: 0,
        payload_size: 0,
        _reserved: [0; 4],
        payload: [0; MAX_PAYLOAD],
    };

    /// Builds a snapshot entry from its meaningful fields. Used by the ring
    /// when materializing a coherent read.
    pub(crate) fn new(seq: u64, timestamp: u64, id: u16, payload_size: u16, payload: [u8; MAX_PAYLOAD]) -> Self {
        Self {
            seq,
            timestamp,
            id,
            payload_size,
            _reserved: [0; 4],
            payload,
        }
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::ZERO
    }
}

const _: () = assert!(
    std::mem::size_of::<Entry>() == 24 + MAX_PAYLOAD,
    "Entry layout must match spec: seq(8)+timestamp(8)+id(2)+payload_size(2)+pad(4)+payload"
);
