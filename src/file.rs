//! Fixed-size record types for the persisted file footer/index (spec §6).
//!
//! The persisted file format itself — writing packets to disk, seeking,
//! reading back — is an external collaborator and out of scope (spec §1).
//! This module only defines the record shapes an external writer/reader
//! needs so it can depend on this crate for them, mirroring
//! `btelem_index_entry` / `btelem_index_footer` in
//! `original_source/include/btelem/btelem_types.h`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Magic bytes identifying a valid footer: ASCII `"BTLI"` read little-endian.
pub const FOOTER_MAGIC: u32 = 0x494C_5442;

/// Size in bytes of one [`IndexEntry`] on disk.
pub const INDEX_ENTRY_SIZE: usize = 28;
/// Size in bytes of the trailing [`IndexFooter`].
pub const FOOTER_SIZE: usize = 16;

const _: () = assert!(INDEX_ENTRY_SIZE == 28);
const _: () = assert!(FOOTER_SIZE == 16);

/// One packet's worth of seek metadata: file offset, timestamp span, and
/// entry count. Written once per packet, immediately before the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// File offset of the packet this entry describes.
    pub offset: u64,
    /// Earliest entry timestamp within the packet.
    pub ts_min: u64,
    /// Latest entry timestamp within the packet.
    pub ts_max: u64,
    /// Number of entries in the packet.
    pub entry_count: u32,
}

impl IndexEntry {
    /// Serializes to exactly [`INDEX_ENTRY_SIZE`] little-endian bytes.
    pub fn to_bytes(self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        let mut w = &mut buf[..];
        w.write_u64::<LittleEndian>(self.offset).unwrap();
        w.write_u64::<LittleEndian>(self.ts_min).unwrap();
        w.write_u64::<LittleEndian>(self.ts_max).unwrap();
        w.write_u32::<LittleEndian>(self.entry_count).unwrap();
        buf
    }

    /// Parses an [`IndexEntry`] from exactly [`INDEX_ENTRY_SIZE`] bytes.
    pub fn from_bytes(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        let mut r = &buf[..];
        Self {
            offset: r.read_u64::<LittleEndian>().unwrap(),
            ts_min: r.read_u64::<LittleEndian>().unwrap(),
            ts_max: r.read_u64::<LittleEndian>().unwrap(),
            entry_count: r.read_u32::<LittleEndian>().unwrap(),
        }
    }
}

/// The 16-byte footer at the end of a persisted file: where the index
/// starts, how many entries it has, and a magic value a reader checks
/// before trusting any of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFooter {
    /// File offset of the first [`IndexEntry`].
    pub index_offset: u64,
    /// Number of index entries.
    pub index_count: u32,
}

impl IndexFooter {
    /// Canonical magic value: [`FOOTER_MAGIC`].
    pub const MAGIC: u32 = FOOTER_MAGIC;

    /// Serializes to exactly [`FOOTER_SIZE`] little-endian bytes, magic
    /// included.
    pub fn to_bytes(self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        let mut w = &mut buf[..];
        w.write_u64::<LittleEndian>(self.index_offset).unwrap();
        w.write_u32::<LittleEndian>(self.index_count).unwrap();
        w.write_u32::<LittleEndian>(Self::MAGIC).unwrap();
        buf
    }

    /// Validates and parses a footer from the trailing [`FOOTER_SIZE`] bytes
    /// of a file. Returns `None` if the magic doesn't match — "readers
    /// detect a valid footer by loading the last 16 bytes and checking
    /// magic" (spec §6).
    pub fn read_footer(tail: &[u8]) -> Option<Self> {
        if tail.len() < FOOTER_SIZE {
            return None;
        }
        let buf = &tail[tail.len() - FOOTER_SIZE..];
        let mut r = buf;
        let index_offset = r.read_u64::<LittleEndian>().unwrap();
        let index_count = r.read_u32::<LittleEndian>().unwrap();
        let magic = r.read_u32::<LittleEndian>().unwrap();
        if magic != Self::MAGIC {
            return None;
        }
        Some(Self { index_offset, index_count })
    }
}
