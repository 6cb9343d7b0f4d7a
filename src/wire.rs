//! The schema wire codec: serializes the registry into the fixed-layout,
//! endianness-tagged byte stream decoders expect (spec §4.D, §6).
//!
//! Buffered [`SchemaCodec::serialize_into`] and streaming
//! [`SchemaCodec::stream`] produce byte-for-byte identical output — the
//! streamed form is just the buffered form's bytes sliced into the chunk
//! boundaries documented in spec §4.D. Both are built on the same
//! record encoders below so there is exactly one place that can get the
//! layout wrong.

use crate::entry::{
    BITFIELD_MAX_BITS, BIT_NAME_MAX, DESC_MAX, ENUM_LABEL_MAX, ENUM_MAX_VALUES, MAX_FIELDS,
    NAME_MAX,
};
use crate::error::{BtelemError, Result};
use crate::schema::{FieldDef, FieldType, SchemaDescriptor, SchemaRegistry};
use byteorder::{NativeEndian, WriteBytesExt};

const SCHEMA_HEADER_SIZE: usize = 3;
const FIELD_WIRE_SIZE: usize = NAME_MAX + 2 + 2 + 1 + 1;
const SCHEMA_WIRE_SIZE: usize = 2 + 2 + 2 + NAME_MAX + DESC_MAX + MAX_FIELDS * FIELD_WIRE_SIZE;
const ENUM_WIRE_SIZE: usize = 2 + 2 + 1 + ENUM_MAX_VALUES * ENUM_LABEL_MAX;
const BITFIELD_WIRE_SIZE: usize =
    2 + 2 + 1 + BITFIELD_MAX_BITS * BIT_NAME_MAX + BITFIELD_MAX_BITS + BITFIELD_MAX_BITS;

const _: () = assert!(FIELD_WIRE_SIZE == 70);
const _: () = assert!(SCHEMA_WIRE_SIZE == 1318);
const _: () = assert!(SCHEMA_HEADER_SIZE == 3);
const _: () = assert!(ENUM_WIRE_SIZE == 2053);
const _: () = assert!(BITFIELD_WIRE_SIZE == 549);

/// Writes `s` into a `cap`-byte fixed slot, truncated to `cap - 1` bytes
/// with a guaranteed trailing zero, zero-padding the rest.
fn write_fixed_str(out: &mut Vec<u8>, s: &str, cap: usize) {
    let bytes = s.as_bytes();
    let take = bytes.len().min(cap - 1);
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + (cap - take), 0);
}

/// `0` on little-endian hosts, `1` on big-endian hosts — the only two
/// values the header's `endianness` byte may take (spec §6).
fn host_endianness_tag() -> u8 {
    u8::from(cfg!(target_endian = "big"))
}

fn encode_header(entry_count: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SCHEMA_HEADER_SIZE);
    buf.write_u8(host_endianness_tag()).unwrap();
    buf.write_u16::<NativeEndian>(entry_count).unwrap();
    buf
}

fn encode_field(field: &FieldDef) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FIELD_WIRE_SIZE);
    write_fixed_str(&mut buf, &field.name, NAME_MAX);
    buf.write_u16::<NativeEndian>(field.offset).unwrap();
    buf.write_u16::<NativeEndian>(field.size).unwrap();
    buf.write_u8(field.field_type as u8).unwrap();
    buf.write_u8(field.count).unwrap();
    buf
}

fn encode_schema(desc: &SchemaDescriptor) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SCHEMA_WIRE_SIZE);
    buf.write_u16::<NativeEndian>(desc.id).unwrap();
    buf.write_u16::<NativeEndian>(desc.payload_size).unwrap();
    buf.write_u16::<NativeEndian>(desc.fields.len() as u16).unwrap();
    write_fixed_str(&mut buf, &desc.name, NAME_MAX);
    write_fixed_str(&mut buf, &desc.description, DESC_MAX);

    let field_count = desc.fields.len().min(MAX_FIELDS);
    for field in &desc.fields[..field_count] {
        buf.extend_from_slice(&encode_field(field));
    }
    for _ in field_count..MAX_FIELDS {
        buf.resize(buf.len() + FIELD_WIRE_SIZE, 0);
    }
    buf
}

fn encode_enum(schema_id: u16, field_index: u16, labels: &[String]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ENUM_WIRE_SIZE);
    buf.write_u16::<NativeEndian>(schema_id).unwrap();
    buf.write_u16::<NativeEndian>(field_index).unwrap();
    let label_count = labels.len().min(ENUM_MAX_VALUES);
    buf.write_u8(label_count as u8).unwrap();
    for label in &labels[..label_count] {
        write_fixed_str(&mut buf, label, ENUM_LABEL_MAX);
    }
    for _ in label_count..ENUM_MAX_VALUES {
        buf.resize(buf.len() + ENUM_LABEL_MAX, 0);
    }
    buf
}

fn encode_bitfield(schema_id: u16, field_index: u16, bits: &[crate::schema::BitDef]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BITFIELD_WIRE_SIZE);
    buf.write_u16::<NativeEndian>(schema_id).unwrap();
    buf.write_u16::<NativeEndian>(field_index).unwrap();
    let bit_count = bits.len().min(BITFIELD_MAX_BITS);
    buf.write_u8(bit_count as u8).unwrap();
    for bit in &bits[..bit_count] {
        write_fixed_str(&mut buf, &bit.name, BIT_NAME_MAX);
    }
    for _ in bit_count..BITFIELD_MAX_BITS {
        buf.resize(buf.len() + BIT_NAME_MAX, 0);
    }
    for bit in &bits[..bit_count] {
        buf.push(bit.start_bit);
    }
    buf.resize(buf.len() + (BITFIELD_MAX_BITS - bit_count), 0);
    for bit in &bits[..bit_count] {
        buf.push(bit.width);
    }
    buf.resize(buf.len() + (BITFIELD_MAX_BITS - bit_count), 0);
    buf
}

/// One `(schema_id, field_index)` enum or bitfield field, in schema/field
/// order — the order both the buffered and streamed encoders walk in.
fn enum_sections(registry: &SchemaRegistry) -> Vec<(u16, u16, &[String])> {
    let mut out = Vec::new();
    for desc in registry.iter() {
        for (field_index, field) in desc.fields.iter().enumerate() {
            if let Some(enum_def) = &field.enum_def {
                out.push((desc.id, field_index as u16, enum_def.labels.as_slice()));
            }
        }
    }
    out
}

fn bitfield_sections(registry: &SchemaRegistry) -> Vec<(u16, u16, &[crate::schema::BitDef])> {
    let mut out = Vec::new();
    for desc in registry.iter() {
        for (field_index, field) in desc.fields.iter().enumerate() {
            if let Some(bitfield_def) = &field.bitfield_def {
                out.push((desc.id, field_index as u16, bitfield_def.bits.as_slice()));
            }
        }
    }
    out
}

/// Stateless encoder: all behaviour lives in associated functions over a
/// borrowed [`SchemaRegistry`].
pub struct SchemaCodec;

impl SchemaCodec {
    /// The exact number of bytes [`Self::serialize_into`] will write for
    /// `registry`. Call this first to size a caller-owned buffer, the way
    /// the source's `serialize(NULL, 0)` reports the required length.
    pub fn serialized_len(registry: &SchemaRegistry) -> usize {
        let enums = enum_sections(registry);
        let bitfields = bitfield_sections(registry);
        SCHEMA_HEADER_SIZE
            + registry.len() * SCHEMA_WIRE_SIZE
            + 2
            + enums.len() * ENUM_WIRE_SIZE
            + 2
            + bitfields.len() * BITFIELD_WIRE_SIZE
    }

    /// Writes the full wire stream into `buf`. Returns the number of bytes
    /// written (always [`Self::serialized_len`]). Fails if `buf` is
    /// smaller than that.
    pub fn serialize_into(registry: &SchemaRegistry, buf: &mut [u8]) -> Result<usize> {
        let needed = Self::serialized_len(registry);
        if buf.len() < needed {
            return Err(BtelemError::BufferTooSmall { got: buf.len(), min: needed });
        }

        let mut cursor = 0usize;
        let mut push = |chunk: &[u8]| {
            buf[cursor..cursor + chunk.len()].copy_from_slice(chunk);
            cursor += chunk.len();
        };

        push(&encode_header(registry.len() as u16));
        for desc in registry.iter() {
            push(&encode_schema(desc));
        }

        let enums = enum_sections(registry);
        let mut count_buf = Vec::with_capacity(2);
        count_buf.write_u16::<NativeEndian>(enums.len() as u16).unwrap();
        push(&count_buf);
        for (schema_id, field_index, labels) in &enums {
            push(&encode_enum(*schema_id, *field_index, labels));
        }

        let bitfields = bitfield_sections(registry);
        let mut bf_count_buf = Vec::with_capacity(2);
        bf_count_buf.write_u16::<NativeEndian>(bitfields.len() as u16).unwrap();
        push(&bf_count_buf);
        for (schema_id, field_index, bits) in &bitfields {
            push(&encode_bitfield(*schema_id, *field_index, bits));
        }

        Ok(needed)
    }

    /// Allocates a `Vec<u8>` of exactly the right size and serializes into
    /// it. The convenient entry point when the caller doesn't want to
    /// manage its own buffer.
    pub fn serialize_to_vec(registry: &SchemaRegistry) -> Vec<u8> {
        let mut buf = vec![0u8; Self::serialized_len(registry)];
        Self::serialize_into(registry, &mut buf).expect("buffer sized by serialized_len");
        buf
    }

    /// Emits the same byte sequence as [`Self::serialize_into`], one fixed
    /// chunk at a time: header, one schema record per call, enum count,
    /// one enum record per call, bitfield count, one bitfield record per
    /// call.
    ///
    /// `chunk` returns `true` to continue, `false` to abort — mirroring
    /// the source's "callback returning non-zero" abort signal, which here
    /// surfaces as [`BtelemError::StreamAborted`].
    ///
    /// Returns the total number of bytes that would have been emitted
    /// (equal to [`Self::serialized_len`]) on success.
    pub fn stream<F: FnMut(&[u8]) -> bool>(registry: &SchemaRegistry, mut chunk: F) -> Result<usize> {
        let mut total = 0usize;
        let mut emit = |bytes: &[u8]| -> Result<()> {
            total += bytes.len();
            if chunk(bytes) {
                Ok(())
            } else {
                Err(BtelemError::StreamAborted)
            }
        };

        emit(&encode_header(registry.len() as u16))?;
        for desc in registry.iter() {
            emit(&encode_schema(desc))?;
        }

        let enums = enum_sections(registry);
        let mut count_buf = Vec::with_capacity(2);
        count_buf.write_u16::<NativeEndian>(enums.len() as u16).unwrap();
        emit(&count_buf)?;
        for (schema_id, field_index, labels) in &enums {
            emit(&encode_enum(*schema_id, *field_index, labels))?;
        }

        let bitfields = bitfield_sections(registry);
        let mut bf_count_buf = Vec::with_capacity(2);
        bf_count_buf.write_u16::<NativeEndian>(bitfields.len() as u16).unwrap();
        emit(&bf_count_buf)?;
        for (schema_id, field_index, bits) in &bitfields {
            emit(&encode_bitfield(*schema_id, *field_index, bits))?;
        }

        Ok(total)
    }
}
