//! Schema registry: describes the shape of each payload type to decoders
//! (spec §4.C, component C).
//!
//! Schemas are ordinary values the producer builds once at startup — the
//! Rust equivalent of the source's macro-assembled `static const` schema
//! entries — stored in an owning array indexed by id, where an unregistered
//! id is simply `None`.

use crate::entry::{
    BITFIELD_MAX_BITS, DESC_MAX, ENUM_MAX_VALUES, MAX_FIELDS, MAX_PAYLOAD, MAX_SCHEMA_ENTRIES,
    NAME_MAX,
};
use crate::error::{BtelemError, Result};

/// Wire type tag for a field's primitive representation (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    U8 = 0,
    U16 = 1,
    U32 = 2,
    U64 = 3,
    I8 = 4,
    I16 = 5,
    I32 = 6,
    I64 = 7,
    F32 = 8,
    F64 = 9,
    Bool = 10,
    Bytes = 11,
    Enum = 12,
    Bitfield = 13,
}

/// A single named bit (or bit group) within a bitfield field, LSB-based.
#[derive(Debug, Clone)]
pub struct BitDef {
    /// Bit name.
    pub name: String,
    /// 0-based start bit.
    pub start_bit: u8,
    /// Width in bits (1 for a flag, >1 for a group).
    pub width: u8,
}

/// Bit layout for a [`FieldType::Bitfield`] field.
#[derive(Debug, Clone, Default)]
pub struct BitFieldDef {
    pub bits: Vec<BitDef>,
}

/// Ordered label table for a [`FieldType::Enum`] field, indexed by value.
#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    pub labels: Vec<String>,
}

/// A single field within a schema's payload.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Byte offset within the payload.
    pub offset: u16,
    /// Byte size of one element.
    pub size: u16,
    /// Primitive type tag.
    pub field_type: FieldType,
    /// Element count: 1 for a scalar, >1 for an array.
    pub count: u8,
    /// Present iff `field_type == Enum`.
    pub enum_def: Option<EnumDef>,
    /// Present iff `field_type == Bitfield`.
    pub bitfield_def: Option<BitFieldDef>,
}

impl FieldDef {
    /// A plain scalar or array field (no enum/bitfield metadata).
    pub fn scalar(name: impl Into<String>, offset: u16, size: u16, field_type: FieldType, count: u8) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            field_type,
            count,
            enum_def: None,
            bitfield_def: None,
        }
    }

    /// An enum-labelled field.
    pub fn enum_field(name: impl Into<String>, offset: u16, size: u16, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            field_type: FieldType::Enum,
            count: 1,
            enum_def: Some(EnumDef { labels }),
            bitfield_def: None,
        }
    }

    /// A bitfield-layout field.
    pub fn bitfield_field(name: impl Into<String>, offset: u16, size: u16, bits: Vec<BitDef>) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            field_type: FieldType::Bitfield,
            count: 1,
            enum_def: None,
            bitfield_def: Some(BitFieldDef { bits }),
        }
    }
}

/// A complete schema descriptor for one schema id.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    /// Numeric id, < `MAX_SCHEMA_ENTRIES`.
    pub id: u16,
    /// Short name.
    pub name: String,
    /// Longer description.
    pub description: String,
    /// Declared payload size in bytes, ≤ `MAX_PAYLOAD`.
    pub payload_size: u16,
    /// Ordered field list.
    pub fields: Vec<FieldDef>,
}

impl SchemaDescriptor {
    /// Convenience constructor deriving `payload_size` from `T`.
    pub fn for_type<T>(id: u16, name: impl Into<String>, description: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            payload_size: std::mem::size_of::<T>() as u16,
            fields,
        }
    }
}

/// Maps schema id to descriptor. Registration is one-shot per id: a slot
/// with no descriptor means "unregistered" (spec §4.C).
pub struct SchemaRegistry {
    schemas: Vec<Option<SchemaDescriptor>>,
    /// Highest registered id + 1, matching the source's `schema_count`
    /// high-water mark used to bound the serialize scan.
    count_hint: usize,
    sealed: bool,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            schemas: (0..MAX_SCHEMA_ENTRIES).map(|_| None).collect(),
            count_hint: 0,
            sealed: false,
        }
    }

    /// Registers (or overwrites) the descriptor for `descriptor.id`.
    ///
    /// Fails if the id is out of range, the declared payload exceeds
    /// `MAX_PAYLOAD`, or a client has already been opened against this
    /// registry (spec's "open question": late registration is rejected).
    pub fn register(&mut self, descriptor: SchemaDescriptor) -> Result<()> {
        if self.sealed {
            return Err(BtelemError::LateRegistration);
        }
        if descriptor.id as usize >= MAX_SCHEMA_ENTRIES {
            return Err(BtelemError::SchemaIdOutOfRange {
                id: descriptor.id,
                max: MAX_SCHEMA_ENTRIES as u16,
            });
        }
        if descriptor.payload_size as usize > MAX_PAYLOAD {
            return Err(BtelemError::PayloadTooLarge {
                size: descriptor.payload_size,
                max: MAX_PAYLOAD as u16,
            });
        }
        let id = descriptor.id as usize;
        if id >= self.count_hint {
            self.count_hint = id + 1;
        }
        self.schemas[id] = Some(descriptor);
        Ok(())
    }

    /// Prevents any further registration. Called when the first client
    /// opens.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Looks up the descriptor for `id`, if registered.
    pub fn get(&self, id: u16) -> Option<&SchemaDescriptor> {
        self.schemas.get(id as usize).and_then(Option::as_ref)
    }

    /// Iterates registered descriptors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.schemas[..self.count_hint].iter().filter_map(Option::as_ref)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(MAX_FIELDS <= 255, "field_count must fit a wire count byte budget");
const _: () = assert!(NAME_MAX > 0 && DESC_MAX > 0);
const _: () = assert!(ENUM_MAX_VALUES > 0 && BITFIELD_MAX_BITS > 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_out_of_range_id_fails() {
        let mut reg = SchemaRegistry::new();
        let d = SchemaDescriptor::for_type::<u32>(MAX_SCHEMA_ENTRIES as u16, "x", "", vec![]);
        assert!(matches!(
            reg.register(d),
            Err(BtelemError::SchemaIdOutOfRange { .. })
        ));
    }

    #[test]
    fn register_oversized_payload_fails() {
        let mut reg = SchemaRegistry::new();
        let mut d = SchemaDescriptor::for_type::<u32>(0, "x", "", vec![]);
        d.payload_size = (MAX_PAYLOAD + 1) as u16;
        assert!(matches!(reg.register(d), Err(BtelemError::PayloadTooLarge { .. })));
    }

    #[test]
    fn register_after_seal_fails() {
        let mut reg = SchemaRegistry::new();
        reg.seal();
        let d = SchemaDescriptor::for_type::<u32>(0, "x", "", vec![]);
        assert!(matches!(reg.register(d), Err(BtelemError::LateRegistration)));
    }

    #[test]
    fn later_registration_overwrites_same_id() {
        let mut reg = SchemaRegistry::new();
        reg.register(SchemaDescriptor::for_type::<u32>(0, "first", "", vec![])).unwrap();
        reg.register(SchemaDescriptor::for_type::<u32>(0, "second", "", vec![])).unwrap();
        assert_eq!(reg.get(0).unwrap().name, "second");
        assert_eq!(reg.len(), 1);
    }
}
