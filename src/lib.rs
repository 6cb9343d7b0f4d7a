//! btelem — a lock-free multi-producer / multi-consumer telemetry ring.
//!
//! Any number of producer threads log fixed-size typed records at bounded
//! latency; any number of passive consumers scan the same ring without
//! blocking producers. Consumers tolerate being overrun: lost entries are
//! counted, never fabricated, and torn reads are always detected.
//!
//! The hard engineering lives in two protocols, both lock-free:
//!
//! - The ring: a single monotonic `head` counter allocates slots; a
//!   per-slot sequence number is the commit flag producers publish and
//!   consumers check (release/acquire, no CAS loop, no producer ever
//!   blocks).
//! - Draining: each consumer ([`Filter`]-equipped client) keeps its own
//!   cursor and drop counter; draining walks the ring from that cursor
//!   either one entry at a time via callback ([`Context::drain`]), or
//!   packed into a single transport-ready byte buffer
//!   ([`Context::drain_packed`], see [`PacketHeader`] / [`EntryHeader`]).
//!
//! [`SchemaRegistry`] and [`SchemaCodec`] describe the shape of logged
//! payloads to out-of-process decoders. [`IndexFooter`] / [`IndexEntry`]
//! define (but do not read or write) the fixed-size footer/index records a
//! persistence layer built on top of this crate would need.
//!
//! Everything here is synchronous and in-process: no sockets, no
//! filesystem, no threads spawned. [`Context`] is the one object most
//! callers need — it wires the ring, registry, and client table together
//! behind a cheaply-`Clone`-able handle.
//!
//! # Example
//!
//! ```
//! use btelem::{Config, Context};
//!
//! let ctx = Context::new(Config::new(16).unwrap()).unwrap();
//! let client = ctx.open_client().unwrap();
//!
//! ctx.log(0u16, 42u32, 1 /* timestamp */);
//!
//! let mut seen = Vec::new();
//! ctx.drain(client, |entry| {
//!     seen.push(u32::from_le_bytes(entry.payload[..4].try_into().unwrap()));
//!     true
//! })
//! .unwrap();
//! assert_eq!(seen, vec![42]);
//! ```

mod client;
mod config;
mod context;
mod drain;
mod entry;
mod error;
mod file;
mod invariants;
mod packet;
mod ring;
mod schema;
mod wire;

pub use client::Filter;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use context::Context;
pub use entry::{
    Entry, BITFIELD_MAX_BITS, BIT_NAME_MAX, DESC_MAX, ENUM_LABEL_MAX, ENUM_MAX_VALUES, MAX_CLIENTS,
    MAX_FIELDS, MAX_PAYLOAD, MAX_SCHEMA_ENTRIES, NAME_MAX,
};
pub use error::{BtelemError, Result};
pub use file::{IndexEntry, IndexFooter, FOOTER_MAGIC, FOOTER_SIZE, INDEX_ENTRY_SIZE};
pub use packet::{decode_entry_header, decode_packet_header, EntryHeader, PacketHeader, ENTRY_HEADER_SIZE, PACKET_HEADER_SIZE};
pub use schema::{BitDef, BitFieldDef, EnumDef, FieldDef, FieldType, SchemaDescriptor, SchemaRegistry};
pub use wire::SchemaCodec;
