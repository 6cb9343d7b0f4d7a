//! `Context`: the crate's main entry point, wiring the ring, schema
//! registry, and client table together (spec §2, §3 "Lifecycle").
//!
//! Grounded on the teacher's `Channel<T>` (`src/channel.rs`): one owning
//! struct behind an `Arc`, cheaply cloned handles for producers, and a
//! single place that enforces the cross-component rules spec.md leaves to
//! "the context" — most importantly, sealing the schema registry the
//! moment the first client opens (spec §4.C, §9 "late schema registration").

use std::sync::Arc;

use crate::client::{ClientTable, Filter};
use crate::config::Config;
use crate::drain;
use crate::entry::Entry;
use crate::error::Result;
use crate::packet::{self, PacketHeader};
use crate::ring::Ring;
use crate::schema::{SchemaDescriptor, SchemaRegistry};
use crate::wire::SchemaCodec;

struct Inner {
    ring: Ring,
    registry: std::sync::RwLock<SchemaRegistry>,
    clients: std::sync::Mutex<ClientTable>,
}

/// The top-level btelem object: one ring, one schema registry, one client
/// table. Construct once, share via `clone()` (cheap: an `Arc` bump) across
/// producer and consumer threads.
///
/// Schemas must be registered before the first [`Context::open_client`]
/// call; registering afterwards returns [`crate::error::BtelemError::LateRegistration`]
/// (spec §9, Open Question resolved in DESIGN.md).
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Builds a new, empty context: no schemas registered, no clients open.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                ring: Ring::new(config.ring_capacity)?,
                registry: std::sync::RwLock::new(SchemaRegistry::new()),
                clients: std::sync::Mutex::new(ClientTable::new()),
            }),
        })
    }

    /// Registers `descriptor`. Fails if any client has already opened
    /// against this context (spec §9).
    pub fn register_schema(&self, descriptor: SchemaDescriptor) -> Result<()> {
        self.inner.registry.write().unwrap().register(descriptor)
    }

    /// Logs a record of payload type `T` under schema `id`, at `timestamp`
    /// (nanoseconds, monotonic clock — the caller supplies it so the core
    /// stays free of a clock dependency). Never blocks (spec §4.A).
    ///
    /// Returns the absolute slot index the record committed to.
    #[inline]
    pub fn log<T: Copy>(&self, id: u16, payload: T, timestamp: u64) -> u64 {
        self.inner.ring.log(id, payload, timestamp)
    }

    /// The ring's current head (the absolute index the next `log` call will
    /// claim).
    pub fn head(&self) -> u64 {
        self.inner.ring.head()
    }

    /// Opens a new client starting at the ring's current head — it only
    /// sees entries logged from this point on (spec §4.E). Seals the
    /// schema registry against further registration as a side effect.
    pub fn open_client(&self) -> Result<usize> {
        self.inner.registry.write().unwrap().seal();
        let start = self.inner.ring.head();
        self.inner.clients.lock().unwrap().open(start)
    }

    /// Closes `client_id`, freeing its slot for reuse. The caller is
    /// responsible for not racing this against an in-flight drain on the
    /// same client (spec §4.E).
    pub fn close_client(&self, client_id: usize) -> Result<()> {
        self.inner.clients.lock().unwrap().close(client_id)
    }

    /// Replaces `client_id`'s filter.
    pub fn set_filter(&self, client_id: usize, filter: Filter) -> Result<()> {
        self.inner.clients.lock().unwrap().set_filter(client_id, filter)
    }

    /// Entries available to `client_id` without draining, and the overrun
    /// this client would be charged if it drained right now — computed
    /// without mutating any state (spec §4.E).
    pub fn available(&self, client_id: usize) -> Result<(u64, u64)> {
        let clients = self.inner.clients.lock().unwrap();
        let client = clients.get(client_id)?;
        let head = self.inner.ring.head();
        let capacity = self.inner.ring.capacity() as u64;

        let oldest = head.saturating_sub(capacity);
        let implied_dropped = oldest.saturating_sub(client.cursor());
        let effective_cursor = client.cursor().max(oldest);
        let available = head.saturating_sub(effective_cursor);
        Ok((available, implied_dropped))
    }

    /// Callback drain for `client_id` (spec §4.F). `callback` returns
    /// `true` to keep draining, `false` to stop after the entry it was just
    /// given. Returns the number of entries delivered to `callback`.
    pub fn drain<F: FnMut(&Entry) -> bool>(&self, client_id: usize, callback: F) -> Result<usize> {
        let mut clients = self.inner.clients.lock().unwrap();
        let client = clients.get_mut(client_id)?;
        Ok(drain::drain(&self.inner.ring, client, callback))
    }

    /// Packed batch drain for `client_id` into `buf` (spec §4.G). Returns
    /// the number of meaningful bytes written at the front of `buf`.
    pub fn drain_packed(&self, client_id: usize, buf: &mut [u8]) -> Result<usize> {
        let mut clients = self.inner.clients.lock().unwrap();
        let client = clients.get_mut(client_id)?;
        packet::drain_packed(&self.inner.ring, client, buf)
    }

    /// Decodes a packed batch's 16-byte header — a thin convenience so
    /// callers don't need to import [`crate::packet`] directly.
    pub fn decode_packet_header(buf: &[u8]) -> Result<PacketHeader> {
        packet::decode_packet_header(buf)
    }

    /// The number of bytes [`Context::serialize_schema`] would write for the
    /// currently registered schemas.
    pub fn schema_wire_len(&self) -> usize {
        SchemaCodec::serialized_len(&self.inner.registry.read().unwrap())
    }

    /// Buffered schema wire serialization (spec §4.D).
    pub fn serialize_schema(&self, buf: &mut [u8]) -> Result<usize> {
        SchemaCodec::serialize_into(&self.inner.registry.read().unwrap(), buf)
    }

    /// Streaming schema wire emission, one fixed chunk per `chunk` call
    /// (spec §4.D). Used on the wire so a server never needs to hold the
    /// full (potentially >1 MiB) buffered form in one contiguous
    /// allocation.
    pub fn stream_schema<F: FnMut(&[u8]) -> bool>(&self, chunk: F) -> Result<usize> {
        SchemaCodec::stream(&self.inner.registry.read().unwrap(), chunk)
    }
}
