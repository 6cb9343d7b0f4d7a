//! Client table: tracks each consumer's read cursor, filter, and drop
//! accounting (spec §4.E).
//!
//! A client never touches the ring directly — [`crate::drain`] and
//! [`crate::packet`] walk the ring on a client's behalf, advancing its
//! cursor and updating `dropped` as they go.

use crate::entry::{MAX_CLIENTS, MAX_SCHEMA_ENTRIES};
use crate::error::{BtelemError, Result};

/// Which schema ids a client wants to see. The unconfigured default
/// accepts everything; an explicitly installed allow-list — even an empty
/// one — accepts only what it names (spec §4.E: "empty filter" means
/// "accept all" refers to this *default*, not to calling `accepting([])`).
#[derive(Debug, Clone)]
enum FilterState {
    AcceptAll,
    Allow([bool; MAX_SCHEMA_ENTRIES]),
}

#[derive(Debug, Clone)]
pub struct Filter {
    state: FilterState,
}

impl Filter {
    /// The default filter: accepts every schema id.
    pub fn accept_all() -> Self {
        Self { state: FilterState::AcceptAll }
    }

    /// Builds a filter that accepts only the given schema ids. Passing an
    /// empty iterator yields a filter that accepts nothing at all (distinct
    /// from [`Filter::accept_all`]).
    pub fn accepting(ids: impl IntoIterator<Item = u16>) -> Self {
        let mut accept = [false; MAX_SCHEMA_ENTRIES];
        for id in ids {
            if (id as usize) < MAX_SCHEMA_ENTRIES {
                accept[id as usize] = true;
            }
        }
        Self { state: FilterState::Allow(accept) }
    }

    /// Whether an entry with this schema `id` passes the filter.
    #[inline]
    pub fn passes(&self, id: u16) -> bool {
        match &self.state {
            FilterState::AcceptAll => true,
            FilterState::Allow(accept) => (id as usize) < MAX_SCHEMA_ENTRIES && accept[id as usize],
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::accept_all()
    }
}

/// Per-client state: where it has read to, what it wants to see, and how
/// many entries it has lost to overrun.
pub struct ClientState {
    /// Absolute ring index of the next entry this client has not yet
    /// consumed.
    pub(crate) cursor: u64,
    /// Current schema filter.
    pub(crate) filter: Filter,
    /// Cumulative count of entries this client has missed to overrun,
    /// since it opened.
    pub(crate) dropped: u64,
    /// `dropped` as of the last drain call, used to report only the delta
    /// since the previous call (spec §4.G).
    pub(crate) dropped_reported: u64,
    active: bool,
}

impl ClientState {
    fn new(cursor: u64) -> Self {
        Self {
            cursor,
            filter: Filter::accept_all(),
            dropped: 0,
            dropped_reported: 0,
            active: true,
        }
    }

    /// Cumulative entries dropped since this client opened.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Current read cursor (absolute ring index).
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

/// Fixed-capacity table of open clients, indexed by client id.
pub struct ClientTable {
    slots: Vec<Option<ClientState>>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self { slots: (0..MAX_CLIENTS).map(|_| None).collect() }
    }

    /// Opens a new client starting at ring index `start_cursor` (typically
    /// the ring's current `head()`, so the client only sees entries logged
    /// from this point on). Returns the new client's id.
    pub fn open(&mut self, start_cursor: u64) -> Result<usize> {
        let slot = self.slots.iter().position(Option::is_none);
        match slot {
            Some(id) => {
                self.slots[id] = Some(ClientState::new(start_cursor));
                Ok(id)
            }
            None => Err(BtelemError::ClientTableFull(MAX_CLIENTS)),
        }
    }

    /// Closes client `id`, freeing its slot.
    pub fn close(&mut self, id: usize) -> Result<()> {
        self.get_mut(id)?;
        self.slots[id] = None;
        Ok(())
    }

    /// Sets client `id`'s filter.
    pub fn set_filter(&mut self, id: usize, filter: Filter) -> Result<()> {
        self.get_mut(id)?.filter = filter;
        Ok(())
    }

    pub(crate) fn get(&self, id: usize) -> Result<&ClientState> {
        self.slots.get(id).and_then(Option::as_ref).ok_or(BtelemError::ClientNotOpen(id))
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Result<&mut ClientState> {
        self.slots.get_mut(id).and_then(Option::as_mut).ok_or(BtelemError::ClientNotOpen(id))
    }

    /// Whether client `id` is currently open.
    pub fn is_open(&self, id: usize) -> bool {
        self.slots.get(id).is_some_and(Option::is_some)
    }
}

impl Default for ClientTable {
    fn default() -> Self {
        Self::new()
    }
}
