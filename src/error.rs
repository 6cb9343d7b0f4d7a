//! Error types surfaced by btelem's public API.

use thiserror::Error;

/// Errors returned by btelem operations.
///
/// Overrun and torn reads are *not* represented here: they are data-plane
/// events accounted for in a client's `dropped` counter, never raised as
/// errors (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BtelemError {
    /// Ring capacity was not a power of two.
    #[error("ring capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(u32),

    /// A schema id was outside `0..MAX_SCHEMA_ENTRIES`.
    #[error("schema id {id} is out of range (max {max})")]
    SchemaIdOutOfRange {
        /// The offending id.
        id: u16,
        /// The exclusive upper bound (`MAX_SCHEMA_ENTRIES`).
        max: u16,
    },

    /// A schema's declared payload size exceeded `MAX_PAYLOAD`.
    #[error("schema payload size {size} exceeds MAX_PAYLOAD ({max})")]
    PayloadTooLarge {
        /// The declared size.
        size: u16,
        /// `MAX_PAYLOAD`.
        max: u16,
    },

    /// Schema registration was attempted after a client had already opened.
    #[error("schema registration after a client has opened is not supported")]
    LateRegistration,

    /// No free slot in the client table.
    #[error("client table is full (max {0})")]
    ClientTableFull(usize),

    /// A client id did not refer to a live client.
    #[error("client {0} is not open")]
    ClientNotOpen(usize),

    /// A buffer supplied to a drain or serialize call was too small to hold
    /// even the fixed header it requires.
    #[error("buffer of {got} bytes is smaller than the required minimum of {min} bytes")]
    BufferTooSmall {
        /// Bytes supplied.
        got: usize,
        /// Bytes required at minimum.
        min: usize,
    },

    /// A streaming emit callback requested abort.
    #[error("streaming emit aborted by callback")]
    StreamAborted,
}

/// Convenience alias for `Result<T, BtelemError>`.
pub type Result<T> = std::result::Result<T, BtelemError>;
