//! Construction-time configuration for a [`crate::context::Context`].
//!
//! Mirrors the teacher's `Config::new(ring_bits, max_producers,
//! enable_metrics)` pattern, narrowed to what spec.md's CORE actually takes
//! as a runtime parameter: ring capacity. Everything else spec.md §6 lists
//! (`MAX_PAYLOAD`, `MAX_CLIENTS`, …) is a compile-time constant in
//! [`crate::entry`], not something a caller configures per instance — a
//! decoder is compatible with a producer iff its own constants are greater
//! than or equal to the producer's (spec §6).

use crate::error::{BtelemError, Result};

/// Ring capacity plus nothing else: spec.md's CORE has exactly one runtime
/// knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Ring buffer slot count. Must be a nonzero power of two.
    pub ring_capacity: u32,
}

impl Config {
    /// Validates `ring_capacity` and builds a `Config`.
    pub fn new(ring_capacity: u32) -> Result<Self> {
        if ring_capacity == 0 || !ring_capacity.is_power_of_two() {
            return Err(BtelemError::CapacityNotPowerOfTwo(ring_capacity));
        }
        Ok(Self { ring_capacity })
    }

    /// Builds a `Config` from a known-valid power-of-two capacity, for use
    /// in `const` contexts (the preset configs below). Panics at compile
    /// time if `ring_capacity` isn't a nonzero power of two.
    const fn new_unchecked(ring_capacity: u32) -> Self {
        assert!(ring_capacity != 0 && ring_capacity.is_power_of_two());
        Self { ring_capacity }
    }
}

impl Default for Config {
    /// 64K slots — the same default the teacher's `Config` uses
    /// (`ring_bits: 16`).
    fn default() -> Self {
        Self::new_unchecked(1 << 16)
    }
}

/// Small ring favoring cache residency over headroom (4096 slots).
pub const LOW_LATENCY_CONFIG: Config = Config::new_unchecked(1 << 12);

/// Large ring favoring headroom against slow consumers (256K slots).
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new_unchecked(1 << 18);
