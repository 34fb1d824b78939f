#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track bus progress and the latest occupancy word so
//! any task can read a consistent-enough [`BusCounters`] without touching the
//! driver.

use portable_atomic::{AtomicU32, Ordering};
use shiftin_core::lines::Micros;
use shiftin_core::telemetry::CycleSummary;

static BITS_SAMPLED: AtomicU32 = AtomicU32::new(0);
static CYCLES_COMPLETED: AtomicU32 = AtomicU32::new(0);
static DROPPED_EVENTS: AtomicU32 = AtomicU32::new(0);
/// Duration of the last closed cycle (µs, +1; 0 == none yet).
static LAST_CYCLE_MICROS: AtomicU32 = AtomicU32::new(0);
/// First 32 contacts of the last reported cycle (bit n == contact n occupied).
static OCCUPANCY_LOW_WORD: AtomicU32 = AtomicU32::new(0);

/// Point-in-time copy of the status counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusCounters {
    pub bits_sampled: u32,
    pub cycles_completed: u32,
    pub dropped_events: u32,
    pub last_cycle_us: Option<Micros>,
    pub occupancy_low_word: u32,
}

fn encode_micros(micros: Micros) -> u32 {
    micros.saturating_add(1)
}

fn decode_micros(raw: u32) -> Option<Micros> {
    raw.checked_sub(1)
}

/// Records a closed read cycle.
pub fn record_cycle(summary: &CycleSummary) {
    CYCLES_COMPLETED.fetch_add(1, Ordering::Relaxed);
    BITS_SAMPLED.fetch_add(u32::from(summary.bits), Ordering::Relaxed);
    LAST_CYCLE_MICROS.store(encode_micros(summary.duration_us), Ordering::Relaxed);
}

/// Records that the event channel was full.
pub fn record_dropped_event() {
    DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
}

/// Publishes the occupancy of the first 32 contacts.
pub fn record_occupancy(low_word: u32) {
    OCCUPANCY_LOW_WORD.store(low_word, Ordering::Relaxed);
}

/// Builds a [`BusCounters`] from the stored values.
pub fn counters() -> BusCounters {
    BusCounters {
        bits_sampled: BITS_SAMPLED.load(Ordering::Relaxed),
        cycles_completed: CYCLES_COMPLETED.load(Ordering::Relaxed),
        dropped_events: DROPPED_EVENTS.load(Ordering::Relaxed),
        last_cycle_us: decode_micros(LAST_CYCLE_MICROS.load(Ordering::Relaxed)),
        occupancy_low_word: OCCUPANCY_LOW_WORD.load(Ordering::Relaxed),
    }
}
