#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Occupancy tracking and logging helpers.
//!
//! [`OccupancyTracker`] rebuilds per-cycle occupancy from the bus events the
//! reporter receives and reports when it differs from the previous cycle. The
//! `log_*` helpers mirror cycle summaries and occupancy changes to defmt on
//! target and stdout on host builds.

use heapless::Vec;
use shiftin_core::config::{ConfigError, RegisterLength, Timing};
use shiftin_core::lines::Micros;
use shiftin_core::telemetry::{CycleSummary, TelemetryEventKind};

use crate::bus::{BUS_LENGTH, BusEvent};

const WORD_BITS: usize = 32;

/// Words needed to hold one bit per contact.
pub const OCCUPANCY_WORDS: usize = (BUS_LENGTH as usize).div_ceil(WORD_BITS);

/// One bit per contact, contact `n` in bit `n % 32` of word `n / 32`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OccupancyMap {
    words: Vec<u32, OCCUPANCY_WORDS>,
}

impl OccupancyMap {
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Marks `index` occupied. Indices past the map are ignored.
    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        while self.words.len() <= word {
            if self.words.push(0).is_err() {
                return;
            }
        }
        self.words[word] |= 1 << (index % WORD_BITS);
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0)
    }

    pub fn occupied(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// First 32 contacts as a single word.
    pub fn low_word(&self) -> u32 {
        self.words.first().copied().unwrap_or(0)
    }

    fn clear(&mut self) {
        self.words.clear();
    }

    fn same_as(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|index| {
            self.words.get(index).copied().unwrap_or(0) == other.words.get(index).copied().unwrap_or(0)
        })
    }
}

/// Emitted when a cycle's occupancy differs from the one before it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OccupancyChange {
    pub at: Micros,
    pub bits: u16,
    pub occupancy: OccupancyMap,
}

/// Folds bus events into per-cycle occupancy maps.
pub struct OccupancyTracker {
    current: OccupancyMap,
    previous: Option<OccupancyMap>,
    bits: u16,
    /// Set after a lost event; bits are ignored until the next cycle boundary.
    resyncing: bool,
}

impl OccupancyTracker {
    pub const fn new() -> Self {
        Self {
            current: OccupancyMap::new(),
            previous: None,
            bits: 0,
            resyncing: false,
        }
    }

    /// Feeds one event; returns the new occupancy when a cycle closed with a change.
    pub fn observe(&mut self, event: BusEvent) -> Option<OccupancyChange> {
        match event {
            BusEvent::Gap => {
                self.resync();
                None
            }
            BusEvent::Bit(_) if self.resyncing => None,
            BusEvent::Bit(sample) => {
                self.bits = self.bits.saturating_add(1);
                if sample.level.is_high() {
                    self.current.set(usize::from(sample.index));
                }
                None
            }
            BusEvent::CycleComplete { at } => {
                let bits = core::mem::replace(&mut self.bits, 0);
                let occupancy = core::mem::take(&mut self.current);
                if core::mem::replace(&mut self.resyncing, false) {
                    return None;
                }
                if bits == 0 {
                    // Nothing was sampled since the driver started or restarted.
                    return None;
                }

                let changed = self
                    .previous
                    .as_ref()
                    .is_none_or(|previous| !previous.same_as(&occupancy));
                self.previous = Some(occupancy.clone());
                changed.then_some(OccupancyChange {
                    at,
                    bits,
                    occupancy,
                })
            }
        }
    }

    /// Drops the partial cycle, e.g. after an event was lost. Nothing is
    /// reported until a whole cycle has been seen again.
    pub fn resync(&mut self) {
        self.current.clear();
        self.bits = 0;
        self.resyncing = true;
    }
}

impl Default for OccupancyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs a closed cycle summary.
pub fn log_cycle_summary(summary: &CycleSummary) {
    emit_cycle_log(
        TelemetryEventKind::CycleComplete,
        summary.sequence,
        summary.bits,
        summary.high_bits,
        summary.duration_us,
    );
}

/// Logs an occupancy change.
pub fn log_occupancy_change(change: &OccupancyChange) {
    emit_occupancy_log(
        change.at,
        change.bits,
        change.occupancy.occupied(),
        change.occupancy.low_word(),
    );
}

#[cfg(target_os = "none")]
fn emit_cycle_log(kind: TelemetryEventKind, sequence: u32, bits: u16, high: u16, duration_us: u32) {
    defmt::info!(
        "bus:cycle kind={=u16:#x} seq={} bits={} high={} took={}us",
        kind.to_raw(),
        sequence,
        bits,
        high,
        duration_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_cycle_log(kind: TelemetryEventKind, sequence: u32, bits: u16, high: u16, duration_us: u32) {
    println!("bus:cycle {kind} seq={sequence} bits={bits} high={high} took={duration_us}us");
}

#[cfg(target_os = "none")]
fn emit_occupancy_log(at: Micros, bits: u16, occupied: u32, low_word: u32) {
    defmt::info!(
        "bus:occupancy t={}us bits={} occupied={} low={=u32:#010x}",
        at,
        bits,
        occupied,
        low_word
    );
}

#[cfg(not(target_os = "none"))]
fn emit_occupancy_log(at: Micros, bits: u16, occupied: u32, low_word: u32) {
    println!("bus:occupancy t={at}us bits={bits} occupied={occupied} low={low_word:#010x}");
}

#[cfg(target_os = "none")]
pub fn log_dropped_events(total: u32) {
    defmt::warn!(
        "bus:{=u16:#x} event channel overflowed, {} events dropped so far",
        TelemetryEventKind::EventDropped.to_raw(),
        total
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_dropped_events(total: u32) {
    println!(
        "bus:{} event channel overflowed, {total} events dropped so far",
        TelemetryEventKind::EventDropped
    );
}

#[cfg(target_os = "none")]
pub fn log_bus_configured(length: RegisterLength, timing: &Timing) {
    defmt::info!(
        "bus:{=u16:#x} length={} clock={}us reset={}us",
        TelemetryEventKind::Configured.to_raw(),
        length,
        timing.clock_period,
        timing.reset_period
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_bus_configured(length: RegisterLength, timing: &Timing) {
    println!(
        "bus:{} length={length} clock={}us reset={}us",
        TelemetryEventKind::Configured,
        timing.clock_period,
        timing.reset_period
    );
}

#[cfg(target_os = "none")]
pub fn log_config_rejected(error: &ConfigError) {
    defmt::error!("bus: configuration rejected: {}", defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn log_config_rejected(error: &ConfigError) {
    println!("bus: configuration rejected: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftin_core::driver::BitSample;
    use shiftin_core::lines::Level;

    fn bit(index: u16, high: bool) -> BusEvent {
        BusEvent::Bit(BitSample::new(index, Level::from_bool(high)))
    }

    #[test]
    fn first_completion_without_bits_reports_nothing() {
        let mut tracker = OccupancyTracker::new();
        assert_eq!(tracker.observe(BusEvent::CycleComplete { at: 0 }), None);
    }

    #[test]
    fn reports_only_when_occupancy_changes() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(BusEvent::CycleComplete { at: 0 });

        for index in 0..4 {
            tracker.observe(bit(index, index == 2));
        }
        let change = tracker
            .observe(BusEvent::CycleComplete { at: 500 })
            .expect("first full cycle reports");
        assert_eq!(change.bits, 4);
        assert!(change.occupancy.is_set(2));
        assert_eq!(change.occupancy.low_word(), 0b100);

        for index in 0..4 {
            tracker.observe(bit(index, index == 2));
        }
        assert_eq!(tracker.observe(BusEvent::CycleComplete { at: 1_000 }), None);

        for index in 0..4 {
            tracker.observe(bit(index, false));
        }
        let cleared = tracker
            .observe(BusEvent::CycleComplete { at: 1_500 })
            .expect("vacated contact reports");
        assert_eq!(cleared.occupancy.occupied(), 0);
    }

    #[test]
    fn map_ignores_indices_past_capacity() {
        let mut map = OccupancyMap::new();
        map.set(OCCUPANCY_WORDS * WORD_BITS + 3);
        map.set(31);
        assert_eq!(map.occupied(), 1);
        assert_eq!(map.low_word(), 1 << 31);
    }

    #[test]
    fn resync_discards_partial_cycle() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(bit(0, true));
        tracker.resync();
        assert_eq!(tracker.observe(BusEvent::CycleComplete { at: 10 }), None);
    }

    #[test]
    fn board_configuration_is_loggable() {
        let timing = crate::bus::bus_config()
            .validate()
            .expect("board configuration is valid");
        assert_eq!(TelemetryEventKind::Configured.to_raw(), 0x0010);
        log_bus_configured(BUS_LENGTH, &timing);
    }

    #[test]
    fn bits_after_resync_do_not_report_vacated_contacts() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(BusEvent::CycleComplete { at: 0 });
        for index in 0..32 {
            tracker.observe(bit(index, index < 4));
        }
        let first = tracker
            .observe(BusEvent::CycleComplete { at: 1_000 })
            .expect("first full cycle reports");
        assert_eq!(first.occupancy.occupied(), 4);

        // Events 0..21 of the next cycle were lost.
        tracker.observe(BusEvent::Gap);
        for index in 21..32 {
            tracker.observe(bit(index, false));
        }
        assert_eq!(tracker.observe(BusEvent::CycleComplete { at: 2_000 }), None);

        // A whole cycle with the same contacts is not a change.
        for index in 0..32 {
            tracker.observe(bit(index, index < 4));
        }
        assert_eq!(tracker.observe(BusEvent::CycleComplete { at: 3_000 }), None);

        for index in 0..32 {
            tracker.observe(bit(index, index == 0));
        }
        let change = tracker
            .observe(BusEvent::CycleComplete { at: 4_000 })
            .expect("vacated contacts report after resync");
        assert_eq!(change.bits, 32);
        assert_eq!(change.occupancy.low_word(), 1);
    }
}
