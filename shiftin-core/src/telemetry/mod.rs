//! Cycle statistics shared by firmware and host targets.
//!
//! [`CycleTelemetry`] watches the [`PollOutcome`]s a driver produces and keeps
//! a bounded history of per-cycle summaries. Summaries hold counts only: bit
//! values never outlive the cycle they were sampled in.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::config::RegisterLength;
use crate::driver::PollOutcome;
use crate::lines::{Micros, elapsed_since};

/// Total number of cycle summaries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Discriminated telemetry events shared across targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    CycleComplete,
    /// A driver was (re)initialized with a new length or timing.
    Configured,
    EventDropped,
    Custom(u16),
}

impl TelemetryEventKind {
    const CYCLE_COMPLETE_CODE: u16 = 0x0002;
    const CONFIGURED_CODE: u16 = 0x0010;
    const EVENT_DROPPED_CODE: u16 = 0x0020;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::CycleComplete => Self::CYCLE_COMPLETE_CODE,
            TelemetryEventKind::Configured => Self::CONFIGURED_CODE,
            TelemetryEventKind::EventDropped => Self::EVENT_DROPPED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::CYCLE_COMPLETE_CODE => TelemetryEventKind::CycleComplete,
            Self::CONFIGURED_CODE => TelemetryEventKind::Configured,
            Self::EVENT_DROPPED_CODE => TelemetryEventKind::EventDropped,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::CycleComplete => f.write_str("cycle-complete"),
            TelemetryEventKind::Configured => f.write_str("configured"),
            TelemetryEventKind::EventDropped => f.write_str("event-dropped"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Summary of one finished read cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleSummary {
    /// Monotonic cycle number, starting at zero after a reset of the recorder.
    pub sequence: u32,
    pub started_at: Micros,
    pub duration_us: Micros,
    /// Bits delivered during the cycle.
    pub bits: RegisterLength,
    /// Bits that read high.
    pub high_bits: RegisterLength,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct OpenCycle {
    started_at: Micros,
    bits: RegisterLength,
    high_bits: RegisterLength,
}

/// Records per-cycle statistics into a fixed-size ring buffer.
pub struct CycleTelemetry<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<CycleSummary, CAPACITY>,
    open: Option<OpenCycle>,
    next_sequence: u32,
    total_bits: u64,
}

impl<const CAPACITY: usize> CycleTelemetry<CAPACITY> {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            open: None,
            next_sequence: 0,
            total_bits: 0,
        }
    }

    /// Feeds one poll result. Returns the summary when a cycle closed.
    ///
    /// The first cycle-complete after initialization only opens a cycle, since
    /// nothing was sampled before it.
    pub fn observe(&mut self, outcome: &PollOutcome) -> Option<CycleSummary> {
        let step = outcome.step()?;

        if let Some(sample) = step.sample {
            self.total_bits = self.total_bits.wrapping_add(1);
            if let Some(open) = self.open.as_mut() {
                open.bits = open.bits.saturating_add(1);
                if sample.level.is_high() {
                    open.high_bits = open.high_bits.saturating_add(1);
                }
            }
        }

        if !step.cycle_complete {
            return None;
        }

        let closed = self.open.replace(OpenCycle {
            started_at: step.at,
            bits: 0,
            high_bits: 0,
        })?;

        let summary = CycleSummary {
            sequence: self.next_sequence,
            started_at: closed.started_at,
            duration_us: elapsed_since(closed.started_at, step.at),
            bits: closed.bits,
            high_bits: closed.high_bits,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.ring.write(summary);
        Some(summary)
    }

    /// Drops the in-progress cycle, e.g. after the driver's length changed.
    pub fn discard_open_cycle(&mut self) {
        self.open = None;
    }

    /// Returns an iterator over the summaries in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, CycleSummary> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent summary, if available.
    pub fn latest(&self) -> Option<&CycleSummary> {
        self.ring.recent()
    }

    /// Returns the number of summaries currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no summaries are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of cycles completed since creation.
    pub const fn cycles_completed(&self) -> u32 {
        self.next_sequence
    }

    /// Number of bits observed since creation.
    pub const fn total_bits(&self) -> u64 {
        self.total_bits
    }
}

impl<const CAPACITY: usize> Default for CycleTelemetry<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleState;
    use crate::driver::{BitSample, Step};
    use crate::lines::Level;

    fn complete(at: Micros) -> PollOutcome {
        PollOutcome::Advanced(Step {
            state: CycleState::Res1,
            at,
            sample: None,
            cycle_complete: true,
        })
    }

    fn bit(at: Micros, index: RegisterLength, high: bool) -> PollOutcome {
        PollOutcome::Advanced(Step {
            state: CycleState::ReadSample,
            at,
            sample: Some(BitSample::new(index, Level::from_bool(high))),
            cycle_complete: false,
        })
    }

    #[test]
    fn first_cycle_complete_only_opens_a_cycle() {
        let mut telemetry: CycleTelemetry<4> = CycleTelemetry::new();
        assert_eq!(telemetry.observe(&complete(10)), None);
        assert!(telemetry.is_empty());
        assert_eq!(telemetry.observe(&PollOutcome::Waiting), None);
    }

    #[test]
    fn closed_cycles_report_counts_and_duration() {
        let mut telemetry: CycleTelemetry<4> = CycleTelemetry::new();
        telemetry.observe(&complete(100));
        telemetry.observe(&bit(400, 0, true));
        telemetry.observe(&bit(550, 1, false));
        telemetry.observe(&bit(700, 2, true));

        let summary = telemetry.observe(&complete(900)).expect("cycle closed");
        assert_eq!(summary.sequence, 0);
        assert_eq!(summary.started_at, 100);
        assert_eq!(summary.duration_us, 800);
        assert_eq!(summary.bits, 3);
        assert_eq!(summary.high_bits, 2);
        assert_eq!(telemetry.latest(), Some(&summary));
        assert_eq!(telemetry.total_bits(), 3);
    }

    #[test]
    fn ring_keeps_latest_summaries() {
        let mut telemetry: CycleTelemetry<2> = CycleTelemetry::new();
        telemetry.observe(&complete(0));
        for cycle in 1..=3u32 {
            telemetry.observe(&bit(cycle * 100 - 50, 0, false));
            telemetry.observe(&complete(cycle * 100));
        }

        assert_eq!(telemetry.len(), 2);
        assert_eq!(telemetry.cycles_completed(), 3);
        let sequences: heapless::Vec<u32, 2> = telemetry
            .oldest_first()
            .map(|summary| summary.sequence)
            .collect();
        assert_eq!(sequences.as_slice(), &[1, 2]);
    }

    #[test]
    fn discarding_drops_partial_counts() {
        let mut telemetry: CycleTelemetry<4> = CycleTelemetry::new();
        telemetry.observe(&complete(0));
        telemetry.observe(&bit(50, 0, true));
        telemetry.discard_open_cycle();
        assert_eq!(telemetry.observe(&complete(100)), None);
        telemetry.observe(&bit(150, 0, false));
        let summary = telemetry.observe(&complete(200)).expect("cycle closed");
        assert_eq!(summary.bits, 1);
        assert_eq!(summary.high_bits, 0);
    }

    #[test]
    fn raw_codes_round_trip() {
        for kind in [
            TelemetryEventKind::CycleComplete,
            TelemetryEventKind::Configured,
            TelemetryEventKind::EventDropped,
            TelemetryEventKind::Custom(0x7777),
        ] {
            assert_eq!(TelemetryEventKind::from_raw(kind.to_raw()), kind);
        }
    }
}
