//! Protocol state set and its three lookup tables.
//!
//! The read cycle is a fixed ring of ten states. Each state has a successor
//! (with one data-dependent branch at [`CycleState::ReadSample`]), a set of
//! line writes applied on entry, and a gate duration that must elapse before
//! the next transition. Everything here is pure data; the driver applies it.

use core::fmt;

use crate::config::{RegisterLength, Timing};
use crate::lines::{Level, LineRole, Micros};

/// Current position in the read cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CycleState {
    /// Clock low, load high.
    Res1,
    /// Clock high: parallel inputs latch into the chain.
    Res2,
    Res3,
    /// Reset pulse high.
    Res4,
    /// Reset pulse low.
    Res5,
    /// Load released.
    Res6,
    /// First bit sampled straight after the parallel load.
    Res6Sample,
    ReadHigh,
    ReadLow,
    ReadSample,
}

/// Every state, in cycle order starting at the reset sub-cycle.
pub const ALL_STATES: [CycleState; 10] = [
    CycleState::Res1,
    CycleState::Res2,
    CycleState::Res3,
    CycleState::Res4,
    CycleState::Res5,
    CycleState::Res6,
    CycleState::Res6Sample,
    CycleState::ReadHigh,
    CycleState::ReadLow,
    CycleState::ReadSample,
];

/// Line write applied when entering a state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineAction {
    pub role: LineRole,
    pub level: Level,
}

impl LineAction {
    pub const fn new(role: LineRole, level: Level) -> Self {
        Self { role, level }
    }
}

const CLOCK_HIGH: LineAction = LineAction::new(LineRole::Clock, Level::High);
const CLOCK_LOW: LineAction = LineAction::new(LineRole::Clock, Level::Low);
const LOAD_HIGH: LineAction = LineAction::new(LineRole::Load, Level::High);
const LOAD_LOW: LineAction = LineAction::new(LineRole::Load, Level::Low);
const RESET_HIGH: LineAction = LineAction::new(LineRole::Reset, Level::High);
const RESET_LOW: LineAction = LineAction::new(LineRole::Reset, Level::Low);

/// Result of looking up a successor state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub next: CycleState,
    /// `true` when the bit counter restarts at zero.
    pub restart_count: bool,
}

impl CycleState {
    /// Successor of `self` given the bit counter.
    #[must_use]
    pub const fn next(self, next_bit: RegisterLength, length: RegisterLength) -> Transition {
        let next = match self {
            CycleState::ReadHigh => CycleState::ReadLow,
            CycleState::ReadLow => CycleState::ReadSample,
            CycleState::ReadSample => {
                if next_bit < length {
                    CycleState::ReadHigh
                } else {
                    return Transition {
                        next: CycleState::Res1,
                        restart_count: true,
                    };
                }
            }
            CycleState::Res1 => CycleState::Res2,
            CycleState::Res2 => CycleState::Res3,
            CycleState::Res3 => CycleState::Res4,
            CycleState::Res4 => CycleState::Res5,
            CycleState::Res5 => CycleState::Res6,
            CycleState::Res6 => CycleState::Res6Sample,
            CycleState::Res6Sample => CycleState::ReadHigh,
        };

        Transition {
            next,
            restart_count: false,
        }
    }

    /// Line writes applied on entering `self`. Re-applying them is harmless.
    #[must_use]
    pub const fn actions(self) -> &'static [LineAction] {
        match self {
            CycleState::ReadHigh | CycleState::Res2 => &[CLOCK_HIGH],
            CycleState::ReadLow | CycleState::Res3 => &[CLOCK_LOW],
            CycleState::ReadSample | CycleState::Res6Sample => &[],
            CycleState::Res1 => &[CLOCK_LOW, LOAD_HIGH],
            CycleState::Res4 => &[RESET_HIGH],
            CycleState::Res5 => &[RESET_LOW],
            CycleState::Res6 => &[LOAD_LOW],
        }
    }

    /// Gate that must elapse after entering `self`.
    #[must_use]
    pub const fn sleep(self, timing: &Timing) -> Micros {
        match self {
            CycleState::ReadHigh => timing.clock_period,
            CycleState::ReadLow | CycleState::ReadSample => timing.half_clock(),
            CycleState::Res1
            | CycleState::Res2
            | CycleState::Res3
            | CycleState::Res4
            | CycleState::Res5 => timing.reset_period,
            CycleState::Res6 | CycleState::Res6Sample => timing.half_reset(),
        }
    }

    /// Returns `true` when entering `self` samples the data line.
    #[must_use]
    pub const fn samples(self) -> bool {
        matches!(self, CycleState::ReadSample | CycleState::Res6Sample)
    }

    /// Returns `true` when entering `self` closes a read cycle.
    #[must_use]
    pub const fn completes_cycle(self) -> bool {
        matches!(self, CycleState::Res1)
    }

    /// Short label used in logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            CycleState::Res1 => "res1",
            CycleState::Res2 => "res2",
            CycleState::Res3 => "res3",
            CycleState::Res4 => "res4",
            CycleState::Res5 => "res5",
            CycleState::Res6 => "res6",
            CycleState::Res6Sample => "res6-sample",
            CycleState::ReadHigh => "read-high",
            CycleState::ReadLow => "read-low",
            CycleState::ReadSample => "read-sample",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: Timing = Timing {
        clock_period: 101,
        reset_period: 61,
    };

    #[test]
    fn read_sample_is_the_only_branch() {
        for state in ALL_STATES {
            let below = state.next(0, 8);
            let at_end = state.next(8, 8);
            if state == CycleState::ReadSample {
                assert_eq!(below.next, CycleState::ReadHigh);
                assert!(!below.restart_count);
                assert_eq!(at_end.next, CycleState::Res1);
                assert!(at_end.restart_count);
            } else {
                assert_eq!(below, at_end, "{state} must not depend on the counter");
                assert!(!below.restart_count);
            }
        }
    }

    #[test]
    fn successors_visit_every_state_once() {
        let mut state = CycleState::Res1;
        let mut seen = [false; 10];
        for _ in 0..ALL_STATES.len() {
            let index = ALL_STATES
                .iter()
                .position(|candidate| *candidate == state)
                .unwrap();
            assert!(!seen[index], "{state} visited twice");
            seen[index] = true;
            state = state.next(1, 1).next;
        }
        assert!(seen.iter().all(|visited| *visited));
        assert_eq!(state, CycleState::Res1);
    }

    #[test]
    fn sleep_table_truncates_half_periods() {
        assert_eq!(CycleState::ReadHigh.sleep(&TIMING), 101);
        assert_eq!(CycleState::ReadLow.sleep(&TIMING), 50);
        assert_eq!(CycleState::ReadSample.sleep(&TIMING), 50);
        for state in [
            CycleState::Res1,
            CycleState::Res2,
            CycleState::Res3,
            CycleState::Res4,
            CycleState::Res5,
        ] {
            assert_eq!(state.sleep(&TIMING), 61);
        }
        assert_eq!(CycleState::Res6.sleep(&TIMING), 30);
        assert_eq!(CycleState::Res6Sample.sleep(&TIMING), 30);
    }

    #[test]
    fn action_table_matches_protocol() {
        assert_eq!(CycleState::Res1.actions(), &[CLOCK_LOW, LOAD_HIGH]);
        assert_eq!(CycleState::Res2.actions(), &[CLOCK_HIGH]);
        assert_eq!(CycleState::Res3.actions(), &[CLOCK_LOW]);
        assert_eq!(CycleState::Res4.actions(), &[RESET_HIGH]);
        assert_eq!(CycleState::Res5.actions(), &[RESET_LOW]);
        assert_eq!(CycleState::Res6.actions(), &[LOAD_LOW]);
        assert_eq!(CycleState::ReadHigh.actions(), &[CLOCK_HIGH]);
        assert_eq!(CycleState::ReadLow.actions(), &[CLOCK_LOW]);
        assert!(CycleState::ReadSample.actions().is_empty());
        assert!(CycleState::Res6Sample.actions().is_empty());
    }

    #[test]
    fn only_sample_states_read_data() {
        let sampling: usize = ALL_STATES.iter().filter(|state| state.samples()).count();
        assert_eq!(sampling, 2);
        assert!(CycleState::ReadSample.samples());
        assert!(CycleState::Res6Sample.samples());
        assert!(CycleState::Res1.completes_cycle());
    }
}
