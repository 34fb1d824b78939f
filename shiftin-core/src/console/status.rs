//! Status surface for the `status` console command.
//!
//! [`StatusSnapshot`] captures the driver and telemetry state at one instant;
//! [`StatusFormatter`] keeps the textual rendering identical across
//! front-ends.

use core::fmt;

use crate::config::Timing;
use crate::driver::{DriverStatus, ShiftIn};
use crate::lines::LineRole;
use crate::telemetry::{CycleSummary, CycleTelemetry};

/// Point-in-time view of one driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub driver: DriverStatus,
    pub timing: Timing,
    pub reset_line: bool,
    pub cycles_completed: u32,
    pub last_cycle: Option<CycleSummary>,
}

impl StatusSnapshot {
    /// Captures the current driver state together with its telemetry.
    pub fn capture<P, C, H, const CAPACITY: usize>(
        driver: &ShiftIn<P, C, H>,
        telemetry: &CycleTelemetry<CAPACITY>,
    ) -> Self {
        Self {
            driver: *driver.status(),
            timing: *driver.timing(),
            reset_line: driver.line(LineRole::Reset).is_some(),
            cycles_completed: telemetry.cycles_completed(),
            last_cycle: telemetry.latest().copied(),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the driver line (e.g. `driver chain=0 state=read-low next-bit=3 length=16 gate=50us`).
    pub fn write_driver_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let driver = &self.snapshot.driver;
        write!(
            writer,
            "driver chain={} state={} next-bit={} length={} gate={}us",
            driver.chain.0, driver.state, driver.next_bit, driver.length, driver.pending_sleep
        )
    }

    /// Writes the timing line (e.g. `timing clock=100us reset=60us reset-line=none`).
    pub fn write_timing_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "timing clock={}us reset={}us reset-line={}",
            self.snapshot.timing.clock_period,
            self.snapshot.timing.reset_period,
            if self.snapshot.reset_line {
                "wired"
            } else {
                "none"
            }
        )
    }

    /// Writes the cycle line (e.g. `cycles completed=4 last=#3 bits=16 high=2 took=4170us`).
    pub fn write_cycle_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "cycles completed={}", self.snapshot.cycles_completed)?;
        match self.snapshot.last_cycle {
            Some(summary) => write!(
                writer,
                " last=#{} bits={} high={} took={}us",
                summary.sequence, summary.bits, summary.high_bits, summary.duration_us
            ),
            None => writer.write_str(" last=n/a"),
        }
    }

    /// Renders every status line.
    #[cfg(feature = "alloc")]
    #[must_use]
    pub fn lines(&self) -> alloc::vec::Vec<alloc::string::String> {
        use alloc::string::String;

        let writers: [fn(&Self, &mut String) -> fmt::Result; 3] = [
            Self::write_driver_line,
            Self::write_timing_line,
            Self::write_cycle_line,
        ];

        writers
            .iter()
            .map(|write| {
                let mut line = String::new();
                let _ = write(self, &mut line);
                line
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleState;
    use crate::driver::ChainId;
    use heapless::String;

    fn snapshot(last_cycle: Option<CycleSummary>) -> StatusSnapshot {
        StatusSnapshot {
            driver: DriverStatus {
                chain: ChainId(2),
                state: CycleState::ReadLow,
                next_bit: 3,
                length: 16,
                pending_sleep: 50,
                last_transition: 1_000,
            },
            timing: Timing {
                clock_period: 100,
                reset_period: 60,
            },
            reset_line: false,
            cycles_completed: 4,
            last_cycle,
        }
    }

    #[test]
    fn driver_and_timing_lines_render() {
        let snapshot = snapshot(None);
        let formatter = StatusFormatter::new(&snapshot);

        let mut line: String<96> = String::new();
        formatter.write_driver_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "driver chain=2 state=read-low next-bit=3 length=16 gate=50us"
        );

        line.clear();
        formatter.write_timing_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "timing clock=100us reset=60us reset-line=none");
    }

    #[test]
    fn cycle_line_reports_last_summary() {
        let snapshot = snapshot(Some(CycleSummary {
            sequence: 3,
            started_at: 0,
            duration_us: 4_170,
            bits: 16,
            high_bits: 2,
        }));
        let mut line: String<96> = String::new();
        StatusFormatter::new(&snapshot)
            .write_cycle_line(&mut line)
            .unwrap();
        assert_eq!(
            line.as_str(),
            "cycles completed=4 last=#3 bits=16 high=2 took=4170us"
        );

        let empty = self::snapshot(None);
        line.clear();
        StatusFormatter::new(&empty)
            .write_cycle_line(&mut line)
            .unwrap();
        assert_eq!(line.as_str(), "cycles completed=4 last=n/a");
    }
}
