//! Polling driver that walks a register chain through the read cycle.
//!
//! [`ShiftIn`] owns the platform [`LinePort`] and [`MicrosClock`] plus an
//! optional [`ShiftHandler`]. Every call to [`ShiftIn::poll`] either returns
//! immediately because the current state's gate has not elapsed, or performs
//! exactly one transition: sample (when the new state samples), drive the
//! entry actions, arm the next gate, stamp the transition time, and finally
//! notify the handler.

use crate::config::{ConfigError, RegisterConfig, RegisterLength, Timing, validate_length};
use crate::cycle::CycleState;
use crate::lines::{
    ALL_ROLES, Level, LineId, LinePort, LineRole, Micros, MicrosClock, elapsed_since,
};

/// Identifies a chain when one handler serves several drivers.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ChainId(pub u8);

/// Bit delivered to [`ShiftHandler::on_bit`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BitSample {
    /// Zero-based position within the current cycle.
    pub index: RegisterLength,
    pub level: Level,
}

impl BitSample {
    pub const fn new(index: RegisterLength, level: Level) -> Self {
        Self { index, level }
    }
}

/// Public view of the driver's run-time state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriverStatus {
    pub chain: ChainId,
    pub state: CycleState,
    /// Index the next sampled bit will carry.
    pub next_bit: RegisterLength,
    pub length: RegisterLength,
    /// Microseconds that must pass after `last_transition` before the next step.
    pub pending_sleep: Micros,
    pub last_transition: Micros,
}

impl DriverStatus {
    /// State right after initialization or a length change: as if a cycle had
    /// just finished, so the first elapsed poll enters [`CycleState::Res1`].
    const fn restarted(chain: ChainId, length: RegisterLength) -> Self {
        Self {
            chain,
            state: CycleState::ReadSample,
            next_bit: length,
            length,
            pending_sleep: 0,
            last_transition: 0,
        }
    }
}

/// Receives driver notifications. Both hooks default to doing nothing.
///
/// Handlers run inside [`ShiftIn::poll`] and should return quickly; time spent
/// here stretches the protocol timing.
pub trait ShiftHandler {
    /// A bit was sampled. `status.next_bit` still equals `sample.index`.
    fn on_bit(&mut self, status: &DriverStatus, sample: BitSample) {
        let _ = (status, sample);
    }

    /// The driver entered [`CycleState::Res1`]; `status.next_bit` is zero.
    fn on_cycle_complete(&mut self, status: &DriverStatus) {
        let _ = status;
    }
}

impl ShiftHandler for () {}

impl<H: ShiftHandler> ShiftHandler for Option<H> {
    fn on_bit(&mut self, status: &DriverStatus, sample: BitSample) {
        if let Some(handler) = self {
            handler.on_bit(status, sample);
        }
    }

    fn on_cycle_complete(&mut self, status: &DriverStatus) {
        if let Some(handler) = self {
            handler.on_cycle_complete(status);
        }
    }
}

impl<H: ShiftHandler + ?Sized> ShiftHandler for &mut H {
    fn on_bit(&mut self, status: &DriverStatus, sample: BitSample) {
        (**self).on_bit(status, sample);
    }

    fn on_cycle_complete(&mut self, status: &DriverStatus) {
        (**self).on_cycle_complete(status);
    }
}

/// One transition performed by [`ShiftIn::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Step {
    /// State that was entered.
    pub state: CycleState,
    /// Counter value stamped as the transition time.
    pub at: Micros,
    pub sample: Option<BitSample>,
    pub cycle_complete: bool,
}

/// What a call to [`ShiftIn::poll`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Gate not yet elapsed; nothing changed.
    Waiting,
    Advanced(Step),
}

impl PollOutcome {
    /// Returns the performed step, if any.
    #[must_use]
    pub const fn step(&self) -> Option<&Step> {
        match self {
            PollOutcome::Waiting => None,
            PollOutcome::Advanced(step) => Some(step),
        }
    }

    /// Returns `true` when the poll advanced the state machine.
    #[must_use]
    pub const fn advanced(&self) -> bool {
        matches!(self, PollOutcome::Advanced(_))
    }
}

/// Non-blocking shift-in driver for one register chain.
pub struct ShiftIn<P, C, H = ()> {
    port: P,
    clock: C,
    handler: H,
    config: RegisterConfig,
    timing: Timing,
    status: DriverStatus,
}

impl<P, C> ShiftIn<P, C>
where
    P: LinePort,
    C: MicrosClock,
{
    /// Initializes a driver without a handler.
    pub fn without_handler(
        port: P,
        clock: C,
        config: RegisterConfig,
        length: RegisterLength,
    ) -> Result<Self, ConfigError> {
        Self::new(port, clock, config, length, ())
    }
}

impl<P, C, H> ShiftIn<P, C, H>
where
    P: LinePort,
    C: MicrosClock,
    H: ShiftHandler,
{
    /// Validates the configuration, programs line directions and idle levels,
    /// and positions the machine at the end of a notional cycle.
    pub fn new(
        mut port: P,
        clock: C,
        config: RegisterConfig,
        length: RegisterLength,
        handler: H,
    ) -> Result<Self, ConfigError> {
        let timing = config.validate()?;
        let length = validate_length(length)?;

        for role in ALL_ROLES {
            if let Some(line) = config.lines.line(role) {
                port.set_direction(line, role.direction());
            }
        }

        let mut driver = Self {
            port,
            clock,
            handler,
            config,
            timing,
            status: DriverStatus::restarted(ChainId::default(), length),
        };
        driver.idle_outputs();
        Ok(driver)
    }

    /// Tags the driver so handlers can tell chains apart.
    #[must_use]
    pub fn with_chain_id(mut self, chain: ChainId) -> Self {
        self.status.chain = chain;
        self
    }

    /// Changes the register length and restarts the cycle from scratch.
    ///
    /// In-flight progress is discarded and the output lines return to their
    /// idle levels. On error the driver is left untouched.
    pub fn set_length(&mut self, length: RegisterLength) -> Result<(), ConfigError> {
        let length = validate_length(length)?;
        self.idle_outputs();
        self.status = DriverStatus::restarted(self.status.chain, length);
        Ok(())
    }

    /// Advances at most one protocol step.
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.clock.now_micros();
        if elapsed_since(self.status.last_transition, now) <= self.status.pending_sleep {
            return PollOutcome::Waiting;
        }

        let transition = self
            .status
            .state
            .next(self.status.next_bit, self.status.length);
        if transition.restart_count {
            self.status.next_bit = 0;
        }
        let state = transition.next;
        self.status.state = state;

        let sample = if state.samples() {
            let level = self.port.read(self.config.lines.data);
            Some(BitSample::new(self.status.next_bit, level))
        } else {
            None
        };

        self.apply_actions(state);
        self.status.pending_sleep = state.sleep(&self.timing);
        let at = self.clock.now_micros();
        self.status.last_transition = at;

        if let Some(sample) = sample {
            self.handler.on_bit(&self.status, sample);
            self.status.next_bit = self.status.next_bit.saturating_add(1);
        }

        let cycle_complete = state.completes_cycle();
        if cycle_complete {
            self.handler.on_cycle_complete(&self.status);
        }

        PollOutcome::Advanced(Step {
            state,
            at,
            sample,
            cycle_complete,
        })
    }

    fn apply_actions(&mut self, state: CycleState) {
        for action in state.actions() {
            if let Some(line) = self.config.lines.line(action.role) {
                self.port.write(line, action.level);
            }
        }
    }

    fn idle_outputs(&mut self) {
        for role in [LineRole::Clock, LineRole::Load, LineRole::Reset] {
            if let Some(line) = self.config.lines.line(role) {
                self.port.write(line, Level::Low);
            }
        }
    }
}

impl<P, C, H> ShiftIn<P, C, H> {
    /// Returns a snapshot of the run-time state.
    pub const fn status(&self) -> &DriverStatus {
        &self.status
    }

    /// Returns the active configuration.
    pub const fn config(&self) -> &RegisterConfig {
        &self.config
    }

    /// Returns the validated periods in counter units.
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Returns the line bound to `role`, if any.
    pub const fn line(&self, role: LineRole) -> Option<LineId> {
        self.config.lines.line(role)
    }

    /// Provides access to the line port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Provides mutable access to the line port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Provides access to the clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Provides mutable access to the clock.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Provides access to the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Provides mutable access to the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{Direction, LineRoles};
    use core::time::Duration;
    use heapless::Vec;

    const DATA: LineId = LineId(1);
    const CLOCK: LineId = LineId(2);
    const LOAD: LineId = LineId(3);
    const RESET: LineId = LineId(4);

    #[derive(Default)]
    struct RecordingPort {
        directions: Vec<(LineId, Direction), 8>,
        writes: Vec<(LineId, Level), 64>,
        reads: usize,
    }

    impl LinePort for RecordingPort {
        fn set_direction(&mut self, line: LineId, direction: Direction) {
            self.directions.push((line, direction)).unwrap();
        }

        fn write(&mut self, line: LineId, level: Level) {
            self.writes.push((line, level)).unwrap();
        }

        fn read(&mut self, _line: LineId) -> Level {
            self.reads += 1;
            Level::High
        }
    }

    struct FixedClock(Micros);

    impl MicrosClock for FixedClock {
        fn now_micros(&mut self) -> Micros {
            self.0
        }
    }

    fn config(reset: Option<LineId>) -> RegisterConfig {
        RegisterConfig::new(
            LineRoles::new(DATA, CLOCK, LOAD, reset),
            Duration::from_micros(100),
            Duration::from_micros(60),
        )
    }

    #[test]
    fn initialization_programs_directions_and_idle_levels() {
        let driver =
            ShiftIn::without_handler(RecordingPort::default(), FixedClock(0), config(Some(RESET)), 8)
                .expect("valid configuration");

        let port = driver.port();
        assert_eq!(
            port.directions.as_slice(),
            &[
                (DATA, Direction::Input),
                (CLOCK, Direction::Output),
                (LOAD, Direction::Output),
                (RESET, Direction::Output),
            ]
        );
        assert_eq!(
            port.writes.as_slice(),
            &[(CLOCK, Level::Low), (LOAD, Level::Low), (RESET, Level::Low)]
        );

        let status = driver.status();
        assert_eq!(status.state, CycleState::ReadSample);
        assert_eq!(status.next_bit, 8);
        assert_eq!(status.pending_sleep, 0);
    }

    #[test]
    fn poll_at_time_zero_waits_for_the_counter_to_move() {
        let mut driver =
            ShiftIn::without_handler(RecordingPort::default(), FixedClock(0), config(None), 4)
                .expect("valid configuration");

        assert_eq!(driver.poll(), PollOutcome::Waiting);
        driver.clock_mut().0 = 1;
        let step = *driver.poll().step().expect("gate elapsed");
        assert_eq!(step.state, CycleState::Res1);
        assert!(step.cycle_complete);
        assert_eq!(step.at, 1);
    }

    #[test]
    fn invalid_configuration_is_rejected_before_touching_lines() {
        let lines = LineRoles::new(DATA, CLOCK, CLOCK, None);
        let config = RegisterConfig::with_default_timing(lines);
        let result = ShiftIn::without_handler(RecordingPort::default(), FixedClock(0), config, 8);
        assert!(matches!(
            result,
            Err(ConfigError::AliasedLines {
                first: LineRole::Clock,
                second: LineRole::Load,
            })
        ));
    }

    #[test]
    fn set_length_zero_leaves_driver_untouched() {
        let mut driver =
            ShiftIn::without_handler(RecordingPort::default(), FixedClock(0), config(None), 4)
                .expect("valid configuration");
        let before = *driver.status();
        assert_eq!(driver.set_length(0), Err(ConfigError::ZeroLength));
        assert_eq!(*driver.status(), before);
    }

    #[test]
    fn chain_id_is_reported_in_status() {
        let driver =
            ShiftIn::without_handler(RecordingPort::default(), FixedClock(0), config(None), 4)
                .expect("valid configuration")
                .with_chain_id(ChainId(7));
        assert_eq!(driver.status().chain, ChainId(7));
    }
}
