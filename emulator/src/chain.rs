//! Simulated register chain and virtual time base.
//!
//! [`SimulatedChain`] behaves like a string of parallel-in/serial-out
//! registers wired to occupancy contacts: a rising clock edge copies the
//! contacts into the register while load is high and shifts one place
//! towards the data output otherwise. With a reset line wired, contacts
//! latch once occupied until the next reset pulse.

use shiftin_core::driver::{BitSample, DriverStatus, ShiftHandler};
use shiftin_core::lines::{Direction, Level, LineId, LinePort, LineRoles, Micros, MicrosClock};

/// Largest chain the emulator simulates.
pub const MAX_CONTACTS: usize = 256;

pub struct SimulatedChain {
    lines: LineRoles,
    /// Live contact levels as set by `inputs`.
    live: Vec<bool>,
    /// Latched contact levels, cleared by a reset pulse.
    latched: Vec<bool>,
    register: Vec<Level>,
    clock: Level,
    load: Level,
    reset: Level,
    misconfigured: Vec<LineId>,
}

impl SimulatedChain {
    pub fn new(lines: LineRoles, contacts: usize) -> Self {
        let contacts = contacts.min(MAX_CONTACTS);
        Self {
            lines,
            live: vec![false; contacts],
            latched: vec![false; contacts],
            register: vec![Level::Low; contacts],
            clock: Level::Low,
            load: Level::Low,
            reset: Level::Low,
            misconfigured: Vec::new(),
        }
    }

    /// Replaces the live contact levels, resizing the chain to match.
    pub fn set_contacts(&mut self, levels: impl IntoIterator<Item = bool>) {
        self.live = levels.into_iter().take(MAX_CONTACTS).collect();
        let size = self.live.len();
        self.register.resize(size, Level::Low);
        self.latched.resize(size, false);
        for (latched, live) in self.latched.iter_mut().zip(&self.live) {
            *latched |= *live;
        }
    }

    pub fn contacts(&self) -> usize {
        self.live.len()
    }

    /// Contact levels the next parallel load will capture.
    pub fn pending_load(&self) -> Vec<Level> {
        let source = if self.lines.reset.is_some() {
            &self.latched
        } else {
            &self.live
        };
        source.iter().map(|occupied| Level::from_bool(*occupied)).collect()
    }

    /// Lines the driver configured with the wrong direction.
    pub fn misconfigured(&self) -> &[LineId] {
        &self.misconfigured
    }

    fn rising_edge(&mut self) {
        if self.load.is_high() {
            self.register = self.pending_load();
        } else if !self.register.is_empty() {
            self.register.remove(0);
            self.register.push(Level::Low);
        }
    }

    fn reset_pulse(&mut self) {
        self.latched.clone_from(&self.live);
    }
}

impl LinePort for SimulatedChain {
    fn set_direction(&mut self, line: LineId, direction: Direction) {
        let expected = if line == self.lines.data {
            Direction::Input
        } else {
            Direction::Output
        };
        if direction != expected {
            self.misconfigured.push(line);
        }
    }

    fn write(&mut self, line: LineId, level: Level) {
        if line == self.lines.clock {
            if !self.clock.is_high() && level.is_high() {
                self.rising_edge();
            }
            self.clock = level;
        } else if line == self.lines.load {
            self.load = level;
        } else if Some(line) == self.lines.reset {
            if !self.reset.is_high() && level.is_high() {
                self.reset_pulse();
            }
            self.reset = level;
        }
    }

    fn read(&mut self, line: LineId) -> Level {
        if line == self.lines.data {
            self.register.first().copied().unwrap_or(Level::Low)
        } else {
            Level::Low
        }
    }
}

/// Free-running 32-bit microsecond counter moved by the session.
pub struct VirtualClock {
    now: Micros,
}

impl VirtualClock {
    pub const fn starting_at(now: Micros) -> Self {
        Self { now }
    }

    pub fn advance(&mut self, delta: Micros) {
        self.now = self.now.wrapping_add(delta);
    }

    pub const fn now(&self) -> Micros {
        self.now
    }
}

impl MicrosClock for VirtualClock {
    fn now_micros(&mut self) -> Micros {
        self.now
    }
}

/// Driver event captured for the session to narrate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BusEvent {
    Bit(BitSample),
    CycleComplete,
}

/// Handler that buffers driver events until the session drains them.
#[derive(Default)]
pub struct EventLog {
    events: Vec<BusEvent>,
}

impl EventLog {
    pub fn drain(&mut self) -> impl Iterator<Item = BusEvent> + '_ {
        self.events.drain(..)
    }
}

impl ShiftHandler for EventLog {
    fn on_bit(&mut self, _status: &DriverStatus, sample: BitSample) {
        self.events.push(BusEvent::Bit(sample));
    }

    fn on_cycle_complete(&mut self, _status: &DriverStatus) {
        self.events.push(BusEvent::CycleComplete);
    }
}
