//! STM32 pin and timer adapters for the shift-in driver.
//!
//! Each bus role gets an embassy `Flex` pin so the driver can program its
//! direction at initialization. The microsecond counter is the low 32 bits of
//! `embassy_time::Instant`, which gives the wrapping counter the driver
//! expects.

use embassy_stm32::gpio::{Flex, Level as PinLevel, Pull, Speed};
use embassy_time::Instant;
use shiftin_core::lines::{Direction, Level, LineId, LinePort, LineRole, Micros, MicrosClock};

use crate::bus::bus_line;

/// Bus pins, one per role. The reset pin is optional on boards without it.
pub struct BusPins<'d> {
    data: Flex<'d>,
    clock: Flex<'d>,
    load: Flex<'d>,
    reset: Option<Flex<'d>>,
}

impl<'d> BusPins<'d> {
    pub fn new(data: Flex<'d>, clock: Flex<'d>, load: Flex<'d>, reset: Option<Flex<'d>>) -> Self {
        Self {
            data,
            clock,
            load,
            reset,
        }
    }

    fn pin_mut(&mut self, line: LineId) -> Option<&mut Flex<'d>> {
        if line == bus_line(LineRole::Data).id {
            Some(&mut self.data)
        } else if line == bus_line(LineRole::Clock).id {
            Some(&mut self.clock)
        } else if line == bus_line(LineRole::Load).id {
            Some(&mut self.load)
        } else if line == bus_line(LineRole::Reset).id {
            self.reset.as_mut()
        } else {
            None
        }
    }
}

impl LinePort for BusPins<'_> {
    fn set_direction(&mut self, line: LineId, direction: Direction) {
        let Some(pin) = self.pin_mut(line) else {
            return;
        };
        match direction {
            Direction::Input => pin.set_as_input(Pull::None),
            Direction::Output => {
                pin.set_low();
                pin.set_as_output(Speed::Low);
            }
        }
    }

    fn write(&mut self, line: LineId, level: Level) {
        if let Some(pin) = self.pin_mut(line) {
            pin.set_level(match level {
                Level::Low => PinLevel::Low,
                Level::High => PinLevel::High,
            });
        }
    }

    fn read(&mut self, line: LineId) -> Level {
        self.pin_mut(line)
            .map_or(Level::Low, |pin| Level::from_bool(pin.is_high()))
    }
}

/// Wrapping microsecond counter backed by the embassy time driver.
pub struct EmbassyMicros;

impl MicrosClock for EmbassyMicros {
    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&mut self) -> Micros {
        // Truncation is the wraparound.
        Instant::now().as_micros() as Micros
    }
}
