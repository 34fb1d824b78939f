#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Feedback bus wiring and the event channel between the bus and report tasks.
//!
//! The board carries one occupancy chain of four cascaded 8-bit registers on
//! connector J3. [`BUS_LINES`] records how each protocol role is routed so logs
//! can name physical pins, and [`ChannelHandler`] forwards driver callbacks to
//! the reporter without blocking the poll loop.

use shiftin_core::config::{RegisterConfig, RegisterLength};
use shiftin_core::driver::{BitSample, DriverStatus, ShiftHandler};
use shiftin_core::lines::{LineId, LineRole, LineRoles, Micros};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

use crate::status;

/// Bits shifted per read cycle.
pub const BUS_LENGTH: RegisterLength = 32;

/// Depth of the event channel. One cycle worth of bits plus its completion.
pub const EVENT_QUEUE_DEPTH: usize = BUS_LENGTH as usize + 8;

/// Metadata describing how a bus line is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusLine {
    pub role: LineRole,
    pub id: LineId,
    pub mcu_pin: &'static str,
    pub connector_pin: u8,
}

impl BusLine {
    pub const fn new(role: LineRole, id: LineId, mcu_pin: &'static str, connector_pin: u8) -> Self {
        Self {
            role,
            id,
            mcu_pin,
            connector_pin,
        }
    }
}

/// Compile-time catalog of every bus line, indexed by [`LineRole::as_index`].
pub const BUS_LINES: [BusLine; 4] = [
    BusLine::new(LineRole::Data, LineId(0), "PB3", 2),
    BusLine::new(LineRole::Clock, LineId(1), "PB4", 3),
    BusLine::new(LineRole::Load, LineId(2), "PB5", 4),
    BusLine::new(LineRole::Reset, LineId(3), "PB6", 5),
];

/// Retrieve line metadata by role.
pub const fn bus_line(role: LineRole) -> BusLine {
    BUS_LINES[role.as_index()]
}

/// Role assignment derived from [`BUS_LINES`].
pub const BUS_ROLES: LineRoles = LineRoles::new(
    bus_line(LineRole::Data).id,
    bus_line(LineRole::Clock).id,
    bus_line(LineRole::Load).id,
    Some(bus_line(LineRole::Reset).id),
);

/// Driver configuration for the on-board chain.
pub const fn bus_config() -> RegisterConfig {
    RegisterConfig::with_default_timing(BUS_ROLES)
}

/// Event forwarded from the bus task to the reporter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusEvent {
    Bit(BitSample),
    CycleComplete { at: Micros },
    /// One or more events before this one were dropped.
    Gap,
}

#[cfg(target_os = "none")]
type BusMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type BusMutex = NoopRawMutex;

/// Queue carrying bus events.
pub type EventQueue = Channel<BusMutex, BusEvent, EVENT_QUEUE_DEPTH>;

/// Convenience sender type alias for the event queue.
pub type EventSender<'a> = Sender<'a, BusMutex, BusEvent, EVENT_QUEUE_DEPTH>;

/// Convenience receiver type alias for the event queue.
pub type EventReceiver<'a> = Receiver<'a, BusMutex, BusEvent, EVENT_QUEUE_DEPTH>;

/// [`ShiftHandler`] that pushes events into the channel without waiting.
///
/// A full channel drops the event and bumps the dropped-event counter; the
/// poll loop must never stall on a slow reader. The first event that fits
/// after a drop is preceded by [`BusEvent::Gap`].
pub struct ChannelHandler<'a> {
    sender: EventSender<'a>,
    lost: bool,
}

impl<'a> ChannelHandler<'a> {
    pub fn new(sender: EventSender<'a>) -> Self {
        Self {
            sender,
            lost: false,
        }
    }

    fn forward(&mut self, event: BusEvent) {
        if self.lost {
            if self.sender.try_send(BusEvent::Gap).is_err() {
                status::record_dropped_event();
                return;
            }
            self.lost = false;
        }
        if self.sender.try_send(event).is_err() {
            self.lost = true;
            status::record_dropped_event();
        }
    }
}

impl ShiftHandler for ChannelHandler<'_> {
    fn on_bit(&mut self, _status: &DriverStatus, sample: BitSample) {
        self.forward(BusEvent::Bit(sample));
    }

    fn on_cycle_complete(&mut self, status: &DriverStatus) {
        self.forward(BusEvent::CycleComplete {
            at: status.last_transition,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftin_core::cycle::CycleState;
    use shiftin_core::driver::ChainId;
    use shiftin_core::lines::{ALL_ROLES, Level};

    fn status(next_bit: RegisterLength) -> DriverStatus {
        DriverStatus {
            chain: ChainId(0),
            state: CycleState::ReadSample,
            next_bit,
            length: BUS_LENGTH,
            pending_sleep: 50,
            last_transition: 1_234,
        }
    }

    #[test]
    fn catalog_is_indexed_by_role() {
        for role in ALL_ROLES {
            assert_eq!(bus_line(role).role, role);
        }
        assert_eq!(BUS_ROLES.aliased_pair(), None);
        assert!(bus_config().validate().is_ok());
    }

    #[test]
    fn handler_forwards_bits_and_completions() {
        let queue: EventQueue = Channel::new();
        let mut handler = ChannelHandler::new(queue.sender());
        let sample = BitSample::new(3, Level::High);

        handler.on_bit(&status(3), sample);
        handler.on_cycle_complete(&status(0));

        let receiver = queue.receiver();
        assert_eq!(receiver.try_receive(), Ok(BusEvent::Bit(sample)));
        assert_eq!(
            receiver.try_receive(),
            Ok(BusEvent::CycleComplete { at: 1_234 })
        );
        assert!(receiver.try_receive().is_err());
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let queue: EventQueue = Channel::new();
        let mut handler = ChannelHandler::new(queue.sender());
        let before = status::counters().dropped_events;

        for index in 0..=EVENT_QUEUE_DEPTH {
            let index = RegisterLength::try_from(index).unwrap();
            handler.on_bit(&status(index), BitSample::new(index, Level::Low));
        }

        assert!(status::counters().dropped_events > before);
        assert_eq!(queue.len(), EVENT_QUEUE_DEPTH);
    }

    #[test]
    fn gap_marks_where_events_were_lost() {
        let queue: EventQueue = Channel::new();
        let mut handler = ChannelHandler::new(queue.sender());

        for index in 0..=EVENT_QUEUE_DEPTH {
            let index = RegisterLength::try_from(index).unwrap();
            handler.on_bit(&status(index), BitSample::new(index, Level::Low));
        }

        let receiver = queue.receiver();
        // Room for the marker only; the bit is lost too.
        receiver.try_receive().unwrap();
        handler.on_bit(&status(0), BitSample::new(0, Level::High));
        for _ in 1..EVENT_QUEUE_DEPTH {
            assert!(matches!(receiver.try_receive(), Ok(BusEvent::Bit(_))));
        }
        assert_eq!(receiver.try_receive(), Ok(BusEvent::Gap));
        assert!(receiver.try_receive().is_err());

        handler.on_cycle_complete(&status(0));
        assert_eq!(receiver.try_receive(), Ok(BusEvent::Gap));
        assert_eq!(
            receiver.try_receive(),
            Ok(BusEvent::CycleComplete { at: 1_234 })
        );
    }
}
