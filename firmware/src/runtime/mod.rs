use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::Flex;
use embassy_sync::channel::Channel;
use shiftin_core::driver::ShiftIn;

use crate::bus::{self, BUS_LENGTH, ChannelHandler, EventQueue};
use crate::hw::{BusPins, EmbassyMicros};
use crate::telemetry;

mod bus_task;
mod report_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static EVENT_QUEUE: EventQueue = Channel::new();

/// Driver type owned by the bus task.
pub(super) type BusDriver =
    ShiftIn<BusPins<'static>, EmbassyMicros, ChannelHandler<'static>>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PB3, PB4, PB5, PB6, ..
    } = hal::init(config);

    let pins = BusPins::new(
        Flex::new(PB3),
        Flex::new(PB4),
        Flex::new(PB5),
        Some(Flex::new(PB6)),
    );
    let handler = ChannelHandler::new(EVENT_QUEUE.sender());

    match ShiftIn::new(pins, EmbassyMicros, bus::bus_config(), BUS_LENGTH, handler) {
        Ok(driver) => {
            telemetry::log_bus_configured(driver.status().length, driver.timing());
            spawner
                .spawn(bus_task::run(driver))
                .expect("failed to spawn bus task");
            spawner
                .spawn(report_task::run(EVENT_QUEUE.receiver()))
                .expect("failed to spawn report task");
        }
        Err(error) => telemetry::log_config_rejected(&error),
    }

    core::future::pending::<()>().await;
}
