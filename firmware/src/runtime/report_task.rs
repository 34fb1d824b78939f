use crate::bus::{BusEvent, EventReceiver};
use crate::status;
use crate::telemetry::{self, OccupancyTracker};

#[embassy_executor::task]
pub async fn run(receiver: EventReceiver<'static>) -> ! {
    let mut tracker = OccupancyTracker::new();

    loop {
        let event = receiver.receive().await;
        if event == BusEvent::Gap {
            telemetry::log_dropped_events(status::counters().dropped_events);
        }

        if let Some(change) = tracker.observe(event) {
            status::record_occupancy(change.occupancy.low_word());
            telemetry::log_occupancy_change(&change);
        }
    }
}
