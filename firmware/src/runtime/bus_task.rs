use embassy_futures::yield_now;
use shiftin_core::telemetry::CycleTelemetry;

use super::BusDriver;
use crate::{status, telemetry};

/// Polls the driver as fast as the executor lets it, yielding between polls.
#[embassy_executor::task]
pub async fn run(mut driver: BusDriver) -> ! {
    let mut cycles: CycleTelemetry = CycleTelemetry::new();

    loop {
        let outcome = driver.poll();
        if let Some(summary) = cycles.observe(&outcome) {
            status::record_cycle(&summary);
            telemetry::log_cycle_summary(&summary);
        }
        yield_now().await;
    }
}
