use booking_engine::{db_types::Booking, events::EventProducers, BookingFlowApi, SqliteDatabase};
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

/// Starts the hold expiry sweeper. Do not await the returned JoinHandle, as it runs indefinitely.
///
/// Every pass releases the holds whose deadline has passed, voiding their pending payment links
/// as it goes. A pass that fails (for example, the database file is briefly locked) is logged and
/// abandoned; the next tick starts over from a fresh query.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = BookingFlowApi::new(db, producers);
        info!("🕰️ Hold expiry sweeper started. {}s between passes.", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running hold expiry pass");
            match api.sweep_expired_holds(Utc::now()).await {
                Ok(result) => {
                    if result.expired_count() > 0 || result.lost_races > 0 || result.failed > 0 {
                        info!("🕰️ {result}");
                        debug!("🕰️ Expired holds: {}", booking_list(&result.expired));
                    }
                },
                Err(e) => {
                    error!("🕰️ Hold expiry pass failed: {e}. The next pass will retry.");
                },
            }
        }
    })
}

fn booking_list(bookings: &[Booking]) -> String {
    bookings
        .iter()
        .map(|b| format!("#{} ({} on {})", b.id, b.requester_id, b.resource_id))
        .collect::<Vec<String>>()
        .join(", ")
}
