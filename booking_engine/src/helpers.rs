//! Small shared utilities for the booking engine.

use chrono::NaiveDate;
use rand::distributions::{Alphanumeric, DistString};

use crate::{db_types::NewBooking, traits::ReservationError};

/// Checks that `[start, end)` is a usable stay interval.
///
/// The end date must lie strictly after the start date (intervals are half-open, so a one-night
/// stay is `[d, d+1)`), and the stay may not begin in the past.
pub fn validate_interval(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), ReservationError> {
    if end <= start {
        return Err(ReservationError::InvalidInterval(format!(
            "end date ({end}) must be after start date ({start})"
        )));
    }
    if start < today {
        return Err(ReservationError::InvalidInterval(format!("start date ({start}) is in the past")));
    }
    Ok(())
}

/// Full validation for an incoming reservation request.
pub fn validate_reservation_request(booking: &NewBooking, today: NaiveDate) -> Result<(), ReservationError> {
    validate_interval(booking.start_date, booking.end_date, today)?;
    if booking.resource_id.trim().is_empty() {
        return Err(ReservationError::InvalidBooking("resource id must not be empty".to_string()));
    }
    if booking.requester_id.trim().is_empty() {
        return Err(ReservationError::InvalidBooking("requester id must not be empty".to_string()));
    }
    if booking.participant_count < 1 {
        return Err(ReservationError::InvalidBooking(format!(
            "participant count must be at least 1, got {}",
            booking.participant_count
        )));
    }
    if booking.amount.is_negative() {
        return Err(ReservationError::InvalidBooking(format!("amount must not be negative, got {}", booking.amount)));
    }
    Ok(())
}

/// Generates an order code for a refund row. The `RF` prefix keeps refunds easy to spot in the
/// payments table and in gateway exports.
pub fn refund_order_code() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 10);
    format!("RF{suffix}")
}
