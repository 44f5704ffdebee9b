use bkg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Booking, Payment};

/// Fired when a new hold has been written to the database.
///
/// At this point the interval is locked for the requester and the expiry clock is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookingEvent {
    pub booking: Booking,
}

impl NewBookingEvent {
    pub fn new(booking: Booking) -> Self {
        Self { booking }
    }
}

/// Fired exactly once per booking, by the reconciliation call that won the settlement race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking: Booking,
    pub payment: Payment,
}

impl BookingConfirmedEvent {
    pub fn new(booking: Booking, payment: Payment) -> Self {
        Self { booking, payment }
    }
}

/// Fired when the sweeper releases a hold whose deadline has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldExpiredEvent {
    pub booking: Booking,
}

impl HoldExpiredEvent {
    pub fn new(booking: Booking) -> Self {
        Self { booking }
    }
}

/// Fired when the gateway reports a terminal non-success outcome for a payment attempt.
///
/// The booking itself is untouched. The requester can try again until the hold expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub booking: Booking,
    pub payment: Payment,
}

impl PaymentFailedEvent {
    pub fn new(booking: Booking, payment: Payment) -> Self {
        Self { booking, payment }
    }
}

/// Fired when a booking is cancelled by a person, as opposed to the expiry sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledEvent {
    pub booking: Booking,
    /// The refund owed under the cancellation policy. Zero when nothing had been collected.
    pub refund_due: Money,
}

impl BookingCancelledEvent {
    pub fn new(booking: Booking, refund_due: Money) -> Self {
        Self { booking, refund_due }
    }
}

/// Fired when a payment settles for a hold that had already been released.
///
/// The money is real but the interval may have been given away, so someone needs to look at this
/// one. Subscribers typically alert support to arrange a manual refund or a re-booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrphanedEvent {
    pub booking: Booking,
    pub payment: Payment,
}

impl PaymentOrphanedEvent {
    pub fn new(booking: Booking, payment: Payment) -> Self {
        Self { booking, payment }
    }
}
