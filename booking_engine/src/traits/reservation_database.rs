use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{Booking, BookingStatus, CancelReason, NewBooking, NewPayment, OrderCode, Payment, PaymentStatus},
    traits::{data_objects::ConfirmationOutcome, BookingApiError, BookingManagement},
};

/// This trait defines the write side of a booking backend.
///
/// The contract every method shares: a state transition happens as a *conditional update* inside
/// the datastore (succeed only if the row still matches the expected prior state), never behind an
/// in-process lock. That single discipline is what makes the reservation race, the webhook-vs-poll
/// confirmation race and the sweeper-vs-reconciler race all resolve to exactly one winner with the
/// losers becoming harmless no-ops, even across multiple server instances sharing one database.
#[allow(async_fn_in_trait)]
pub trait ReservationDatabase: Clone + BookingManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a time-bound hold on the booking's interval.
    ///
    /// The conflict check and the insert execute as one atomic statement, so no other writer can
    /// interleave between check and commit. A conflict is any booking on the same resource with an
    /// active status whose half-open interval overlaps the requested one; touching boundaries do
    /// not conflict.
    ///
    /// On success the booking is `Reserved` with `expires_at = now + hold`. If the interval is
    /// taken, `ResourceUnavailable` is returned and the caller decides whether to retry with a
    /// different interval; the engine never retries a lost reservation race.
    ///
    /// Input validation (dates, participant count) is the caller's job; see
    /// [`BookingFlowApi::create_reservation`](crate::BookingFlowApi::create_reservation).
    async fn create_reservation(&self, booking: NewBooking, hold: Duration) -> Result<Booking, ReservationError>;

    /// Records a new payment attempt for a booking.
    ///
    /// The booking must currently be `Reserved`. At most one live (pending, non-refund) payment
    /// may exist per booking; a second insert while one is live returns `DuplicatePayment`.
    /// Supersede the old attempt first via [`supersede_payment`](Self::supersede_payment).
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, ReservationError>;

    /// Cancels a still-pending payment attempt that is being replaced by a new link.
    ///
    /// Compare-and-swap `Pending` → `Cancelled`. If the payment is already terminal,
    /// `PaymentModificationNoOp` is returned.
    async fn supersede_payment(&self, code: &OrderCode) -> Result<Payment, ReservationError>;

    /// The settlement CAS pair, in one atomic transaction. This is the only write the confirmation
    /// reconciler performs for success evidence, and the only place a hold becomes `Confirmed`.
    ///
    /// * Step 1 (the only step that can race): payment `Pending` → `Completed`, recording
    ///   `paid_at` and the raw evidence. If the payment is already terminal, nothing is written
    ///   and the current booking state comes back as `AlreadyFinalized`.
    /// * Step 2 (winner only): booking `Reserved` → `Confirmed`, clearing `expires_at`. If the
    ///   hold was already released — the sweeper got there first — the payment stays `Completed`
    ///   (the gateway evidence is authoritative that money moved) and the outcome is `HoldLapsed`.
    async fn settle_payment(
        &self,
        code: &OrderCode,
        evidence: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ConfirmationOutcome, ReservationError>;

    /// Records a failed collection attempt: payment `Pending` → `new_status`, which must be one of
    /// the failure states (`Failed`, `Cancelled`, `Expired`).
    ///
    /// The booking is deliberately untouched: a failed payment leaves the hold `Reserved` so the
    /// traveller can retry before the hold's own expiry.
    ///
    /// Returns `PaymentModificationNoOp` if the payment is already terminal.
    async fn fail_payment(
        &self,
        code: &OrderCode,
        new_status: PaymentStatus,
        evidence: &str,
    ) -> Result<Payment, ReservationError>;

    /// All holds whose deadline has passed as of `now`. A snapshot only; rows may be confirmed or
    /// cancelled by someone else before the sweeper reaches them, which is why expiry itself goes
    /// through [`expire_hold`](Self::expire_hold).
    async fn fetch_due_holds(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, ReservationError>;

    /// Expires a single overdue hold: booking → `Cancelled(reason = Expired)` only if it is still
    /// `Reserved` and still overdue at update time, and any live pending payment for it →
    /// `Expired`, atomically.
    ///
    /// Returns `None` when the conditional update matched nothing, i.e. another actor settled or
    /// cancelled the booking between selection and update. That is the expected no-op, not an
    /// error.
    async fn expire_hold(&self, booking_id: i64, now: DateTime<Utc>) -> Result<Option<Booking>, ReservationError>;

    /// Explicit cancellation: booking → `Cancelled` only from `Reserved` or `Confirmed`, recording
    /// who did it and why. Any live pending payment is cancelled in the same transaction. The
    /// interval becomes reservable the instant this commits; releasing the hold is the status
    /// change itself, there is no secondary release step.
    ///
    /// Completed and already-cancelled bookings are terminal: `BookingModificationNoOp`.
    async fn cancel_booking(
        &self,
        booking_id: i64,
        cancelled_by: &str,
        reason: CancelReason,
    ) -> Result<Booking, ReservationError>;

    /// The "service consumed" transition: booking `Confirmed` → `Completed`.
    async fn complete_booking(&self, booking_id: i64) -> Result<Booking, ReservationError>;

    /// Administrative escape hatch: sets the status with none of the usual guards. The caller is
    /// responsible for auditing (actor, reason, timestamp).
    ///
    /// Forcing a booking back to `Reserved` requires a fresh `expires_at`; forcing into any other
    /// status clears it. Forcing into `Cancelled` records `forced_by` with reason `Admin`.
    async fn force_booking_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        forced_by: &str,
    ) -> Result<Booking, ReservationError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), ReservationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReservationError {
    #[error("We have an internal database error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested interval is not available for this resource")]
    ResourceUnavailable,
    #[error("Invalid stay interval: {0}")]
    InvalidInterval(String),
    #[error("Invalid reservation request: {0}")]
    InvalidBooking(String),
    #[error("Booking {0} does not exist")]
    BookingNotFound(i64),
    #[error("No payment exists with order code {0}")]
    PaymentNotFound(OrderCode),
    #[error("Booking {0} already has a live payment attempt")]
    DuplicatePayment(i64),
    #[error("{0}")]
    QueryError(#[from] BookingApiError),
    #[error("The requested booking change would result in a no-op.")]
    BookingModificationNoOp,
    #[error("The requested payment update would result in a no-op.")]
    PaymentModificationNoOp,
    #[error("{0} may not modify this booking")]
    Forbidden(String),
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        ReservationError::DatabaseError(e.to_string())
    }
}

impl ReservationError {
    /// Errors worth retrying with backoff. SQLite surfaces write contention as busy/locked
    /// database errors; everything else is either a business outcome or a real fault.
    pub fn is_transient(&self) -> bool {
        match self {
            ReservationError::DatabaseError(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("database is locked") || msg.contains("database is busy") || msg.contains("timed out")
            },
            _ => false,
        }
    }
}
