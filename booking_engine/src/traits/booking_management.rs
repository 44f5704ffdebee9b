use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    bke_api::booking_objects::BookingQueryFilter,
    db_types::{Booking, OrderCode, Payment},
};

#[derive(Debug, Clone, Error)]
pub enum BookingApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for BookingApiError {
    fn from(e: sqlx::Error) -> Self {
        BookingApiError::DatabaseError(e.to_string())
    }
}

/// The `BookingManagement` trait defines the read side of a booking backend: fetching individual
/// records, listing a requester's bookings, searching, and the advisory availability check.
///
/// The availability result is always *derived* from booking rows with an active status. Backends
/// must not answer it from any cached counter, and callers must not treat it as a guarantee: the
/// authoritative conflict check is fused into [`ReservationDatabase::create_reservation`], which can
/// still refuse after `interval_is_free` said yes.
///
/// [`ReservationDatabase::create_reservation`]: crate::traits::ReservationDatabase::create_reservation
#[allow(async_fn_in_trait)]
pub trait BookingManagement {
    /// Fetches the booking with the given id, or `None` if it does not exist.
    async fn fetch_booking_by_id(&self, id: i64) -> Result<Option<Booking>, BookingApiError>;

    /// All bookings ever made by the given requester, oldest first.
    async fn fetch_bookings_for_requester(&self, requester_id: &str) -> Result<Vec<Booking>, BookingApiError>;

    /// Fetches bookings according to the criteria in the filter, oldest first.
    async fn search_bookings(&self, query: BookingQueryFilter) -> Result<Vec<Booking>, BookingApiError>;

    /// Fetches the payment attempt with the given gateway order code, if any.
    async fn fetch_payment_by_order_code(&self, code: &OrderCode) -> Result<Option<Payment>, BookingApiError>;

    /// Every payment attempt (including refund rows) recorded against the booking, oldest first.
    async fn fetch_payments_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, BookingApiError>;

    /// Whether `[start, end)` on the given resource overlaps no active booking. Pass `excluding` to
    /// ignore one booking id, e.g. when asking whether an existing booking could be moved.
    async fn interval_is_free(
        &self,
        resource_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        excluding: Option<i64>,
    ) -> Result<bool, BookingApiError>;
}
