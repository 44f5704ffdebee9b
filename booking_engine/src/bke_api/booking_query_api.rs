use std::fmt::Debug;

use chrono::NaiveDate;

use crate::{
    bke_api::booking_objects::{BookingQueryFilter, BookingResult},
    db_types::{Booking, OrderCode, Payment},
    traits::{BookingApiError, BookingManagement},
};

/// Read-only access to bookings and payments. Everything here is advisory reporting; none of it
/// holds a lock or blocks a transition.
pub struct BookingQueryApi<B> {
    db: B,
}

impl<B> Debug for BookingQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BookingQueryApi")
    }
}

impl<B> BookingQueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> BookingQueryApi<B>
where B: BookingManagement
{
    pub async fn booking_by_id(&self, booking_id: i64) -> Result<Option<Booking>, BookingApiError> {
        self.db.fetch_booking_by_id(booking_id).await
    }

    /// A requester's full booking history, oldest first, with the total booked value.
    pub async fn history_for_requester(&self, requester_id: &str) -> Result<BookingResult, BookingApiError> {
        let bookings = self.db.fetch_bookings_for_requester(requester_id).await?;
        Ok(BookingResult::new(requester_id.to_string(), bookings))
    }

    pub async fn search_bookings(&self, query: BookingQueryFilter) -> Result<Vec<Booking>, BookingApiError> {
        self.db.search_bookings(query).await
    }

    pub async fn payment_by_order_code(&self, code: &OrderCode) -> Result<Option<Payment>, BookingApiError> {
        self.db.fetch_payment_by_order_code(code).await
    }

    pub async fn payments_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, BookingApiError> {
        self.db.fetch_payments_for_booking(booking_id).await
    }

    /// Advisory availability check for `[start, end)` on a resource. A `true` answer can be stale
    /// by the time the caller acts on it; only the reservation insert itself is authoritative.
    pub async fn interval_is_free(
        &self,
        resource_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingApiError> {
        self.db.interval_is_free(resource_id, start, end, None).await
    }
}
