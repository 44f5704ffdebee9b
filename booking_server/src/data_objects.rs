use std::fmt::Display;

use bkg_common::Money;
use booking_engine::{
    db_types::{Booking, BookingStatus, Payment},
    BookingQueryFilter,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/reservations`. The amount is never part of the request; it is always priced
/// from the catalog on the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservationRequest {
    pub resource_id: String,
    pub start_date: NaiveDate,
    /// Exclusive. A one-night stay ends the day after it starts.
    pub end_date: NaiveDate,
    #[serde(default = "default_participants")]
    pub participant_count: i64,
}

fn default_participants() -> i64 {
    1
}

/// Query half of `GET /api/reservations`. Every field narrows the caller's own booking history;
/// `status` takes a single value here even though the engine filter accepts several, because
/// query strings carry scalars.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationSearchParams {
    pub resource_id: Option<String>,
    pub active_on: Option<NaiveDate>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
}

impl ReservationSearchParams {
    pub fn is_empty(&self) -> bool {
        self.resource_id.is_none() &&
            self.active_on.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none()
    }

    pub fn into_filter(self) -> BookingQueryFilter {
        BookingQueryFilter {
            resource_id: self.resource_id,
            requester_id: None,
            active_on: self.active_on,
            since: self.since,
            until: self.until,
            status: self.status.map(|s| vec![s]),
        }
    }
}

/// Body of `POST /api/admin/bookings/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceStatusRequest {
    pub status: BookingStatus,
    /// Only meaningful when forcing back to `Reserved`; sets the new hold deadline.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Free text for the audit log.
    pub reason: String,
}

/// Everything a client needs to collect payment for a held booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkResponse {
    pub order_code: String,
    pub checkout_url: String,
    /// EMVCo payload for bank-app QR scanning.
    pub qr_code: String,
    pub amount: Money,
    /// The link dies with the hold.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Poll response: the payment attempt and the booking it pays for, after any reconciliation this
/// poll triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub payment: Payment,
    pub booking: Booking,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityParams {
    pub resource_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub resource_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available: bool,
}
