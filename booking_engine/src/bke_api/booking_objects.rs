use std::fmt::Display;

use bkg_common::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Booking, BookingStatus, Payment, PaymentStatus};

/// A requester's booking history, with the total value of everything they have booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResult {
    pub requester_id: String,
    pub total_amount: Money,
    pub bookings: Vec<Booking>,
}

impl BookingResult {
    pub fn new(requester_id: String, bookings: Vec<Booking>) -> Self {
        let total_amount = bookings.iter().map(|b| b.amount).sum();
        Self { requester_id, total_amount, bookings }
    }
}

/// Search criteria for bookings. Every field is optional; fields that are set are ANDed together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookingQueryFilter {
    pub resource_id: Option<String>,
    pub requester_id: Option<String>,
    /// Matches bookings whose stay interval covers this date.
    pub active_on: Option<NaiveDate>,
    /// Lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<BookingStatus>>,
}

impl BookingQueryFilter {
    pub fn with_resource_id<S: Into<String>>(mut self, resource_id: S) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_requester_id<S: Into<String>>(mut self, requester_id: S) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn active_on(mut self, date: NaiveDate) -> Self {
        self.active_on = Some(date);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resource_id.is_none() &&
            self.requester_id.is_none() &&
            self.active_on.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none()
    }
}

impl Display for BookingQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(resource_id) = &self.resource_id {
            write!(f, "resource_id: {resource_id}. ")?;
        }
        if let Some(requester_id) = &self.requester_id {
            write!(f, "requester_id: {requester_id}. ")?;
        }
        if let Some(active_on) = &self.active_on {
            write!(f, "active on {active_on}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// The gateway's terminal verdict on a payment attempt, however it reached us (signed webhook or
/// status poll). Pending and processing states never reach the reconciler; callers only hand over
/// evidence once the gateway reports a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayVerdict {
    /// Money moved. Carries the settlement time reported by (or observed from) the gateway.
    Paid { paid_at: DateTime<Utc> },
    /// The attempt failed at the gateway.
    Failed,
    /// The payer abandoned the link, or it was cancelled upstream.
    Cancelled,
    /// The link timed out.
    Expired,
}

impl GatewayVerdict {
    pub fn is_paid(&self) -> bool {
        matches!(self, GatewayVerdict::Paid { .. })
    }

    /// The payment status a non-success verdict maps to. `None` for `Paid`.
    pub fn failure_status(&self) -> Option<PaymentStatus> {
        match self {
            GatewayVerdict::Paid { .. } => None,
            GatewayVerdict::Failed => Some(PaymentStatus::Failed),
            GatewayVerdict::Cancelled => Some(PaymentStatus::Cancelled),
            GatewayVerdict::Expired => Some(PaymentStatus::Expired),
        }
    }
}

impl Display for GatewayVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayVerdict::Paid { paid_at } => write!(f, "Paid at {paid_at}"),
            GatewayVerdict::Failed => write!(f, "Failed"),
            GatewayVerdict::Cancelled => write!(f, "Cancelled"),
            GatewayVerdict::Expired => write!(f, "Expired"),
        }
    }
}

/// What one reconciliation call did. Both delivery paths (webhook and poll) funnel into the same
/// reconciler, so for any payment, across every concurrent caller, at most one call ever reports
/// `Confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// This call performed the settlement: payment `Completed`, booking `Confirmed`.
    Confirmed(Booking),
    /// The payment was already terminal. Nothing was written.
    AlreadyFinalized(Booking),
    /// Money was collected for a hold that had already been released. The payment is recorded as
    /// `Completed`; the booking is left as the sweeper (or canceller) put it.
    HoldLapsed(Booking),
    /// The gateway reported a failure and the payment is now in the matching terminal state. The
    /// hold is untouched and the requester may try paying again.
    PaymentFailed { booking: Booking, payment: Payment },
}

impl ReconcileOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ReconcileOutcome::Confirmed(b) |
            ReconcileOutcome::AlreadyFinalized(b) |
            ReconcileOutcome::HoldLapsed(b) => b,
            ReconcileOutcome::PaymentFailed { booking, .. } => booking,
        }
    }

    /// True only for the call that confirmed the booking.
    pub fn was_confirmed(&self) -> bool {
        matches!(self, ReconcileOutcome::Confirmed(_))
    }
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOutcome::Confirmed(b) => write!(f, "Booking #{} confirmed", b.id),
            ReconcileOutcome::AlreadyFinalized(b) => {
                write!(f, "Payment already finalized. Booking #{} is {}", b.id, b.status)
            },
            ReconcileOutcome::HoldLapsed(b) => write!(f, "Payment settled after the hold on booking #{} lapsed", b.id),
            ReconcileOutcome::PaymentFailed { booking, payment } => {
                write!(f, "Payment {} for booking #{} recorded as {}", payment.order_code, booking.id, payment.status)
            },
        }
    }
}

/// Tally of one sweeper pass over the overdue holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    /// Holds this pass actually released.
    pub expired: Vec<Booking>,
    /// Due holds that were settled or cancelled by someone else between selection and update.
    /// Expected under load; these are not failures.
    pub lost_races: usize,
    /// Holds whose conditional update kept erroring after retries. They remain due and will be
    /// picked up again on the next pass.
    pub failed: usize,
}

impl SweepResult {
    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }
}

impl Display for SweepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} hold(s) expired, {} lost race(s), {} failure(s)", self.expired.len(), self.lost_races, self.failed)
    }
}

/// The result of an explicit cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationResult {
    pub booking: Booking,
    /// What the cancellation policy says the requester is owed. Zero when no payment had been
    /// collected, or when the cancellation came too close to the service date.
    pub refund_due: Money,
    /// The refund payment row, when automatic refunds are enabled and money was owed.
    pub refund: Option<Payment>,
}
