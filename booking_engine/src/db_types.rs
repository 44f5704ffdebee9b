use std::{fmt::Display, str::FromStr};

use bkg_common::{Money, VND_CURRENCY_CODE};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   BookingStatus     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BookingStatus {
    /// A live hold. `expires_at` is set, and the interval is blocked for everyone else.
    Reserved,
    /// Payment has been collected. The interval stays blocked; `expires_at` is cleared.
    Confirmed,
    /// The service was consumed. Terminal.
    Completed,
    /// Released, either by the expiry sweeper or an explicit cancellation. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Active bookings are the ones that block their interval.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Reserved | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Reserved => write!(f, "Reserved"),
            BookingStatus::Confirmed => write!(f, "Confirmed"),
            BookingStatus::Completed => write!(f, "Completed"),
            BookingStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for BookingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reserved" => Ok(Self::Reserved),
            "Confirmed" => Ok(Self::Confirmed),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid booking status: {s}"))),
        }
    }
}

impl From<String> for BookingStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid booking status: {value}. But this conversion cannot fail. Defaulting to Reserved");
            BookingStatus::Reserved
        })
    }
}

//--------------------------------------    CancelReason     ---------------------------------------------------------

/// Why a booking ended up `Cancelled`. Expired holds and explicit cancellations carry different
/// refund and reporting consequences, so the reason is stored, not inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CancelReason {
    /// The hold's deadline passed without payment. Set by the expiry sweeper.
    Expired,
    /// The traveller cancelled.
    Guest,
    /// The hotel or tour operator cancelled.
    Provider,
    /// Support staff cancelled on someone's behalf.
    Admin,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Expired => write!(f, "Expired"),
            CancelReason::Guest => write!(f, "Guest"),
            CancelReason::Provider => write!(f, "Provider"),
            CancelReason::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for CancelReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Expired" => Ok(Self::Expired),
            "Guest" => Ok(Self::Guest),
            "Provider" => Ok(Self::Provider),
            "Admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid cancellation reason: {s}"))),
        }
    }
}

//--------------------------------------       Actor         ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    Guest,
    Provider,
    Admin,
}

impl From<ActorRole> for CancelReason {
    fn from(role: ActorRole) -> Self {
        match role {
            ActorRole::Guest => CancelReason::Guest,
            ActorRole::Provider => CancelReason::Provider,
            ActorRole::Admin => CancelReason::Admin,
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Guest => write!(f, "Guest"),
            ActorRole::Provider => write!(f, "Provider"),
            ActorRole::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "provider" => Ok(Self::Provider),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid actor role: {s}"))),
        }
    }
}

/// Who is asking. Authentication itself happens upstream; the engine only enforces ownership:
/// guests may touch their own bookings, providers and admins may touch any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn guest<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Guest }
    }

    pub fn provider<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Provider }
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Admin }
    }

    pub fn may_act_for(&self, requester_id: &str) -> bool {
        match self.role {
            ActorRole::Guest => self.id == requester_id,
            ActorRole::Provider | ActorRole::Admin => true,
        }
    }
}

//--------------------------------------      OrderCode      ---------------------------------------------------------

/// The gateway-facing identifier of a payment attempt. Unique per attempt; the booking it pays for
/// is stored against the payment record and never derived from the code.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderCode(pub String);

impl FromStr for OrderCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       Booking       ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub resource_id: String,
    pub requester_id: String,
    /// First night (or tour departure date). Inclusive.
    pub start_date: NaiveDate,
    /// Checkout date. Exclusive, so back-to-back stays share a boundary without conflicting.
    pub end_date: NaiveDate,
    pub participant_count: i64,
    pub amount: Money,
    pub status: BookingStatus,
    /// Set exactly while `status` is `Reserved`; cleared on every other transition.
    pub expires_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<CancelReason>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// The instant the service begins, for refund-tier arithmetic. Day granularity: the service
    /// day starts at midnight UTC.
    pub fn service_start(&self) -> DateTime<Utc> {
        self.start_date.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

impl Display for Booking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Booking #{} [{}] {} on {} ({} to {}, {} pax, {})",
            self.id, self.status, self.requester_id, self.resource_id, self.start_date, self.end_date,
            self.participant_count, self.amount
        )
    }
}

//--------------------------------------      NewBooking     ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    /// The room or tour-slot identifier, as assigned by the catalog
    pub resource_id: String,
    /// The traveller asking for the hold
    pub requester_id: String,
    pub start_date: NaiveDate,
    /// Exclusive end of the stay (half-open interval)
    pub end_date: NaiveDate,
    pub participant_count: i64,
    /// The full price for the stay, already computed from the catalog rate
    pub amount: Money,
}

impl NewBooking {
    pub fn new<S1, S2>(resource_id: S1, requester_id: S2, start_date: NaiveDate, end_date: NaiveDate) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            resource_id: resource_id.into(),
            requester_id: requester_id.into(),
            start_date,
            end_date,
            participant_count: 1,
            amount: Money::default(),
        }
    }

    pub fn with_participants(mut self, count: i64) -> Self {
        self.participant_count = count;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The payment link is live and unpaid.
    Pending,
    /// Money moved. Irreversible; refunds are separate payment rows, never a reverse transition.
    Completed,
    /// The gateway reported the attempt failed.
    Failed,
    /// Cancelled before completion, by the payer or by being superseded.
    Cancelled,
    /// The link (and its hold) timed out.
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// The terminal states a failed collection attempt may land in. `Completed` is reached only
    /// through settlement.
    pub fn is_failure(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Expired)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
            PaymentStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    /// Weak back-reference to the booking this attempt pays for
    pub booking_id: i64,
    pub order_code: OrderCode,
    /// The gateway's payment-link id, once one was issued
    pub link_id: Option<String>,
    /// Negative for refund rows
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Raw gateway payload recorded at the terminal transition. Opaque; never parsed for decisions.
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_refund(&self) -> bool {
        self.amount.is_negative()
    }
}

//--------------------------------------     NewPayment      ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub booking_id: i64,
    pub order_code: OrderCode,
    pub link_id: Option<String>,
    pub amount: Money,
    pub currency: String,
}

impl NewPayment {
    pub fn new(booking_id: i64, order_code: OrderCode, amount: Money) -> Self {
        Self { booking_id, order_code, link_id: None, amount, currency: VND_CURRENCY_CODE.to_string() }
    }

    pub fn with_link_id<S: Into<String>>(mut self, link_id: S) -> Self {
        self.link_id = Some(link_id.into());
        self
    }
}
