//! `SqliteDatabase` is a concrete implementation of a booking engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Every state transition is a conditional update executed by SQLite
//! itself; no method holds an in-process lock, so any number of processes can share one database
//! file and the races still resolve correctly.
use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::*;
use sqlx::{Error as SqlxError, SqlitePool};

use super::db::{bookings, db_url, new_pool, payments};
use crate::{
    bke_api::booking_objects::BookingQueryFilter,
    db_types::{Booking, BookingStatus, CancelReason, NewBooking, NewPayment, OrderCode, Payment, PaymentStatus},
    traits::{BookingApiError, BookingManagement, ConfirmationOutcome, ReservationDatabase, ReservationError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the `TBS_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, SqlxError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqlxError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), SqlxError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await.map_err(|e| SqlxError::Migrate(Box::new(e)))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }
}

impl BookingManagement for SqliteDatabase {
    async fn fetch_booking_by_id(&self, id: i64) -> Result<Option<Booking>, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        let booking = bookings::fetch_booking_by_id(id, &mut conn).await?;
        Ok(booking)
    }

    async fn fetch_bookings_for_requester(&self, requester_id: &str) -> Result<Vec<Booking>, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        let bookings = bookings::fetch_bookings_for_requester(requester_id, &mut conn).await?;
        Ok(bookings)
    }

    async fn search_bookings(&self, query: BookingQueryFilter) -> Result<Vec<Booking>, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        trace!("🗃️ Searching bookings: {query}");
        let bookings = bookings::search_bookings(query, &mut conn).await?;
        Ok(bookings)
    }

    async fn fetch_payment_by_order_code(&self, code: &OrderCode) -> Result<Option<Payment>, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_order_code(code, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_booking(booking_id, &mut conn).await?;
        Ok(payments)
    }

    async fn interval_is_free(
        &self,
        resource_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        excluding: Option<i64>,
    ) -> Result<bool, BookingApiError> {
        let mut conn = self.pool.acquire().await?;
        let free = bookings::interval_is_free(resource_id, start, end, excluding, &mut conn).await?;
        Ok(free)
    }
}

impl ReservationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_reservation(&self, booking: NewBooking, hold: Duration) -> Result<Booking, ReservationError> {
        let mut conn = self.pool.acquire().await?;
        let expires_at = Utc::now() + hold;
        let resource_id = booking.resource_id.clone();
        let booking = bookings::insert_reservation(booking, expires_at, &mut conn).await?;
        match booking {
            Some(booking) => {
                debug!("🗃️ Booking #{} saved. {} is held until {expires_at}", booking.id, booking.resource_id);
                Ok(booking)
            },
            None => {
                debug!("🗃️ Reservation on {resource_id} refused: the interval overlaps an active booking");
                Err(ReservationError::ResourceUnavailable)
            },
        }
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, ReservationError> {
        let mut tx = self.pool.begin().await?;
        let booking = bookings::fetch_booking_by_id(payment.booking_id, &mut tx)
            .await?
            .ok_or(ReservationError::BookingNotFound(payment.booking_id))?;
        // Collection attempts only make sense against a live hold. Refund rows are written after
        // cancellation, so they skip the status guard.
        if !payment.amount.is_negative() && booking.status != BookingStatus::Reserved {
            return Err(ReservationError::InvalidBooking(format!(
                "payment links can only be issued while a booking is Reserved. Booking #{} is {}",
                booking.id, booking.status
            )));
        }
        let payment = payments::insert_payment(payment, &mut tx).await?;
        debug!("🗃️ Payment [{}] of {} recorded for booking #{}", payment.order_code, payment.amount, booking.id);
        tx.commit().await?;
        Ok(payment)
    }

    async fn supersede_payment(&self, code: &OrderCode) -> Result<Payment, ReservationError> {
        let mut conn = self.pool.acquire().await?;
        let superseded = payments::fail_payment(code, PaymentStatus::Cancelled, "superseded", &mut conn).await?;
        match superseded {
            Some(payment) => {
                debug!("🗃️ Payment [{code}] cancelled in favour of a new link");
                Ok(payment)
            },
            None => match payments::fetch_payment_by_order_code(code, &mut conn).await? {
                Some(_) => Err(ReservationError::PaymentModificationNoOp),
                None => Err(ReservationError::PaymentNotFound(code.clone())),
            },
        }
    }

    async fn settle_payment(
        &self,
        code: &OrderCode,
        evidence: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ConfirmationOutcome, ReservationError> {
        let mut tx = self.pool.begin().await?;
        // The CAS is the transaction's first statement, so concurrent deliveries serialize on the
        // datastore's write lock: the loser's update runs after the winner commits and matches
        // nothing, instead of failing on a stale read snapshot.
        let settled = payments::settle_payment(code, evidence, paid_at, &mut tx).await?;
        let outcome = match settled {
            Some(payment) => {
                let booking_id = payment.booking_id;
                match bookings::confirm_hold(booking_id, &mut tx).await? {
                    Some(booking) => {
                        debug!("🗃️ Payment [{code}] settled and booking #{booking_id} confirmed");
                        ConfirmationOutcome::Confirmed(booking)
                    },
                    None => {
                        // The hold was released first. The settled payment row stays: the gateway's
                        // word that money moved outranks our bookkeeping.
                        debug!("🗃️ Payment [{code}] settled but the hold on booking #{booking_id} had lapsed");
                        let booking = bookings::fetch_booking_by_id(booking_id, &mut tx)
                            .await?
                            .ok_or(ReservationError::BookingNotFound(booking_id))?;
                        ConfirmationOutcome::HoldLapsed(booking)
                    },
                }
            },
            None => {
                // Lost the settlement race (or this is a duplicate delivery). Nothing written.
                let payment = payments::fetch_payment_by_order_code(code, &mut tx)
                    .await?
                    .ok_or_else(|| ReservationError::PaymentNotFound(code.clone()))?;
                trace!("🗃️ Payment [{code}] was already {}. No-op", payment.status);
                let booking = bookings::fetch_booking_by_id(payment.booking_id, &mut tx)
                    .await?
                    .ok_or(ReservationError::BookingNotFound(payment.booking_id))?;
                ConfirmationOutcome::AlreadyFinalized(booking)
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn fail_payment(
        &self,
        code: &OrderCode,
        new_status: PaymentStatus,
        evidence: &str,
    ) -> Result<Payment, ReservationError> {
        if !new_status.is_failure() {
            return Err(ReservationError::InvalidBooking(format!(
                "{new_status} is not a failure state. Settlement goes through settle_payment"
            )));
        }
        let mut conn = self.pool.acquire().await?;
        let failed = payments::fail_payment(code, new_status, evidence, &mut conn).await?;
        match failed {
            Some(payment) => {
                debug!("🗃️ Payment [{code}] recorded as {new_status}");
                Ok(payment)
            },
            None => match payments::fetch_payment_by_order_code(code, &mut conn).await? {
                Some(_) => Err(ReservationError::PaymentModificationNoOp),
                None => Err(ReservationError::PaymentNotFound(code.clone())),
            },
        }
    }

    async fn fetch_due_holds(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, ReservationError> {
        let mut conn = self.pool.acquire().await?;
        let due = bookings::fetch_due_holds(now, &mut conn).await?;
        Ok(due)
    }

    async fn expire_hold(&self, booking_id: i64, now: DateTime<Utc>) -> Result<Option<Booking>, ReservationError> {
        let mut tx = self.pool.begin().await?;
        let expired = bookings::expire_hold(booking_id, now, &mut tx).await?;
        if let Some(booking) = &expired {
            if let Some(payment) = payments::void_live_payment(booking.id, PaymentStatus::Expired, &mut tx).await? {
                debug!("🗃️ Live payment [{}] expired along with its hold", payment.order_code);
            }
        }
        tx.commit().await?;
        Ok(expired)
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        cancelled_by: &str,
        reason: CancelReason,
    ) -> Result<Booking, ReservationError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = bookings::cancel_booking(booking_id, cancelled_by, reason, Utc::now(), &mut tx).await?;
        let booking = match cancelled {
            Some(booking) => booking,
            None => {
                let err = match bookings::fetch_booking_by_id(booking_id, &mut tx).await? {
                    Some(_) => ReservationError::BookingModificationNoOp,
                    None => ReservationError::BookingNotFound(booking_id),
                };
                return Err(err);
            },
        };
        if let Some(payment) = payments::void_live_payment(booking_id, PaymentStatus::Cancelled, &mut tx).await? {
            debug!("🗃️ Live payment [{}] cancelled along with booking #{booking_id}", payment.order_code);
        }
        tx.commit().await?;
        debug!("🗃️ Booking #{booking_id} cancelled by {cancelled_by} ({reason})");
        Ok(booking)
    }

    async fn complete_booking(&self, booking_id: i64) -> Result<Booking, ReservationError> {
        let mut conn = self.pool.acquire().await?;
        match bookings::complete_booking(booking_id, &mut conn).await? {
            Some(booking) => Ok(booking),
            None => match bookings::fetch_booking_by_id(booking_id, &mut conn).await? {
                Some(_) => Err(ReservationError::BookingModificationNoOp),
                None => Err(ReservationError::BookingNotFound(booking_id)),
            },
        }
    }

    async fn force_booking_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        forced_by: &str,
    ) -> Result<Booking, ReservationError> {
        let mut conn = self.pool.acquire().await?;
        let booking = bookings::force_status(booking_id, status, expires_at, forced_by, &mut conn)
            .await?
            .ok_or(ReservationError::BookingNotFound(booking_id))?;
        warn!("🗃️ Booking #{booking_id} forced to {status} by {forced_by}");
        Ok(booking)
    }

    async fn close(&mut self) -> Result<(), ReservationError> {
        self.pool.close().await;
        Ok(())
    }
}
