use std::fmt::Debug;

use bkg_common::Money;
use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    bke_api::{
        booking_objects::{CancellationResult, GatewayVerdict, ReconcileOutcome, SweepResult},
        refund::RefundPolicy,
    },
    db_types::{
        Actor,
        ActorRole,
        Booking,
        BookingStatus,
        CancelReason,
        NewBooking,
        NewPayment,
        OrderCode,
        Payment,
        PaymentStatus,
    },
    events::{
        BookingCancelledEvent,
        BookingConfirmedEvent,
        EventProducers,
        HoldExpiredEvent,
        NewBookingEvent,
        PaymentFailedEvent,
        PaymentOrphanedEvent,
    },
    helpers::{refund_order_code, validate_reservation_request},
    traits::{ConfirmationOutcome, ReservationDatabase, ReservationError},
};

/// How many times a single hold expiry is attempted before the sweeper gives up on it for this
/// pass. Retries only fire for transient database contention.
const MAX_EXPIRY_ATTEMPTS: u32 = 3;
const EXPIRY_RETRY_BACKOFF_MS: u64 = 50;

/// `BookingFlowApi` is the primary API for the booking lifecycle: placing holds, reconciling
/// gateway payment evidence, sweeping expired holds, and cancellations.
///
/// Every transition delegates to a conditional update in the backend, so any number of server
/// instances can run this API against one database and each race still produces exactly one
/// winner. The API's own job is sequencing, validation, refund arithmetic and event emission.
pub struct BookingFlowApi<B> {
    db: B,
    producers: EventProducers,
    refund_policy: RefundPolicy,
    auto_refunds: bool,
}

impl<B> Debug for BookingFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BookingFlowApi")
    }
}

impl<B> BookingFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, refund_policy: RefundPolicy::default(), auto_refunds: false }
    }

    pub fn with_refund_policy(mut self, policy: RefundPolicy) -> Self {
        self.refund_policy = policy;
        self
    }

    /// When enabled, a cancellation that is owed money also writes the refund payment row.
    /// Disbursing the refund through the gateway remains a separate, human-supervised step.
    pub fn with_auto_refunds(mut self, enabled: bool) -> Self {
        self.auto_refunds = enabled;
        self
    }

    pub fn refund_policy(&self) -> &RefundPolicy {
        &self.refund_policy
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> BookingFlowApi<B>
where B: ReservationDatabase
{
    /// Places a time-bound hold on the requested interval.
    ///
    /// The request is validated first (sane dates, at least one participant, non-negative amount),
    /// then handed to the backend, whose fused conflict-check-and-insert decides the reservation
    /// race. On success the booking is `Reserved` with `expires_at = now + hold` and a
    /// [`NewBookingEvent`] fires.
    pub async fn create_reservation(&self, booking: NewBooking, hold: Duration) -> Result<Booking, ReservationError> {
        validate_reservation_request(&booking, Utc::now().date_naive())?;
        let booking = self.db.create_reservation(booking, hold).await?;
        info!("🛎️📦️ {booking} held until {}", booking.expires_at.map(|t| t.to_string()).unwrap_or_default());
        self.call_new_booking_hook(&booking).await;
        Ok(booking)
    }

    /// The confirmation reconciler. Both delivery paths (signed webhook and status poll) call this
    /// with the gateway's terminal verdict for a payment; nothing else ever settles a payment.
    ///
    /// For a `Paid` verdict the backend runs the settlement CAS pair. The winning call returns
    /// `Confirmed` and fires [`BookingConfirmedEvent`] exactly once; every other delivery of the
    /// same evidence returns `AlreadyFinalized` without writing. If the hold had already been
    /// released, the money is still recorded and `HoldLapsed` comes back with a
    /// [`PaymentOrphanedEvent`] for the support queue.
    ///
    /// For a failure verdict the payment moves to the matching terminal state and the booking is
    /// left alone, so the requester can retry paying until the hold itself expires.
    pub async fn reconcile_payment(
        &self,
        code: &OrderCode,
        verdict: GatewayVerdict,
        evidence: &str,
    ) -> Result<ReconcileOutcome, ReservationError> {
        trace!("🛎️💳️ Reconciling gateway verdict ({verdict}) for payment [{code}]");
        match verdict {
            GatewayVerdict::Paid { paid_at } => self.reconcile_settlement(code, evidence, paid_at).await,
            other => {
                let new_status = other.failure_status().unwrap_or(PaymentStatus::Failed);
                self.reconcile_failure(code, new_status, evidence).await
            },
        }
    }

    async fn reconcile_settlement(
        &self,
        code: &OrderCode,
        evidence: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReservationError> {
        let outcome = self.db.settle_payment(code, evidence, paid_at).await?;
        match outcome {
            ConfirmationOutcome::Confirmed(booking) => {
                let payment = self.fetch_payment(code).await?;
                info!("🛎️💳️ {booking} confirmed by payment [{code}]");
                self.call_booking_confirmed_hook(&booking, &payment).await;
                Ok(ReconcileOutcome::Confirmed(booking))
            },
            ConfirmationOutcome::AlreadyFinalized(booking) => {
                debug!("🛎️💳️ Duplicate delivery for payment [{code}]. Booking #{} is {}", booking.id, booking.status);
                Ok(ReconcileOutcome::AlreadyFinalized(booking))
            },
            ConfirmationOutcome::HoldLapsed(booking) => {
                let payment = self.fetch_payment(code).await?;
                warn!(
                    "🛎️💳️ Payment [{code}] settled after the hold on booking #{} was released. The money is \
                     recorded; support needs to refund or re-book.",
                    booking.id
                );
                self.call_payment_orphaned_hook(&booking, &payment).await;
                Ok(ReconcileOutcome::HoldLapsed(booking))
            },
        }
    }

    async fn reconcile_failure(
        &self,
        code: &OrderCode,
        new_status: PaymentStatus,
        evidence: &str,
    ) -> Result<ReconcileOutcome, ReservationError> {
        match self.db.fail_payment(code, new_status, evidence).await {
            Ok(payment) => {
                let booking = self.fetch_booking(payment.booking_id).await?;
                info!(
                    "🛎️💳️ Payment [{code}] for booking #{} recorded as {new_status}. The hold stands until {}",
                    booking.id,
                    booking.expires_at.map(|t| t.to_string()).unwrap_or_else(|| "it is released".to_string())
                );
                self.call_payment_failed_hook(&booking, &payment).await;
                Ok(ReconcileOutcome::PaymentFailed { booking, payment })
            },
            // Duplicate failure deliveries, or a failure notice arriving after settlement.
            Err(ReservationError::PaymentModificationNoOp) => {
                let payment = self.fetch_payment(code).await?;
                let booking = self.fetch_booking(payment.booking_id).await?;
                debug!("🛎️💳️ Payment [{code}] is already {}. Ignoring {new_status} verdict", payment.status);
                Ok(ReconcileOutcome::AlreadyFinalized(booking))
            },
            Err(e) => Err(e),
        }
    }

    /// One sweeper pass: releases every hold whose deadline has passed as of `now`.
    ///
    /// Each overdue hold is expired individually through a conditional update, so a hold that gets
    /// settled or cancelled mid-pass is simply skipped (`lost_races`). Transient database
    /// contention is retried a few times with backoff; a hold that still cannot be updated is
    /// counted in `failed` and stays due for the next pass. The pass itself never aborts early.
    pub async fn sweep_expired_holds(&self, now: DateTime<Utc>) -> Result<SweepResult, ReservationError> {
        let due = self.db.fetch_due_holds(now).await?;
        let mut result = SweepResult::default();
        if due.is_empty() {
            trace!("🛎️🧹️ No holds due at {now}");
            return Ok(result);
        }
        debug!("🛎️🧹️ {} hold(s) due for expiry at {now}", due.len());
        for hold in due {
            match self.expire_with_retry(hold.id, now).await {
                Ok(Some(booking)) => {
                    info!("🛎️🧹️ {booking} expired. The interval is open again");
                    self.call_hold_expired_hook(&booking).await;
                    result.expired.push(booking);
                },
                Ok(None) => {
                    debug!("🛎️🧹️ Booking #{} was settled or cancelled before expiry could land", hold.id);
                    result.lost_races += 1;
                },
                Err(e) => {
                    warn!("🛎️🧹️ Could not expire the hold on booking #{}. It stays due for the next pass. {e}", hold.id);
                    result.failed += 1;
                },
            }
        }
        Ok(result)
    }

    async fn expire_with_retry(
        &self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, ReservationError> {
        let mut attempts = 0;
        loop {
            match self.db.expire_hold(booking_id, now).await {
                Err(e) if e.is_transient() && attempts + 1 < MAX_EXPIRY_ATTEMPTS => {
                    attempts += 1;
                    let backoff = std::time::Duration::from_millis(EXPIRY_RETRY_BACKOFF_MS << attempts);
                    debug!(
                        "🛎️🧹️ Transient error expiring booking #{booking_id} (attempt {attempts}): {e}. Retrying \
                         in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                },
                other => return other,
            }
        }
    }

    /// Explicit cancellation on behalf of `actor`.
    ///
    /// Guests may only cancel their own bookings; providers and admins may cancel any. The refund
    /// owed is computed from the cancellation policy against the collected payment, if there is
    /// one, and is always reported. The refund *row* is only written when automatic refunds are
    /// enabled and the amount is positive.
    pub async fn cancel_booking(&self, booking_id: i64, actor: &Actor) -> Result<CancellationResult, ReservationError> {
        let booking = self.fetch_booking(booking_id).await?;
        if !actor.may_act_for(&booking.requester_id) {
            warn!(
                "🛎️❌️ {} ({}) tried to cancel booking #{booking_id}, which belongs to {}",
                actor.id, actor.role, booking.requester_id
            );
            return Err(ReservationError::Forbidden(actor.id.clone()));
        }
        let booking = self.db.cancel_booking(booking_id, &actor.id, CancelReason::from(actor.role)).await?;
        let collected = self
            .db
            .fetch_payments_for_booking(booking_id)
            .await?
            .into_iter()
            .find(|p| p.status == PaymentStatus::Completed && !p.is_refund());
        let now = Utc::now();
        let refund_due = collected
            .as_ref()
            .map(|p| self.refund_policy.refund_due(p.amount, now, booking.service_start()))
            .unwrap_or_default();
        let refund = if self.auto_refunds && refund_due > Money::default() {
            let refund_row =
                self.db.create_payment(NewPayment::new(booking_id, OrderCode::from(refund_order_code()), -refund_due));
            match refund_row.await {
                Ok(row) => {
                    info!("🛎️❌️ Refund of {refund_due} recorded for booking #{booking_id} as [{}]", row.order_code);
                    Some(row)
                },
                Err(e) => {
                    // The cancellation has committed and stands; only the refund row is missing.
                    error!(
                        "🛎️❌️ Booking #{booking_id} is cancelled but the refund row for {refund_due} could not be \
                         written: {e}. Record it manually."
                    );
                    return Err(e);
                },
            }
        } else {
            None
        };
        info!("🛎️❌️ {booking} cancelled by {} ({}). Refund due: {refund_due}", actor.id, actor.role);
        self.call_booking_cancelled_hook(&booking, refund_due).await;
        Ok(CancellationResult { booking, refund_due, refund })
    }

    /// Marks a confirmed booking as consumed. Guests do not get to declare their own stay
    /// complete; this is for providers and admins.
    pub async fn complete_booking(&self, booking_id: i64, actor: &Actor) -> Result<Booking, ReservationError> {
        if actor.role == ActorRole::Guest {
            return Err(ReservationError::Forbidden(actor.id.clone()));
        }
        let booking = self.db.complete_booking(booking_id).await?;
        info!("🛎️🏁️ {booking} marked completed by {} ({})", actor.id, actor.role);
        Ok(booking)
    }

    /// Administrative status override, with none of the lifecycle guards. Admins only.
    ///
    /// Forcing back to `Reserved` needs a fresh expiry deadline, since a hold without one cannot
    /// be swept.
    pub async fn force_booking_status(
        &self,
        booking_id: i64,
        new_status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<Booking, ReservationError> {
        if actor.role != ActorRole::Admin {
            return Err(ReservationError::Forbidden(actor.id.clone()));
        }
        if new_status == BookingStatus::Reserved && expires_at.is_none() {
            return Err(ReservationError::InvalidBooking(
                "forcing a booking back to Reserved requires a new expiry deadline".to_string(),
            ));
        }
        let booking = self.db.force_booking_status(booking_id, new_status, expires_at, &actor.id).await?;
        warn!("🛎️🔧️ Booking #{booking_id} forced to {new_status} by {}", actor.id);
        Ok(booking)
    }

    async fn fetch_booking(&self, booking_id: i64) -> Result<Booking, ReservationError> {
        self.db.fetch_booking_by_id(booking_id).await?.ok_or(ReservationError::BookingNotFound(booking_id))
    }

    async fn fetch_payment(&self, code: &OrderCode) -> Result<Payment, ReservationError> {
        self.db.fetch_payment_by_order_code(code).await?.ok_or_else(|| ReservationError::PaymentNotFound(code.clone()))
    }

    async fn call_new_booking_hook(&self, booking: &Booking) {
        trace!("🛎️ Notifying new booking subscribers");
        self.producers.new_booking_producer.publish_event(NewBookingEvent::new(booking.clone())).await;
    }

    async fn call_booking_confirmed_hook(&self, booking: &Booking, payment: &Payment) {
        trace!("🛎️ Notifying booking confirmed subscribers");
        self.producers
            .booking_confirmed_producer
            .publish_event(BookingConfirmedEvent::new(booking.clone(), payment.clone()))
            .await;
    }

    async fn call_hold_expired_hook(&self, booking: &Booking) {
        trace!("🛎️ Notifying hold expired subscribers");
        self.producers.hold_expired_producer.publish_event(HoldExpiredEvent::new(booking.clone())).await;
    }

    async fn call_payment_failed_hook(&self, booking: &Booking, payment: &Payment) {
        trace!("🛎️ Notifying payment failed subscribers");
        self.producers
            .payment_failed_producer
            .publish_event(PaymentFailedEvent::new(booking.clone(), payment.clone()))
            .await;
    }

    async fn call_booking_cancelled_hook(&self, booking: &Booking, refund_due: Money) {
        trace!("🛎️ Notifying booking cancelled subscribers");
        self.producers
            .booking_cancelled_producer
            .publish_event(BookingCancelledEvent::new(booking.clone(), refund_due))
            .await;
    }

    async fn call_payment_orphaned_hook(&self, booking: &Booking, payment: &Payment) {
        trace!("🛎️ Notifying payment orphaned subscribers");
        self.producers
            .payment_orphaned_producer
            .publish_event(PaymentOrphanedEvent::new(booking.clone(), payment.clone()))
            .await;
    }
}
