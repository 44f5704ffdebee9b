//! Request handler definitions
//!
//! Handlers are kept thin: extract and validate the request, call into the booking engine or a
//! collaborator, map the outcome onto an HTTP response. All booking-state decisions belong to the
//! engine; the only business rule that lives up here is pricing a reservation request from the
//! catalog before the engine ever sees it.
//!
//! Handlers are generic over the storage backend and the external collaborators so that endpoint
//! tests can run them against mocks.

use actix_web::{get, web, HttpResponse, Responder};
use booking_engine::{
    db_types::{BookingStatus, NewBooking, NewPayment, OrderCode, PaymentStatus},
    BookingFlowApi,
    BookingManagement,
    BookingQueryApi,
    BookingResult,
    GatewayVerdict,
    ReservationDatabase,
    ReservationError,
};
use chrono::Utc;
use log::*;
use qpay_tools::{helpers::new_order_code, CreatePaymentLinkRequest, PaymentLinkDetail, PaymentLinkProvider, QPayLinkStatus};

use crate::{
    auth::Requester,
    catalog::CatalogApi,
    config::ServerOptions,
    data_objects::{
        AvailabilityParams,
        AvailabilityResponse,
        ForceStatusRequest,
        NewReservationRequest,
        PaymentLinkResponse,
        PaymentStatusResponse,
        ReservationSearchParams,
    },
    errors::ServerError,
};

// Actix cannot register generic handlers directly, so each route gets a tiny zero-sized factory
// struct built by the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// -------------------------------------------   Reservations  -------------------------------------------------

route!(create_reservation => Post "/reservations" impl ReservationDatabase, CatalogApi);
/// Places a time-bound hold on a resource interval.
///
/// The request never carries a price. The catalog is consulted for the per-unit rate and the
/// maintenance flag, the amount is computed as rate × nights × participants, and only then does
/// the engine run its conflict check. A resource under maintenance is refused before anything is
/// written.
pub async fn create_reservation<B, C>(
    requester: Requester,
    body: web::Json<NewReservationRequest>,
    api: web::Data<BookingFlowApi<B>>,
    catalog: web::Data<C>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: ReservationDatabase,
    C: CatalogApi,
{
    let request = body.into_inner();
    debug!("💻️ POST reservation on {} for {}", request.resource_id, requester.id);
    let info = catalog.resource_info(&request.resource_id).await?;
    if info.under_maintenance {
        info!("💻️ {} is under maintenance. Refusing the reservation request.", request.resource_id);
        return Err(ServerError::ResourceUnderMaintenance);
    }
    if let Some(cap) = info.max_participants {
        if request.participant_count > cap {
            return Err(ServerError::InvalidRequestBody(format!(
                "{} takes at most {cap} participants.",
                request.resource_id
            )));
        }
    }
    let booking = NewBooking::new(request.resource_id, requester.id.clone(), request.start_date, request.end_date)
        .with_participants(request.participant_count);
    // Interval validation happens in the engine, where it also guards direct API users.
    let amount = info.rate_per_unit * booking.nights() * request.participant_count;
    let booking = booking.with_amount(amount);
    let booking = api.create_reservation(booking, options.hold_duration).await.map_err(|e| {
        debug!("💻️ Reservation for {} refused. {e}", requester.id);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(booking_by_id => Get "/reservations/{id}" impl BookingManagement);
/// Fetches a single booking. Guests may only read their own; staff may read any.
pub async fn booking_by_id<B: BookingManagement>(
    requester: Requester,
    path: web::Path<i64>,
    api: web::Data<BookingQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET booking #{id} for {}", requester.id);
    let booking = api
        .booking_by_id(id)
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch booking #{id}. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Booking #{id} does not exist.")))?;
    if !requester.as_actor().may_act_for(&booking.requester_id) {
        return Err(ServerError::InsufficientPermissions(requester.id));
    }
    Ok(HttpResponse::Ok().json(booking))
}

route!(my_reservations => Get "/reservations" impl BookingManagement);
/// The caller's own booking history, with optional narrowing filters in the query string.
pub async fn my_reservations<B: BookingManagement>(
    requester: Requester,
    query: web::Query<ReservationSearchParams>,
    api: web::Data<BookingQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = query.into_inner();
    debug!("💻️ GET reservations for {}", requester.id);
    let result = if params.is_empty() {
        api.history_for_requester(&requester.id).await.map_err(|e| {
            debug!("💻️ Could not fetch bookings for {}. {e}", requester.id);
            ServerError::BackendError(e.to_string())
        })?
    } else {
        // Callers are pinned to their own history regardless of role. Cross-requester reporting
        // is a back-office concern, not a server route.
        let filter = params.into_filter().with_requester_id(requester.id.clone());
        let bookings = api.search_bookings(filter).await.map_err(|e| {
            debug!("💻️ Booking search for {} failed. {e}", requester.id);
            ServerError::BackendError(e.to_string())
        })?;
        BookingResult::new(requester.id.clone(), bookings)
    };
    Ok(HttpResponse::Ok().json(result))
}

// ---------------------------------------------   Payments  ---------------------------------------------------

route!(create_payment => Post "/reservations/{id}/payment" impl ReservationDatabase, PaymentLinkProvider);
/// Issues a payment link for a held booking.
///
/// Each call produces a fresh order code. If a live link already exists it is superseded first:
/// cancelled at the gateway (best effort) and marked `Cancelled` locally, so that at most one
/// collectable link exists per booking. The link expires together with the hold.
pub async fn create_payment<B, P>(
    requester: Requester,
    path: web::Path<i64>,
    api: web::Data<BookingFlowApi<B>>,
    gateway: web::Data<P>,
) -> Result<HttpResponse, ServerError>
where
    B: ReservationDatabase,
    P: PaymentLinkProvider,
{
    let booking_id = path.into_inner();
    debug!("💻️ POST payment link for booking #{booking_id}");
    let booking = api
        .db()
        .fetch_booking_by_id(booking_id)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Booking #{booking_id} does not exist.")))?;
    if !requester.as_actor().may_act_for(&booking.requester_id) {
        return Err(ServerError::InsufficientPermissions(requester.id));
    }
    match (booking.status, booking.expires_at) {
        (BookingStatus::Reserved, Some(deadline)) if deadline > Utc::now() => {},
        (BookingStatus::Reserved, _) => {
            return Err(ServerError::InvalidState(format!(
                "The hold on booking #{booking_id} has lapsed. Make a new reservation."
            )));
        },
        (status, _) => {
            return Err(ServerError::InvalidState(format!("Booking #{booking_id} is {status} and cannot be paid.")));
        },
    }
    supersede_live_payment(booking_id, api.as_ref(), gateway.as_ref()).await?;
    let code = OrderCode::from(new_order_code());
    let link_request = CreatePaymentLinkRequest {
        order_code: code.to_string(),
        amount: booking.amount,
        description: format!("Booking #{booking_id}: {} {} to {}", booking.resource_id, booking.start_date, booking.end_date),
        buyer_name: None,
        buyer_email: None,
        return_url: None,
        cancel_url: None,
        expired_at: booking.expires_at,
    };
    let link = gateway.create_payment_link(&link_request).await.map_err(|e| {
        warn!("💻️ The gateway refused a payment link for booking #{booking_id}. {e}");
        ServerError::PaymentGatewayError(e.to_string())
    })?;
    let payment = NewPayment::new(booking_id, code, booking.amount).with_link_id(&link.link_id);
    let payment = api.db().create_payment(payment).await?;
    info!("💻️ Payment link [{}] issued for booking #{booking_id}", payment.order_code);
    let response = PaymentLinkResponse {
        order_code: payment.order_code.to_string(),
        checkout_url: link.checkout_url,
        qr_code: link.qr_code,
        amount: payment.amount,
        expires_at: booking.expires_at,
    };
    Ok(HttpResponse::Ok().json(response))
}

async fn supersede_live_payment<B, P>(booking_id: i64, api: &BookingFlowApi<B>, gateway: &P) -> Result<(), ServerError>
where
    B: ReservationDatabase,
    P: PaymentLinkProvider,
{
    let live = api
        .db()
        .fetch_payments_for_booking(booking_id)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .into_iter()
        .find(|p| p.status == PaymentStatus::Pending && !p.is_refund());
    let Some(old) = live else {
        return Ok(());
    };
    debug!("💻️ Booking #{booking_id} has a live link [{}]. Superseding it.", old.order_code);
    if let Err(e) = gateway.cancel_payment_link(old.order_code.as_str(), Some("superseded by a new link")).await {
        // The local row is what the engine trusts. A stale upstream link pays into a cancelled
        // payment and reconciles as a no-op.
        warn!("💻️ Upstream cancellation of [{}] failed. {e}", old.order_code);
    }
    match api.db().supersede_payment(&old.order_code).await {
        Ok(_) => Ok(()),
        // The old attempt went terminal while we were looking at it. The booking-state guard in
        // create_payment rules on what happens next.
        Err(ReservationError::PaymentModificationNoOp) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

route!(payment_status => Get "/payments/{order_code}" impl ReservationDatabase, PaymentLinkProvider);
/// The poll half of payment reconciliation.
///
/// A pending payment triggers a gateway status query, and a terminal gateway verdict runs through
/// exactly the same reconciliation as a webhook delivery, so whichever trigger arrives first wins
/// and the other becomes a no-op. Terminal payments are answered from local state without
/// touching the gateway.
pub async fn payment_status<B, P>(
    requester: Requester,
    path: web::Path<String>,
    api: web::Data<BookingFlowApi<B>>,
    gateway: web::Data<P>,
) -> Result<HttpResponse, ServerError>
where
    B: ReservationDatabase,
    P: PaymentLinkProvider,
{
    let code = OrderCode::from(path.into_inner());
    trace!("💻️ GET payment status for [{code}]");
    let payment = fetch_payment(api.as_ref(), &code).await?;
    let booking = api
        .db()
        .fetch_booking_by_id(payment.booking_id)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Booking #{} does not exist.", payment.booking_id)))?;
    if !requester.as_actor().may_act_for(&booking.requester_id) {
        return Err(ServerError::InsufficientPermissions(requester.id));
    }
    if payment.status.is_terminal() {
        return Ok(HttpResponse::Ok().json(PaymentStatusResponse { payment, booking }));
    }
    let detail = gateway.payment_link_status(code.as_str()).await.map_err(|e| {
        warn!("💻️ Could not poll the gateway for [{code}]. {e}");
        ServerError::PaymentGatewayError(e.to_string())
    })?;
    let Some(verdict) = verdict_from_link(&detail) else {
        trace!("💻️ Link [{code}] is still {:?} at the gateway", detail.status);
        return Ok(HttpResponse::Ok().json(PaymentStatusResponse { payment, booking }));
    };
    let evidence = serde_json::to_string(&detail).unwrap_or_else(|e| e.to_string());
    let outcome = api.reconcile_payment(&code, verdict, &evidence).await?;
    debug!("💻️ Poll for [{code}]: {outcome}");
    let payment = fetch_payment(api.as_ref(), &code).await?;
    let booking = outcome.booking().clone();
    Ok(HttpResponse::Ok().json(PaymentStatusResponse { payment, booking }))
}

async fn fetch_payment<B: ReservationDatabase>(
    api: &BookingFlowApi<B>,
    code: &OrderCode,
) -> Result<booking_engine::db_types::Payment, ServerError> {
    api.db()
        .fetch_payment_by_order_code(code)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment with order code [{code}].")))
}

/// Maps a terminal gateway link state onto the engine's verdict. `None` while the link can still
/// change.
fn verdict_from_link(detail: &PaymentLinkDetail) -> Option<GatewayVerdict> {
    let verdict = match detail.status {
        QPayLinkStatus::Pending | QPayLinkStatus::Processing => return None,
        QPayLinkStatus::Paid => {
            // The settlement instant comes from the latest transaction on the link; the poll
            // timestamp is only a fallback.
            let paid_at = detail.transactions.iter().map(|t| t.transaction_time).max().unwrap_or_else(Utc::now);
            GatewayVerdict::Paid { paid_at }
        },
        QPayLinkStatus::Cancelled => GatewayVerdict::Cancelled,
        QPayLinkStatus::Expired => GatewayVerdict::Expired,
        QPayLinkStatus::Failed => GatewayVerdict::Failed,
    };
    Some(verdict)
}

// ---------------------------------------------   Lifecycle  --------------------------------------------------

route!(cancel_reservation => Post "/reservations/{id}/cancel" impl ReservationDatabase);
/// Cancels a booking. Guests may cancel their own; staff may cancel any. The refund entitlement
/// in the response is computed by the engine's refund policy.
pub async fn cancel_reservation<B: ReservationDatabase>(
    requester: Requester,
    path: web::Path<i64>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    info!("💻️ Cancel request for booking #{booking_id} from {} ({})", requester.id, requester.role);
    let result = api.cancel_booking(booking_id, &requester.as_actor()).await.map_err(|e| {
        debug!("💻️ Could not cancel booking #{booking_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(result))
}

route!(complete_reservation => Post "/reservations/{id}/complete" impl ReservationDatabase);
/// Marks a confirmed booking as consumed. Staff only.
pub async fn complete_reservation<B: ReservationDatabase>(
    requester: Requester,
    path: web::Path<i64>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    debug!("💻️ Complete request for booking #{booking_id} from {} ({})", requester.id, requester.role);
    let booking = api.complete_booking(booking_id, &requester.as_actor()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

route!(availability => Get "/availability" impl BookingManagement);
/// Advisory availability check. A `true` answer can go stale the moment it is produced; the
/// reservation insert remains the only authority.
pub async fn availability<B: BookingManagement>(
    query: web::Query<AvailabilityParams>,
    api: web::Data<BookingQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = query.into_inner();
    if params.end_date <= params.start_date {
        return Err(ServerError::InvalidRequestBody("end_date must be after start_date.".to_string()));
    }
    trace!("💻️ GET availability for {} from {} to {}", params.resource_id, params.start_date, params.end_date);
    let available = api
        .interval_is_free(&params.resource_id, params.start_date, params.end_date)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?;
    let response = AvailabilityResponse {
        resource_id: params.resource_id,
        start_date: params.start_date,
        end_date: params.end_date,
        available,
    };
    Ok(HttpResponse::Ok().json(response))
}

// -----------------------------------------------   Admin  ----------------------------------------------------

route!(force_status => Post "/admin/bookings/{id}/status" impl ReservationDatabase);
/// Administrative escape hatch: moves a booking to an arbitrary status without the usual guards.
/// Admins only. Every use lands in the audit log with the actor and their stated reason.
pub async fn force_status<B: ReservationDatabase>(
    requester: Requester,
    path: web::Path<i64>,
    body: web::Json<ForceStatusRequest>,
    api: web::Data<BookingFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let booking_id = path.into_inner();
    let ForceStatusRequest { status, expires_at, reason } = body.into_inner();
    info!("💻️ Force status request: booking #{booking_id} to {status} by {}", requester.id);
    let booking = api.force_booking_status(booking_id, status, expires_at, &requester.as_actor()).await?;
    info!(
        target: "tbs::audit",
        "{} ({}) forced booking #{booking_id} to {status} at {}. Reason: {reason}",
        requester.id,
        requester.role,
        Utc::now()
    );
    Ok(HttpResponse::Ok().json(booking))
}
