//! Gateway webhook handlers.
//!
//! QPay pushes a signed notification whenever a payment link reaches a terminal state. The
//! signature middleware has already authenticated the body by the time a handler here runs, so
//! webhook handlers trust their input and concentrate on mapping the verdict onto the engine's
//! reconciliation.

use actix_web::{web, HttpRequest, HttpResponse};
use booking_engine::{db_types::OrderCode, BookingFlowApi, GatewayVerdict, ReconcileOutcome, ReservationDatabase, ReservationError};
use chrono::Utc;
use log::*;
use qpay_tools::{QPayLinkStatus, WebhookEvent};

use crate::{config::ServerOptions, data_objects::JsonResponse, helpers::get_remote_ip, route};

route!(qpay_webhook => Post "/qpay" impl ReservationDatabase);
/// The push half of payment reconciliation.
///
/// Runs the same `reconcile_payment` call as the status poll, so double deliveries and
/// webhook-vs-poll races settle on one winner inside the engine. Business outcomes always answer
/// 200: QPay retries any other status, and retrying a processed verdict can never do more than a
/// no-op here. Only the signature middleware rejects with a non-2xx code.
pub async fn qpay_webhook<B: ReservationDatabase>(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    api: web::Data<BookingFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let event = body.into_inner();
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("🏦️ Webhook for [{}] (status code {}) from {peer}", event.order_code, event.status_code);
    let verdict = match event.link_status() {
        QPayLinkStatus::Paid => GatewayVerdict::Paid { paid_at: Utc::now() },
        QPayLinkStatus::Cancelled => GatewayVerdict::Cancelled,
        QPayLinkStatus::Expired => GatewayVerdict::Expired,
        // Webhooks only fire on terminal transitions. Anything unrecognised counts as a failure.
        _ => GatewayVerdict::Failed,
    };
    let code = OrderCode::from(event.order_code.clone());
    let evidence = serde_json::to_string(&event).unwrap_or_else(|e| e.to_string());
    // Must always respond in the 200 range, otherwise QPay keeps retrying the delivery.
    let result = match api.reconcile_payment(&code, verdict, &evidence).await {
        Ok(outcome @ ReconcileOutcome::Confirmed(_)) => {
            info!("🏦️ {outcome}");
            JsonResponse::success(outcome.to_string())
        },
        Ok(ReconcileOutcome::AlreadyFinalized(booking)) => {
            info!("🏦️ Duplicate delivery for [{code}]. Booking #{} is {}.", booking.id, booking.status);
            JsonResponse::success("Payment already finalized.")
        },
        Ok(outcome @ ReconcileOutcome::HoldLapsed(_)) => {
            warn!("🏦️ {outcome}");
            JsonResponse::success(outcome.to_string())
        },
        Ok(ReconcileOutcome::PaymentFailed { payment, .. }) => {
            info!("🏦️ Payment [{code}] recorded as {}.", payment.status);
            JsonResponse::success(format!("Payment recorded as {}.", payment.status))
        },
        Err(ReservationError::PaymentNotFound(code)) => {
            warn!("🏦️ Webhook for unknown order code [{code}]. Ignoring.");
            JsonResponse::failure(format!("No payment with order code [{code}]."))
        },
        Err(e) => {
            warn!("🏦️ Could not process the webhook for [{code}]. {e}");
            JsonResponse::failure(format!("Could not process the webhook. {e}"))
        },
    };
    HttpResponse::Ok().json(result)
}
