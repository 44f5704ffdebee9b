use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use bkg_common::{Money, VND_CURRENCY_CODE};
use booking_engine::{
    db_types::{Booking, BookingStatus, OrderCode, Payment, PaymentStatus},
    events::{EventHandlers, EventHooks},
    BookingFlowApi,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use log::debug;
use serde::Serialize;

use super::mocks::MockBookingBackend;
use crate::{
    auth::{REQUESTER_ID_HEADER, REQUESTER_ROLE_HEADER},
    config::ServerOptions,
};

// Wires a mock backend into a flow api the same way the server does at startup.
pub fn flow_api(backend: MockBookingBackend) -> BookingFlowApi<MockBookingBackend> {
    let handlers = EventHandlers::new(16, EventHooks::default());
    let api = BookingFlowApi::new(backend, handlers.producers());
    handlers.start_handlers();
    api
}

pub fn server_options() -> ServerOptions {
    ServerOptions { hold_duration: Duration::seconds(120), use_x_forwarded_for: false, use_forwarded: false }
}

fn with_identity(req: TestRequest, requester: Option<(&str, &str)>) -> TestRequest {
    match requester {
        Some((id, role)) => req.insert_header((REQUESTER_ID_HEADER, id)).insert_header((REQUESTER_ROLE_HEADER, role)),
        None => req,
    }
}

async fn run_request(
    req: actix_http::Request,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn get_request(
    requester: Option<(&str, &str)>,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = with_identity(TestRequest::get().uri(path), requester).to_request();
    run_request(req, configure).await
}

pub async fn post_request<T: Serialize>(
    requester: Option<(&str, &str)>,
    path: &str,
    body: &T,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = with_identity(TestRequest::post().uri(path), requester).set_json(body).to_request();
    run_request(req, configure).await
}

pub async fn post_empty(
    requester: Option<(&str, &str)>,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = with_identity(TestRequest::post().uri(path), requester).to_request();
    run_request(req, configure).await
}

/// A fully deterministic booking, for exact-JSON assertions. Belongs to alice.
pub fn fixed_booking(id: i64, status: BookingStatus) -> Booking {
    Booking {
        id,
        resource_id: "room-101".to_string(),
        requester_id: "alice".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 7, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 7, 12).unwrap(),
        participant_count: 1,
        amount: Money::from(600_000),
        status,
        expires_at: None,
        cancel_reason: None,
        cancelled_by: None,
        cancelled_at: None,
        created_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
    }
}

/// A live hold with plenty of time left on the clock.
pub fn held_booking(id: i64) -> Booking {
    let mut booking = fixed_booking(id, BookingStatus::Reserved);
    booking.expires_at = Some(Utc::now() + Duration::minutes(10));
    booking
}

pub fn pending_payment(booking_id: i64, code: &str) -> Payment {
    Payment {
        id: 1,
        booking_id,
        order_code: OrderCode::from(code.to_string()),
        link_id: Some("lnk_1".to_string()),
        amount: Money::from(600_000),
        currency: VND_CURRENCY_CODE.to_string(),
        status: PaymentStatus::Pending,
        paid_at: None,
        evidence: None,
        created_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 5, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 5, 0).unwrap(),
    }
}

pub fn completed_payment(booking_id: i64, code: &str) -> Payment {
    let mut payment = pending_payment(booking_id, code);
    payment.status = PaymentStatus::Completed;
    payment.paid_at = Some(Utc.with_ymd_and_hms(2025, 7, 1, 9, 6, 0).unwrap());
    payment.updated_at = Utc.with_ymd_and_hms(2025, 7, 1, 9, 6, 0).unwrap();
    payment
}
