use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
    ResponseError,
};
use bkg_common::Secret;
use booking_engine::{
    db_types::{BookingStatus, PaymentStatus},
    ConfirmationOutcome,
    ReservationError,
};
use qpay_tools::calculate_signature;

use super::{
    helpers::{completed_payment, fixed_booking, flow_api, held_booking, pending_payment, server_options},
    mocks::MockBookingBackend,
};
use crate::{
    middleware::{SignatureMiddlewareFactory, QPAY_SIGNATURE_HEADER},
    qpay_routes::QpayWebhookRoute,
};

// Test-only checksum key. DO NOT re-use it anywhere.
const TEST_KEY: &str = "9e107d9d372bb6826bd81d3542a419d6";

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let _ = env_logger::try_init().ok();
    let err = webhook_request(paid_event("QP123456789A"), None, true, configure_untouched)
        .await
        .expect_err("Expected the delivery to be rejected");
    assert_eq!(err.to_string(), "No webhook signature found.");
}

#[actix_web::test]
async fn forged_signatures_are_rejected() {
    let _ = env_logger::try_init().ok();
    let err = webhook_request(paid_event("QP123456789A"), Some("0badc0de"), true, configure_untouched)
        .await
        .expect_err("Expected the delivery to be rejected");
    assert_eq!(err.to_string(), "Invalid webhook signature.");
}

#[actix_web::test]
async fn signature_failures_answer_401() {
    let _ = env_logger::try_init().ok();
    let err = webhook_request(paid_event("QP123456789A"), Some("0badc0de"), true, configure_untouched)
        .await
        .expect_err("Expected the delivery to be rejected");
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn paid_webhooks_confirm_the_booking() {
    let _ = env_logger::try_init().ok();
    let body = paid_event("QP123456789A");
    let signature = calculate_signature(TEST_KEY, body.as_bytes());
    let (status, body) =
        webhook_request(body, Some(&signature), true, configure_settlement).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Booking #1 confirmed"}"#);
}

#[actix_web::test]
async fn duplicate_deliveries_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = paid_event("QP123456789A");
    let signature = calculate_signature(TEST_KEY, body.as_bytes());
    let (status, body) =
        webhook_request(body, Some(&signature), true, configure_already_settled).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Payment already finalized."}"#);
}

#[actix_web::test]
async fn failure_webhooks_record_the_terminal_state() {
    let _ = env_logger::try_init().ok();
    let body = event("QP123456789A", "02");
    let signature = calculate_signature(TEST_KEY, body.as_bytes());
    let (status, body) =
        webhook_request(body, Some(&signature), true, configure_failure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Payment recorded as Cancelled."}"#);
}

#[actix_web::test]
async fn unknown_order_codes_still_answer_200() {
    let _ = env_logger::try_init().ok();
    let body = paid_event("QPZZ99999999");
    let signature = calculate_signature(TEST_KEY, body.as_bytes());
    let (status, body) =
        webhook_request(body, Some(&signature), true, configure_no_payment).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":false,"message":"No payment with order code [QPZZ99999999]."}"#);
}

#[actix_web::test]
async fn the_kill_switch_skips_verification() {
    let _ = env_logger::try_init().ok();
    let (status, body) = webhook_request(paid_event("QP123456789A"), None, false, configure_already_settled)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Payment already finalized."}"#);
}

fn event(order_code: &str, status_code: &str) -> String {
    serde_json::json!({
        "order_code": order_code,
        "status_code": status_code,
        "description": "Giao dich thanh cong",
        "transaction_data": { "bank": "VCB", "reference": "FT2025070100123" }
    })
    .to_string()
}

fn paid_event(order_code: &str) -> String {
    event(order_code, "00")
}

// Unlike the other endpoint helpers this one surfaces middleware rejections as the raw
// actix error, so the tests can look at both the message and the status code.
async fn webhook_request(
    body: String,
    signature: Option<&str>,
    enabled: bool,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), actix_web::Error> {
    let mut req = TestRequest::post().uri("/webhook/qpay").insert_header(ContentType::json());
    if let Some(signature) = signature {
        req = req.insert_header((QPAY_SIGNATURE_HEADER, signature));
    }
    let req = req.set_payload(body).to_request();
    let app = App::new().service(
        web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(Secret::new(TEST_KEY.to_string()), enabled))
            .configure(configure),
    );
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

// Rejections happen in the middleware; the engine must never hear about them.
fn configure_untouched(cfg: &mut ServiceConfig) {
    let backend = MockBookingBackend::new();
    cfg.service(QpayWebhookRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(server_options()));
}

fn configure_settlement(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_settle_payment()
        .withf(|code, evidence, _| code.as_str() == "QP123456789A" && evidence.contains(r#""status_code":"00""#))
        .times(1)
        .returning(|_, _, _| Ok(ConfirmationOutcome::Confirmed(fixed_booking(1, BookingStatus::Confirmed))));
    backend
        .expect_fetch_payment_by_order_code()
        .times(1)
        .returning(|code| Ok(Some(completed_payment(1, code.as_str()))));
    cfg.service(QpayWebhookRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(server_options()));
}

fn configure_already_settled(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_settle_payment()
        .returning(|_, _, _| Ok(ConfirmationOutcome::AlreadyFinalized(fixed_booking(1, BookingStatus::Confirmed))));
    cfg.service(QpayWebhookRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(server_options()));
}

fn configure_failure(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_fail_payment()
        .withf(|code, new_status, _| code.as_str() == "QP123456789A" && *new_status == PaymentStatus::Cancelled)
        .times(1)
        .returning(|code, new_status, _| {
            let mut payment = pending_payment(1, code.as_str());
            payment.status = new_status;
            Ok(payment)
        });
    backend.expect_fetch_booking_by_id().times(1).returning(|id| Ok(Some(held_booking(id))));
    cfg.service(QpayWebhookRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(server_options()));
}

fn configure_no_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_settle_payment().returning(|code, _, _| Err(ReservationError::PaymentNotFound(code.clone())));
    cfg.service(QpayWebhookRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(server_options()));
}
