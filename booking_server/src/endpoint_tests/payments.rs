use actix_web::{http::StatusCode, web, web::ServiceConfig};
use bkg_common::Money;
use booking_engine::{
    db_types::{BookingStatus, NewPayment, Payment, PaymentStatus},
    ConfirmationOutcome,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use qpay_tools::{PaymentLinkDetail, QPayLinkStatus, QPayTransaction};

use super::{
    helpers::{completed_payment, fixed_booking, flow_api, get_request, held_booking, pending_payment, post_empty},
    mocks::{MockBookingBackend, MockPaymentLink},
};
use crate::{
    data_objects::{PaymentLinkResponse, PaymentStatusResponse},
    routes::{CreatePaymentRoute, PaymentStatusRoute},
};

const CODE: &str = "QP123456789A";

#[actix_web::test]
async fn payment_link_for_a_held_booking() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/payment", configure_new_link)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let link: PaymentLinkResponse = serde_json::from_str(&body).expect("Malformed payment link in response");
    assert_eq!(link.amount, Money::from(600_000));
    assert_eq!(link.order_code.len(), 12);
    assert!(link.order_code.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(link.expires_at.is_some());
}

#[actix_web::test]
async fn a_new_link_supersedes_the_live_one() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/payment", configure_supersede)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let link: PaymentLinkResponse = serde_json::from_str(&body).expect("Malformed payment link in response");
    assert_ne!(link.order_code, "QPOLD1234567");
}

#[actix_web::test]
async fn a_lapsed_hold_cannot_take_payment() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/payment", configure_lapsed_hold)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with the current state of the booking. The hold on booking #1 has lapsed. Make a new reservation."}"#
    );
}

#[actix_web::test]
async fn a_confirmed_booking_cannot_take_payment() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/payment", configure_confirmed_booking)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with the current state of the booking. Booking #1 is Confirmed and cannot be paid."}"#
    );
}

#[actix_web::test]
async fn strangers_get_no_payment_link() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("eve", "Guest")), "/reservations/1/payment", configure_lapsed_hold)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient permissions. eve"}"#);
}

#[actix_web::test]
async fn a_poll_reconciles_the_terminal_verdict() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("alice", "Guest")), "/payments/QP123456789A", configure_poll_paid).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: PaymentStatusResponse = serde_json::from_str(&body).expect("Malformed status in response");
    assert_eq!(response.payment.status, PaymentStatus::Completed);
    assert_eq!(response.booking.status, BookingStatus::Confirmed);
}

#[actix_web::test]
async fn polling_a_live_link_changes_nothing() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Some(("alice", "Guest")), "/payments/QP123456789A", configure_poll_processing)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: PaymentStatusResponse = serde_json::from_str(&body).expect("Malformed status in response");
    assert_eq!(response.payment.status, PaymentStatus::Pending);
    assert_eq!(response.booking.status, BookingStatus::Reserved);
}

#[actix_web::test]
async fn terminal_payments_answer_from_local_state() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Some(("alice", "Guest")), "/payments/QP123456789A", configure_settled_payment)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: PaymentStatusResponse = serde_json::from_str(&body).expect("Malformed status in response");
    assert_eq!(response.payment.status, PaymentStatus::Completed);
}

#[actix_web::test]
async fn a_failed_collection_leaves_the_hold_standing() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Some(("alice", "Guest")), "/payments/QP123456789A", configure_poll_cancelled)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: PaymentStatusResponse = serde_json::from_str(&body).expect("Malformed status in response");
    assert_eq!(response.payment.status, PaymentStatus::Cancelled);
    assert_eq!(response.booking.status, BookingStatus::Reserved);
}

#[actix_web::test]
async fn unknown_order_codes_are_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Some(("alice", "Guest")), "/payments/QPUNKNOWN123", configure_no_payment)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The requested record was not found. No payment with order code [QPUNKNOWN123]."}"#);
}

fn settled_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 6, 0).unwrap()
}

fn payment_row(payment: NewPayment) -> Payment {
    Payment {
        id: 1,
        booking_id: payment.booking_id,
        order_code: payment.order_code,
        link_id: payment.link_id,
        amount: payment.amount,
        currency: payment.currency,
        status: PaymentStatus::Pending,
        paid_at: None,
        evidence: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn gateway_link(code: &str, status: QPayLinkStatus) -> PaymentLinkDetail {
    PaymentLinkDetail {
        order_code: code.to_string(),
        link_id: "lnk_1".to_string(),
        checkout_url: format!("https://pay.example/{code}"),
        qr_code: "000201010212".to_string(),
        amount: Money::from(600_000),
        status,
        created_at: None,
        expired_at: None,
        transactions: Vec::new(),
    }
}

fn register(cfg: &mut ServiceConfig, backend: MockBookingBackend, gateway: MockPaymentLink) {
    cfg.service(CreatePaymentRoute::<MockBookingBackend, MockPaymentLink>::new())
        .service(PaymentStatusRoute::<MockBookingBackend, MockPaymentLink>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(gateway));
}

fn configure_new_link(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(held_booking(id))));
    backend.expect_fetch_payments_for_booking().returning(|_| Ok(Vec::new()));
    backend
        .expect_create_payment()
        .withf(|payment| {
            payment.booking_id == 1 &&
                payment.amount == Money::from(600_000) &&
                payment.link_id.as_deref() == Some("lnk_1")
        })
        .times(1)
        .returning(|payment| Ok(payment_row(payment)));
    let mut gateway = MockPaymentLink::new();
    gateway
        .expect_create_payment_link()
        .withf(|request| request.amount == Money::from(600_000) && request.expired_at.is_some())
        .times(1)
        .returning(|request| Ok(gateway_link(&request.order_code, QPayLinkStatus::Pending)));
    register(cfg, backend, gateway);
}

fn configure_supersede(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(held_booking(id))));
    backend.expect_fetch_payments_for_booking().returning(|_| Ok(vec![pending_payment(1, "QPOLD1234567")]));
    backend.expect_supersede_payment().withf(|code| code.as_str() == "QPOLD1234567").times(1).returning(|code| {
        let mut old = pending_payment(1, code.as_str());
        old.status = PaymentStatus::Cancelled;
        Ok(old)
    });
    backend.expect_create_payment().times(1).returning(|payment| Ok(payment_row(payment)));
    let mut gateway = MockPaymentLink::new();
    gateway
        .expect_cancel_payment_link()
        .withf(|code, reason| code == "QPOLD1234567" && reason.is_some())
        .times(1)
        .returning(|code, _| Ok(gateway_link(code, QPayLinkStatus::Cancelled)));
    gateway.expect_create_payment_link().times(1).returning(|request| Ok(gateway_link(&request.order_code, QPayLinkStatus::Pending)));
    register(cfg, backend, gateway);
}

fn configure_lapsed_hold(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| {
        let mut booking = held_booking(id);
        booking.expires_at = Some(Utc::now() - Duration::minutes(5));
        Ok(Some(booking))
    });
    register(cfg, backend, MockPaymentLink::new());
}

fn configure_confirmed_booking(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(fixed_booking(id, BookingStatus::Confirmed))));
    register(cfg, backend, MockPaymentLink::new());
}

fn configure_poll_paid(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    // First fetch sees the pending attempt; the two after settlement see the completed row.
    backend.expect_fetch_payment_by_order_code().times(1).returning(|code| Ok(Some(pending_payment(1, code.as_str()))));
    backend.expect_fetch_payment_by_order_code().times(2).returning(|code| Ok(Some(completed_payment(1, code.as_str()))));
    backend.expect_fetch_booking_by_id().times(1).returning(|id| Ok(Some(held_booking(id))));
    backend
        .expect_settle_payment()
        .withf(|code, evidence, paid_at| {
            code.as_str() == CODE && evidence.contains(CODE) && *paid_at == settled_at()
        })
        .times(1)
        .returning(|_, _, _| Ok(ConfirmationOutcome::Confirmed(fixed_booking(1, BookingStatus::Confirmed))));
    let mut gateway = MockPaymentLink::new();
    gateway.expect_payment_link_status().times(1).returning(|code| {
        let mut link = gateway_link(code, QPayLinkStatus::Paid);
        link.transactions = vec![QPayTransaction {
            reference: "FT123".to_string(),
            amount: Money::from(600_000),
            description: "thanh toan".to_string(),
            transaction_time: settled_at(),
        }];
        Ok(link)
    });
    register(cfg, backend, gateway);
}

fn configure_poll_processing(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_payment_by_order_code().returning(|code| Ok(Some(pending_payment(1, code.as_str()))));
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(held_booking(id))));
    let mut gateway = MockPaymentLink::new();
    gateway.expect_payment_link_status().returning(|code| Ok(gateway_link(code, QPayLinkStatus::Processing)));
    register(cfg, backend, gateway);
}

// The gateway mock carries no expectations: any upstream call would fail the test.
fn configure_settled_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_payment_by_order_code().returning(|code| Ok(Some(completed_payment(1, code.as_str()))));
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(fixed_booking(id, BookingStatus::Confirmed))));
    register(cfg, backend, MockPaymentLink::new());
}

fn configure_poll_cancelled(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_payment_by_order_code().times(1).returning(|code| Ok(Some(pending_payment(1, code.as_str()))));
    backend.expect_fetch_payment_by_order_code().times(1).returning(|code| {
        let mut payment = pending_payment(1, code.as_str());
        payment.status = PaymentStatus::Cancelled;
        Ok(Some(payment))
    });
    // Once for the ownership check, once inside the reconciler.
    backend.expect_fetch_booking_by_id().times(2).returning(|id| Ok(Some(held_booking(id))));
    backend
        .expect_fail_payment()
        .withf(|code, new_status, _| code.as_str() == CODE && *new_status == PaymentStatus::Cancelled)
        .times(1)
        .returning(|code, new_status, _| {
            let mut payment = pending_payment(1, code.as_str());
            payment.status = new_status;
            Ok(payment)
        });
    let mut gateway = MockPaymentLink::new();
    gateway.expect_payment_link_status().returning(|code| Ok(gateway_link(code, QPayLinkStatus::Cancelled)));
    register(cfg, backend, gateway);
}

fn configure_no_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_payment_by_order_code().returning(|_| Ok(None));
    register(cfg, backend, MockPaymentLink::new());
}
