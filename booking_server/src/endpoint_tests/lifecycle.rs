use actix_web::{http::StatusCode, web, web::ServiceConfig};
use booking_engine::{
    db_types::{Booking, BookingStatus, CancelReason},
    BookingQueryApi,
    ReservationError,
};
use chrono::{NaiveDate, TimeZone, Utc};

use super::{
    helpers::{fixed_booking, flow_api, get_request, post_empty, post_request},
    mocks::MockBookingBackend,
};
use crate::routes::{AvailabilityRoute, CancelReservationRoute, CompleteReservationRoute, ForceStatusRoute};

#[actix_web::test]
async fn guests_cancel_their_own_bookings() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/cancel", configure_cancel)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, CANCELLATION_JSON);
}

#[actix_web::test]
async fn guests_cannot_cancel_for_others() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("eve", "Guest")), "/reservations/1/cancel", configure_foreign_cancel)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient permissions. eve"}"#);
}

#[actix_web::test]
async fn cancelling_twice_conflicts() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/cancel", configure_double_cancel)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with the current state of the booking. The booking is already in a terminal state."}"#
    );
}

#[actix_web::test]
async fn guests_cannot_complete_bookings() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("alice", "Guest")), "/reservations/1/complete", configure_untouched_flow)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient permissions. alice"}"#);
}

#[actix_web::test]
async fn providers_complete_bookings() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_empty(Some(("carol", "Provider")), "/reservations/1/complete", configure_complete)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let booking: Booking = serde_json::from_str(&body).expect("Malformed booking in response");
    assert_eq!(booking.status, BookingStatus::Completed);
}

#[actix_web::test]
async fn forcing_a_status_requires_admin() {
    let _ = env_logger::try_init().ok();
    let request = serde_json::json!({ "status": "Confirmed", "reason": "ops request" });
    let (status, body) =
        post_request(Some(("carol", "Provider")), "/admin/bookings/5/status", &request, configure_untouched_flow)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient permissions. carol"}"#);
}

#[actix_web::test]
async fn admins_force_a_status() {
    let _ = env_logger::try_init().ok();
    let request = serde_json::json!({ "status": "Cancelled", "reason": "fraud investigation" });
    let (status, body) = post_request(Some(("root", "Admin")), "/admin/bookings/5/status", &request, configure_force)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let booking: Booking = serde_json::from_str(&body).expect("Malformed booking in response");
    assert_eq!(booking.id, 5);
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[actix_web::test]
async fn forcing_back_to_reserved_needs_a_deadline() {
    let _ = env_logger::try_init().ok();
    let request = serde_json::json!({ "status": "Reserved", "reason": "redo the hold" });
    let (status, body) =
        post_request(Some(("root", "Admin")), "/admin/bookings/5/status", &request, configure_untouched_flow)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        r#"{"error":"Could not read the request body. forcing a booking back to Reserved requires a new expiry deadline"}"#
    );
}

#[actix_web::test]
async fn availability_reports_on_the_interval() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(None, "/availability?resource_id=room-101&start_date=2025-07-10&end_date=2025-07-12", configure_free_interval)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"resource_id":"room-101","start_date":"2025-07-10","end_date":"2025-07-12","available":true}"#);
}

#[actix_web::test]
async fn backwards_intervals_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(None, "/availability?resource_id=room-101&start_date=2025-07-12&end_date=2025-07-12", configure_untouched_query)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read the request body. end_date must be after start_date."}"#);
}

fn cancelled_booking(id: i64) -> Booking {
    let mut booking = fixed_booking(id, BookingStatus::Cancelled);
    booking.cancel_reason = Some(CancelReason::Guest);
    booking.cancelled_by = Some("alice".to_string());
    booking.cancelled_at = Some(Utc.with_ymd_and_hms(2025, 7, 5, 10, 0, 0).unwrap());
    booking.updated_at = Utc.with_ymd_and_hms(2025, 7, 5, 10, 0, 0).unwrap();
    booking
}

// `POST /reservations/1/cancel` as serialized on the wire: no payment was collected, so nothing
// is owed back.
const CANCELLATION_JSON: &str = r#"{"booking":{"id":1,"resource_id":"room-101","requester_id":"alice","start_date":"2025-07-10","end_date":"2025-07-12","participant_count":1,"amount":600000,"status":"Cancelled","expires_at":null,"cancel_reason":"Guest","cancelled_by":"alice","cancelled_at":"2025-07-05T10:00:00Z","created_at":"2025-07-01T09:00:00Z","updated_at":"2025-07-05T10:00:00Z"},"refund_due":0,"refund":null}"#;

fn configure_cancel(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(fixed_booking(id, BookingStatus::Confirmed))));
    backend
        .expect_cancel_booking()
        .withf(|id, cancelled_by, reason| *id == 1 && cancelled_by == "alice" && *reason == CancelReason::Guest)
        .times(1)
        .returning(|id, _, _| Ok(cancelled_booking(id)));
    backend.expect_fetch_payments_for_booking().returning(|_| Ok(Vec::new()));
    cfg.service(CancelReservationRoute::<MockBookingBackend>::new()).app_data(web::Data::new(flow_api(backend)));
}

// The cancel call itself must never be reached.
fn configure_foreign_cancel(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(fixed_booking(id, BookingStatus::Confirmed))));
    cfg.service(CancelReservationRoute::<MockBookingBackend>::new()).app_data(web::Data::new(flow_api(backend)));
}

fn configure_double_cancel(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(cancelled_booking(id))));
    backend.expect_cancel_booking().returning(|_, _, _| Err(ReservationError::BookingModificationNoOp));
    cfg.service(CancelReservationRoute::<MockBookingBackend>::new()).app_data(web::Data::new(flow_api(backend)));
}

// Role guards sit in front of every backend call; a mock with no expectations proves it.
fn configure_untouched_flow(cfg: &mut ServiceConfig) {
    let backend = MockBookingBackend::new();
    cfg.service(CompleteReservationRoute::<MockBookingBackend>::new())
        .service(ForceStatusRoute::<MockBookingBackend>::new())
        .app_data(web::Data::new(flow_api(backend)));
}

fn configure_complete(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_complete_booking().times(1).returning(|id| Ok(fixed_booking(id, BookingStatus::Completed)));
    cfg.service(CompleteReservationRoute::<MockBookingBackend>::new()).app_data(web::Data::new(flow_api(backend)));
}

fn configure_force(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_force_booking_status()
        .withf(|id, status, expires_at, forced_by| {
            *id == 5 && *status == BookingStatus::Cancelled && expires_at.is_none() && forced_by == "root"
        })
        .times(1)
        .returning(|id, status, _, _| Ok(fixed_booking(id, status)));
    cfg.service(ForceStatusRoute::<MockBookingBackend>::new()).app_data(web::Data::new(flow_api(backend)));
}

fn configure_free_interval(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_interval_is_free()
        .withf(|resource, start, end, excluding| {
            resource == "room-101" &&
                *start == NaiveDate::from_ymd_opt(2025, 7, 10).unwrap() &&
                *end == NaiveDate::from_ymd_opt(2025, 7, 12).unwrap() &&
                excluding.is_none()
        })
        .returning(|_, _, _, _| Ok(true));
    let query_api = BookingQueryApi::new(backend);
    cfg.service(AvailabilityRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

fn configure_untouched_query(cfg: &mut ServiceConfig) {
    let query_api = BookingQueryApi::new(MockBookingBackend::new());
    cfg.service(AvailabilityRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}
