use actix_web::{http::StatusCode, web, web::ServiceConfig};
use bkg_common::Money;
use booking_engine::{
    db_types::{Booking, BookingStatus},
    BookingQueryApi,
    BookingResult,
    ReservationError,
};
use chrono::{Duration, NaiveDate, Utc};

use super::{
    helpers::{fixed_booking, flow_api, get_request, held_booking, post_request, server_options},
    mocks::{MockBookingBackend, MockCatalog},
};
use crate::{
    catalog::ResourceInfo,
    data_objects::NewReservationRequest,
    routes::{BookingByIdRoute, CreateReservationRoute, MyReservationsRoute},
};

#[actix_web::test]
async fn fetch_booking_no_identity_header() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(None, "/reservations/1", configure_untouched_backend).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Caller identity is missing or unreadable. The x-requester-id header is missing."}"#);
}

#[actix_web::test]
async fn fetch_own_booking() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("alice", "Guest")), "/reservations/1", configure_single_booking).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, BOOKING_JSON);
}

#[actix_web::test]
async fn guests_cannot_read_other_requesters_bookings() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("bob", "Guest")), "/reservations/1", configure_single_booking).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient permissions. bob"}"#);
}

#[actix_web::test]
async fn staff_read_any_booking() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Some(("carol", "Provider")), "/reservations/1", configure_single_booking)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, BOOKING_JSON);
}

#[actix_web::test]
async fn missing_bookings_are_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("alice", "Guest")), "/reservations/42", configure_no_booking).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The requested record was not found. Booking #42 does not exist."}"#);
}

#[actix_web::test]
async fn reservations_are_priced_from_the_catalog() {
    let _ = env_logger::try_init().ok();
    let request = NewReservationRequest {
        resource_id: "room-101".to_string(),
        start_date: in_days(30),
        end_date: in_days(32),
        participant_count: 2,
    };
    let (status, body) =
        post_request(Some(("alice", "Guest")), "/reservations", &request, configure_create).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let booking: Booking = serde_json::from_str(&body).expect("Malformed booking in response");
    // 300,000 đ/night × 2 nights × 2 participants
    assert_eq!(booking.amount, Money::from(1_200_000));
    assert_eq!(booking.status, BookingStatus::Reserved);
    assert!(booking.expires_at.is_some());
}

#[actix_web::test]
async fn the_participant_cap_is_enforced() {
    let _ = env_logger::try_init().ok();
    let request = NewReservationRequest {
        resource_id: "room-101".to_string(),
        start_date: in_days(30),
        end_date: in_days(32),
        participant_count: 5,
    };
    let (status, body) =
        post_request(Some(("alice", "Guest")), "/reservations", &request, configure_create).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read the request body. room-101 takes at most 4 participants."}"#);
}

#[actix_web::test]
async fn maintenance_blocks_reservations() {
    let _ = env_logger::try_init().ok();
    let request = NewReservationRequest {
        resource_id: "room-101".to_string(),
        start_date: in_days(30),
        end_date: in_days(32),
        participant_count: 1,
    };
    let (status, body) = post_request(Some(("alice", "Guest")), "/reservations", &request, configure_maintenance)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"The resource is under maintenance and cannot be booked."}"#);
}

#[actix_web::test]
async fn a_taken_interval_conflicts() {
    let _ = env_logger::try_init().ok();
    let request = NewReservationRequest {
        resource_id: "room-101".to_string(),
        start_date: in_days(30),
        end_date: in_days(32),
        participant_count: 1,
    };
    let (status, body) =
        post_request(Some(("alice", "Guest")), "/reservations", &request, configure_conflict).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"The requested interval is not available for this resource."}"#);
}

#[actix_web::test]
async fn an_empty_query_returns_the_full_history() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("alice", "Guest")), "/reservations", configure_history).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: BookingResult = serde_json::from_str(&body).expect("Malformed history in response");
    assert_eq!(result.requester_id, "alice");
    assert_eq!(result.total_amount, Money::from(1_200_000));
    assert_eq!(result.bookings.len(), 2);
}

#[actix_web::test]
async fn searches_are_pinned_to_the_caller_even_for_staff() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(("root", "Admin")), "/reservations?resource_id=room-101&status=Confirmed", configure_search)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: BookingResult = serde_json::from_str(&body).expect("Malformed history in response");
    assert_eq!(result.requester_id, "root");
    assert!(result.bookings.is_empty());
}

fn in_days(n: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(n)
}

// No expectations at all: these requests must be refused before the backend is consulted.
fn configure_untouched_backend(cfg: &mut ServiceConfig) {
    let query_api = BookingQueryApi::new(MockBookingBackend::new());
    cfg.service(BookingByIdRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

fn configure_single_booking(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|id| Ok(Some(fixed_booking(id, BookingStatus::Confirmed))));
    let query_api = BookingQueryApi::new(backend);
    cfg.service(BookingByIdRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

fn configure_no_booking(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_fetch_booking_by_id().returning(|_| Ok(None));
    let query_api = BookingQueryApi::new(backend);
    cfg.service(BookingByIdRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

fn configure_create(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_create_reservation()
        .withf(|booking, hold| booking.amount == Money::from(1_200_000) && *hold == Duration::seconds(120))
        .returning(|booking, _| {
            let mut row = held_booking(7);
            row.resource_id = booking.resource_id.clone();
            row.start_date = booking.start_date;
            row.end_date = booking.end_date;
            row.participant_count = booking.participant_count;
            row.amount = booking.amount;
            Ok(row)
        });
    cfg.service(CreateReservationRoute::<MockBookingBackend, MockCatalog>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(catalog(false)))
        .app_data(web::Data::new(server_options()));
}

fn configure_maintenance(cfg: &mut ServiceConfig) {
    let backend = MockBookingBackend::new();
    cfg.service(CreateReservationRoute::<MockBookingBackend, MockCatalog>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(catalog(true)))
        .app_data(web::Data::new(server_options()));
}

fn configure_conflict(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend.expect_create_reservation().returning(|_, _| Err(ReservationError::ResourceUnavailable));
    cfg.service(CreateReservationRoute::<MockBookingBackend, MockCatalog>::new())
        .app_data(web::Data::new(flow_api(backend)))
        .app_data(web::Data::new(catalog(false)))
        .app_data(web::Data::new(server_options()));
}

fn configure_history(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_fetch_bookings_for_requester()
        .withf(|requester| requester == "alice")
        .returning(|_| Ok(vec![fixed_booking(1, BookingStatus::Completed), fixed_booking(2, BookingStatus::Confirmed)]));
    let query_api = BookingQueryApi::new(backend);
    cfg.service(MyReservationsRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

fn configure_search(cfg: &mut ServiceConfig) {
    let mut backend = MockBookingBackend::new();
    backend
        .expect_search_bookings()
        .withf(|query| {
            query.requester_id.as_deref() == Some("root") &&
                query.resource_id.as_deref() == Some("room-101") &&
                query.status == Some(vec![BookingStatus::Confirmed])
        })
        .returning(|_| Ok(Vec::new()));
    let query_api = BookingQueryApi::new(backend);
    cfg.service(MyReservationsRoute::<MockBookingBackend>::new()).app_data(web::Data::new(query_api));
}

// Mock response to `fetch_booking_by_id` for booking #1, as serialized on the wire.
const BOOKING_JSON: &str = r#"{"id":1,"resource_id":"room-101","requester_id":"alice","start_date":"2025-07-10","end_date":"2025-07-12","participant_count":1,"amount":600000,"status":"Confirmed","expires_at":null,"cancel_reason":null,"cancelled_by":null,"cancelled_at":null,"created_at":"2025-07-01T09:00:00Z","updated_at":"2025-07-01T09:00:00Z"}"#;

fn catalog(under_maintenance: bool) -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_resource_info().returning(move |id| {
        Ok(ResourceInfo {
            resource_id: id.to_string(),
            rate_per_unit: Money::from(300_000),
            under_maintenance,
            max_participants: Some(4),
        })
    });
    catalog
}
