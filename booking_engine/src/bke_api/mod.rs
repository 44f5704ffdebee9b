//! The public API surface of the booking engine.
//!
//! [`BookingFlowApi`] drives state transitions; [`BookingQueryApi`] answers questions. Both are
//! generic over the storage backend traits, so tests can run them against mocks and the server
//! runs them against SQLite.

pub mod booking_objects;
pub mod refund;

mod booking_flow_api;
mod booking_query_api;

pub use booking_flow_api::BookingFlowApi;
pub use booking_query_api::BookingQueryApi;
