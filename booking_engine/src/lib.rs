//! Booking Engine
//!
//! The booking engine is the reservation-hold and payment-confirmation state machine behind the
//! travel booking server. It creates time-bound holds on perishable inventory (room night-ranges,
//! tour departure slots), detects interval conflicts, expires abandoned holds, and reconciles
//! payment evidence arriving from independent triggers (gateway webhook and client poll) into
//! exactly one state transition.
//!
//! The library is divided into two main sections:
//! 1. Storage traits and backends. SQLite is the supported backend (a Postgres feature flag exists
//!    but no implementation ships yet). You should never need to touch the database directly;
//!    everything goes through the API layer. The exception is the record types themselves, which
//!    live in [`mod@db_types`] and are public.
//! 2. The engine public API ([`BookingFlowApi`] and [`BookingQueryApi`]). All state transitions run
//!    as conditional updates inside the datastore, never behind an in-process lock, so correctness
//!    holds across any number of server instances sharing one database.
//!
//! The engine also emits events at the interesting transitions (hold created, confirmed, expired,
//! payment failed, cancelled). A small actor framework in [`mod@events`] lets callers hook into
//! these, e.g. to dispatch notifications. Hooks are best-effort: a failing hook never rolls back
//! the transition that triggered it.
pub mod db_types;
pub mod events;
pub mod helpers;

mod bke_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use bke_api::{
    booking_objects,
    booking_objects::{BookingQueryFilter, BookingResult, CancellationResult, GatewayVerdict, ReconcileOutcome, SweepResult},
    refund::{RefundPolicy, RefundTier},
    BookingFlowApi,
    BookingQueryApi,
};
pub use traits::{BookingApiError, BookingManagement, ConfirmationOutcome, ReservationDatabase, ReservationError};
