//! # Storage contracts for the booking engine.
//!
//! This module defines the interface contracts that database *backends* must satisfy to drive the
//! booking engine.
//!
//! ## Bookings and payments
//! A booking is a claim on a resource for a half-open date interval; a payment is one attempt to
//! collect money for a booking. Their interaction is the whole point of the engine: holds expire
//! unless a payment settles, and both outcomes race against each other safely because every
//! transition is a conditional update.
//!
//! ## Traits
//! * [`ReservationDatabase`] defines the write side: reservation inserts with the conflict check
//!   fused in, the payment-settlement CAS pair, sweep support, cancellation and the administrative
//!   escape hatch. Everything here relies on the datastore for serialization; implementations must
//!   never guard a write with an in-process lock.
//! * [`BookingManagement`] defines the read side: record fetches, requester listings, the search
//!   filter, and the advisory availability check.
mod booking_management;
mod reservation_database;

mod data_objects;

pub use booking_management::{BookingApiError, BookingManagement};
pub use data_objects::ConfirmationOutcome;
pub use reservation_database::{ReservationDatabase, ReservationError};
