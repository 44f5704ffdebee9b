//! # Travel booking server
//!
//! The REST front-end for the booking engine. It owns everything HTTP: routing, caller identity,
//! webhook signature checks, the catalog and payment-gateway collaborators, and the background
//! hold-expiry sweeper. Booking semantics live in `booking_engine`; this crate never touches the
//! database except through the engine APIs.
//!
//! ## Configuration
//!
//! Everything is configured through `TBS_*` environment variables (see [`config`] and the
//! `cli-help.txt` printed by any command-line argument). A `.env` file in the working directory
//! is honoured.
//!
//! ## Routes
//!
//! Client routes live under `/api` and identify the caller from the `x-requester-id` /
//! `x-requester-role` headers injected by the upstream auth proxy. The QPay webhook lives under
//! `/webhook` behind the HMAC signature middleware. `/health` answers liveness probes.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod middleware;
pub mod qpay_routes;
pub mod routes;
pub mod server;
