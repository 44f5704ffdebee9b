//! A typed client for the QPay payment gateway.
//!
//! QPay is a hosted-checkout provider: you create a *payment link* for an amount and an order code,
//! the buyer pays via the checkout page or by scanning the QR payload, and QPay reports the outcome
//! both by signed webhook and via the status endpoint. This crate wraps the REST surface, the
//! webhook payload types, and the HMAC signature scheme shared by both.

mod api;
mod config;
mod error;
pub mod helpers;
mod signature;

mod data_objects;

pub use api::{PaymentLinkProvider, QPayApi};
pub use config::QPayConfig;
pub use data_objects::{CreatePaymentLinkRequest, PaymentLinkDetail, QPayLinkStatus, QPayResponse, QPayTransaction, WebhookEvent};
pub use error::QPayApiError;
pub use signature::{calculate_signature, verify_signature};
