//! Webhook signature middleware.
//!
//! QPay signs every webhook body with HMAC-SHA256 keyed by the merchant checksum key and presents
//! the hex digest in the `x-qpay-signature` header. Wrapping the webhook scope with this
//! middleware keeps forged verdicts away from the handlers entirely.
//!
//! The body has to be read to verify the signature, so the middleware re-injects it into the
//! request payload afterwards for the handler to consume. A missing or wrong signature yields 401.
//! The check can be disabled (`TBS_DISABLE_WEBHOOK_SIGNATURE`) for test rigs that post unsigned
//! bodies.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    web,
    Error,
};
use bkg_common::Secret;
use futures::future::LocalBoxFuture;
use log::*;
use qpay_tools::verify_signature;

pub const QPAY_SIGNATURE_HEADER: &str = "x-qpay-signature";

pub struct SignatureMiddlewareFactory {
    key: Secret<String>,
    enabled: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(key: Secret<String>, enabled: bool) -> Self {
        Self { key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        let service = SignatureMiddlewareService {
            key: self.key.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        };
        ready(Ok(service))
    }
}

pub struct SignatureMiddlewareService<S> {
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.reveal().clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if !enabled {
                trace!("🔐️ Signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read the webhook body. {e}");
                ErrorBadRequest("Could not read the webhook body.")
            })?;
            let presented = req
                .headers()
                .get(QPAY_SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    warn!("🔐️ No signature on the webhook request. Denying access.");
                    ErrorUnauthorized("No webhook signature found.")
                })?;
            if verify_signature(&key, data.as_ref(), &presented) {
                trace!("🔐️ Webhook signature check ✅️");
                // Extraction drained the payload. Put the body back for the handler.
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid signature on the webhook request. Denying access.");
                Err(ErrorUnauthorized("Invalid webhook signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
