//! Caller identity extraction.
//!
//! Authentication and authorization live in the gateway proxy in front of this server, which
//! injects the verified identity as the `x-requester-id` and `x-requester-role` headers. The
//! [`Requester`] extractor turns those headers into a typed identity for handlers to consume.
//! Requests without an identity header are refused with 401; what each role may do is decided by
//! the booking engine per operation.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use booking_engine::db_types::{Actor, ActorRole};

use crate::errors::ServerError;

pub const REQUESTER_ID_HEADER: &str = "x-requester-id";
pub const REQUESTER_ROLE_HEADER: &str = "x-requester-role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: String,
    pub role: ActorRole,
}

impl Requester {
    pub fn as_actor(&self) -> Actor {
        Actor { id: self.id.clone(), role: self.role }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, ActorRole::Provider | ActorRole::Admin)
    }
}

impl FromRequest for Requester {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(requester_from_headers(req))
    }
}

fn requester_from_headers(req: &HttpRequest) -> Result<Requester, ServerError> {
    let id = req
        .headers()
        .get(REQUESTER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::Unauthenticated(format!("The {REQUESTER_ID_HEADER} header is missing.")))?
        .to_string();
    // A missing role header degrades to the least-privileged role.
    let role = match req.headers().get(REQUESTER_ROLE_HEADER) {
        None => ActorRole::Guest,
        Some(v) => {
            let value = v.to_str().map_err(|_| {
                ServerError::InvalidRequestBody(format!("The {REQUESTER_ROLE_HEADER} header is not valid UTF-8."))
            })?;
            value.parse::<ActorRole>().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
        },
    };
    Ok(Requester { id, role })
}
