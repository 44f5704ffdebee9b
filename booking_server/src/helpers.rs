use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::*;
use regex::Regex;

/// Resolve the client IP for logging and audit lines. Proxy headers are only consulted when the
/// deployment says they can be trusted:
/// 1. The first entry of `X-Forwarded-For`, if `use_x_forwarded_for` is set.
/// 2. The `for=` directive of the RFC 7239 `Forwarded` header, if `use_forwarded` is set.
/// 3. The peer address of the connection.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(first_forwarded_entry);
        trace!("X-Forwarded-For IP: {result:?}");
    }
    if result.is_none() && use_forwarded {
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(forwarded_directive);
        trace!("Forwarded IP: {result:?}");
    }
    if result.is_none() {
        result = req.peer_addr().map(|addr| addr.ip());
        trace!("Peer address: {result:?}");
    }
    result
}

// `X-Forwarded-For: client, proxy1, proxy2`. The client is the leftmost entry.
fn first_forwarded_entry(list: &str) -> Option<IpAddr> {
    list.split(',').next().map(str::trim).and_then(|s| IpAddr::from_str(s).ok())
}

// `Forwarded: for=203.0.113.60;proto=https;by=203.0.113.43`. The for= value may be quoted.
fn forwarded_directive(header: &str) -> Option<IpAddr> {
    let re = Regex::new(r#"for="?(?P<ip>[^;," ]+)"?"#).unwrap();
    re.captures(header)
        .and_then(|caps| caps.name("ip"))
        .and_then(|m| IpAddr::from_str(m.as_str()).ok())
}
