//! The QPay signature scheme: HMAC-SHA256 over the raw request body, keyed with the merchant's
//! checksum key, transmitted hex-encoded in the `x-qpay-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(secret: &str, payload: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac
}

/// HMAC-SHA256 of `payload`, lowercase hex.
pub fn calculate_signature(secret: &str, payload: &[u8]) -> String {
    hex::encode(keyed_mac(secret, payload).finalize().into_bytes())
}

/// Compares the signature a caller presented against the one the payload demands, in constant
/// time. Case-insensitive on the hex digits; anything that is not a hex string is a mismatch.
pub fn verify_signature(secret: &str, payload: &[u8], presented: &str) -> bool {
    let Ok(decoded) = hex::decode(presented.trim()) else {
        return false;
    };
    keyed_mac(secret, payload).verify_slice(&decoded).is_ok()
}
