//! HMAC request signing
//!
//! Deterministic HMAC-SHA256 over the exact bytes transmitted on the
//! wire. Pure functions; no fallible inputs once the secret is
//! non-empty (enforced at config load).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded signature on outbound requests.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute the lowercase-hex HMAC-SHA256 of `body`, keyed by `secret`.
///
/// `body` must be byte-identical to what is transmitted on the wire —
/// callers serialize the payload exactly once and sign that
/// serialization.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute the HMAC over `body` and compare it to `signature` in
/// constant time. Used by the receiver side of the contract (tests).
pub fn verify(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let expected = sign(secret, body);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
