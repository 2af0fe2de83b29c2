//! Cryptographic utilities for signature verification.
//!
//! This module provides shared functions for verifying the payment gateway's
//! callback signature and the identity provider's webhook signature.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    // This is a library invariant, not a runtime condition.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Compute HMAC-SHA256 and return the hex-encoded result (64 characters).
///
/// This is the encoding the payment gateway uses for its callback signature.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(hmac_sha256(secret.as_bytes(), message.as_bytes()))
}

/// Compute HMAC-SHA256 and return the base64-encoded result.
///
/// This is the encoding the identity provider uses for webhook signatures.
#[must_use]
pub fn hmac_sha256_base64(key: &[u8], message: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(hmac_sha256(key, message.as_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Signature checks must not leak how many leading characters matched.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
