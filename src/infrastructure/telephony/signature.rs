//! Webhook signature verification
//!
//! The provider signs webhook deliveries with HMAC-SHA256 over the nonce
//! and raw body, keyed by the account auth token. Verification is skipped
//! when no token is configured or the delivery carries no signature.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-plivo-signature-v2";
pub const NONCE_HEADER: &str = "x-plivo-signature-v2-nonce";

/// Compute the base64 signature for a delivery
pub fn sign(auth_token: &str, nonce: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(auth_token.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(nonce.as_bytes());
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a delivery signature in constant time
pub fn verify(auth_token: &str, nonce: &str, body: &[u8], signature: &str) -> bool {
    let decoded = match BASE64.decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = HmacSha256::new_from_slice(auth_token.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(nonce.as_bytes());
    mac.update(body);
    mac.verify_slice(&decoded).is_ok()
}
