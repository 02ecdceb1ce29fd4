//! Intake request signature verification.
//!
//! Producers sign `POST /items` with HMAC-SHA256 over
//! `"{timestamp}.{body}"` using the shared intake key, and send the
//! timestamp and hex digest in `X-Feedpost-Timestamp` and
//! `X-Feedpost-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the unix timestamp the request was signed at.
pub const TIMESTAMP_HEADER: &str = "x-feedpost-timestamp";

/// Header carrying the hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-feedpost-signature";

/// Compute the hex signature for a request body.
pub fn sign_body(signing_key: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signed intake request.
///
/// # Arguments
///
/// * `signing_key` - Shared intake signing key
/// * `timestamp` - Value of the timestamp header (unix seconds)
/// * `body` - Raw request body
/// * `signature` - Value of the signature header
/// * `max_age_seconds` - Maximum allowed clock distance (prevents replay attacks)
///
/// # Returns
///
/// `true` if the signature is valid and not stale, `false` otherwise.
pub fn verify_intake_signature(
    signing_key: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    max_age_seconds: u64,
) -> bool {
    if signing_key.is_empty() || timestamp.is_empty() || signature.is_empty() {
        warn!(
            has_signing_key = !signing_key.is_empty(),
            has_timestamp = !timestamp.is_empty(),
            has_signature = !signature.is_empty(),
            "intake_signature_missing_fields"
        );
        return false;
    }

    let signed_at: u64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(timestamp = %timestamp, "intake_signature_invalid_timestamp");
            return false;
        }
    };

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let age = current_time.abs_diff(signed_at);
    if age > max_age_seconds {
        warn!(
            signed_at = signed_at,
            current_time = current_time,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "intake_signature_stale"
        );
        return false;
    }

    let expected = match sign_body(signing_key, timestamp, body) {
        Some(sig) => sig,
        None => {
            warn!("intake_signature_invalid_key");
            return false;
        }
    };

    let valid = constant_time_compare(&expected, &signature.to_ascii_lowercase());

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "intake_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
