//! Shared-secret header checks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Whether `provided` equals `expected`, compared in constant time.
///
/// Both values are MACed under `expected` and the tags compared with
/// `verify_slice`, so timing does not leak the length of the matching
/// prefix. An empty or absent credential never matches.
pub fn secret_matches(expected: &str, provided: Option<&str>) -> bool {
    let Some(provided) = provided.filter(|p| !p.is_empty()) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }

    let Ok(mut reference) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    reference.update(expected.as_bytes());
    let tag = reference.finalize().into_bytes();

    let Ok(mut candidate) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    candidate.update(provided.as_bytes());
    candidate.verify_slice(&tag).is_ok()
}
