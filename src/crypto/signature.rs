//! Webhook signature computation and verification.
//!
//! The gateway signs each webhook body with HMAC-SHA256, keyed by the
//! SHA-256 of the API token, and sends the lowercase hex digest in the
//! `crypto-pay-api-signature` header.

use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "crypto-pay-api-signature";

/// HMAC key derived from the API token.
pub fn signing_key(api_token: &str) -> [u8; 32] {
    Sha256::digest(api_token.as_bytes()).into()
}

fn mac(api_token: &str, body: &[u8]) -> HmacSha256 {
    let key = signing_key(api_token);
    let mut mac = match HmacSha256::new_from_slice(&key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(body);
    mac
}

/// Hex-encoded signature of `body`.
pub fn compute_signature(api_token: &str, body: &[u8]) -> String {
    hex::encode(mac(api_token, body).finalize().into_bytes())
}

/// Check a hex signature against the exact bytes of `body`.
///
/// Comparison is constant time. Only the exact lowercase hex form the
/// gateway sends is accepted; anything else is a mismatch.
pub fn verify_signature(api_token: &str, body: &[u8], signature: &str) -> bool {
    if !signature
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    mac(api_token, body).verify_slice(&expected).is_ok()
}

/// Check the signature header of an inbound webhook.
///
/// A missing or non-ASCII header never verifies.
pub fn check_signature(api_token: &str, body: &[u8], headers: &HeaderMap) -> bool {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if signature.is_empty() {
        debug!("webhook carries no signature header");
        return false;
    }

    let valid = verify_signature(api_token, body, signature);
    debug!(valid, body_len = body.len(), "webhook signature checked");
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const TOKEN: &str = "1234:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&compute_signature(TOKEN, body)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_signing_key_is_sha256_of_token() {
        assert_eq!(
            hex::encode(signing_key("")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_signature_is_lower_hex() {
        let signature = compute_signature(TOKEN, b"{}");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"update_id":1,"update_type":"invoice_paid"}"#;
        assert!(check_signature(TOKEN, body, &signed_headers(body)));
    }

    #[test]
    fn test_non_canonical_hex_is_rejected() {
        let body = b"payload";
        let signature = compute_signature(TOKEN, body);
        assert!(verify_signature(TOKEN, body, &signature));
        assert!(!verify_signature(TOKEN, body, &signature.to_uppercase()));
        assert!(!verify_signature(TOKEN, body, &format!(" {} ", signature)));
        assert!(!verify_signature(TOKEN, body, &signature[..62]));
    }

    #[test]
    fn test_single_byte_change_invalidates() {
        let body = br#"{"update_id":1}"#;
        let headers = signed_headers(body);
        assert!(!check_signature(TOKEN, br#"{"update_id":2}"#, &headers));
    }

    #[test]
    fn test_key_reorder_invalidates() {
        let body = br#"{"a":1,"b":2}"#;
        let headers = signed_headers(body);
        assert!(!check_signature(TOKEN, br#"{"b":2,"a":1}"#, &headers));
    }

    #[test]
    fn test_whitespace_change_invalidates() {
        let body = br#"{"a":1}"#;
        let headers = signed_headers(body);
        assert!(!check_signature(TOKEN, br#"{"a": 1}"#, &headers));
    }

    #[test]
    fn test_wrong_token_invalidates() {
        let body = b"{}";
        assert!(!check_signature("other-token", body, &signed_headers(body)));
    }

    #[test]
    fn test_missing_header() {
        assert!(!check_signature(TOKEN, b"{}", &HeaderMap::new()));
    }

    #[test]
    fn test_malformed_hex() {
        assert!(!verify_signature(TOKEN, b"{}", "not-hex"));
        assert!(!verify_signature(TOKEN, b"{}", "abcd"));
    }
}
