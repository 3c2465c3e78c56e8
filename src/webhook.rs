//! Inbound webhook authenticity check.
//!
//! The platform signs every delivery with two rotating keys:
//! `base64(HMAC-SHA256(key, body ‖ delivery_timestamp))`. A delivery is
//! accepted when it is fresh and at least one of the two signatures
//! verifies, so either key can be rotated without downtime.

use std::time::Duration;

use axum::http::HeaderMap;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::config::PlatformConfig;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "box-delivery-timestamp";
pub const PRIMARY_SIGNATURE_HEADER: &str = "box-signature-primary";
pub const SECONDARY_SIGNATURE_HEADER: &str = "box-signature-secondary";
pub const VERSION_HEADER: &str = "box-signature-version";
pub const ALGORITHM_HEADER: &str = "box-signature-algorithm";

const SIGNATURE_VERSION: &str = "1";
const SIGNATURE_ALGORITHM: &str = "HmacSHA256";

#[derive(Debug, Clone)]
pub struct SignatureValidator {
    primary_key: Option<String>,
    secondary_key: Option<String>,
    max_age: chrono::Duration,
}

impl SignatureValidator {
    /// Blank keys count as unconfigured and never verify a signature.
    pub fn new(primary_key: Option<String>, secondary_key: Option<String>, max_age: Duration) -> Self {
        Self {
            primary_key: primary_key.filter(|k| !k.trim().is_empty()),
            secondary_key: secondary_key.filter(|k| !k.trim().is_empty()),
            // chrono caps durations at i64::MAX milliseconds
            max_age: chrono::Duration::from_std(max_age)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000)),
        }
    }

    pub fn from_config(platform: &PlatformConfig) -> Self {
        Self::new(
            platform.primary_key.clone(),
            platform.secondary_key.clone(),
            platform.max_message_age(),
        )
    }

    /// True when the delivery is authentic and not older than the
    /// configured max age relative to `now`.
    pub fn validate(&self, body: &[u8], headers: &HeaderMap, now: DateTime<Utc>) -> bool {
        if header(headers, VERSION_HEADER) != Some(SIGNATURE_VERSION) {
            debug!("Rejecting delivery: unsupported signature version");
            return false;
        }
        if header(headers, ALGORITHM_HEADER) != Some(SIGNATURE_ALGORITHM) {
            debug!("Rejecting delivery: unsupported signature algorithm");
            return false;
        }

        let Some(timestamp) = header(headers, TIMESTAMP_HEADER) else {
            debug!("Rejecting delivery: no timestamp");
            return false;
        };
        let Ok(delivered_at) = DateTime::parse_from_rfc3339(timestamp) else {
            debug!("Rejecting delivery: bad timestamp '{timestamp}'");
            return false;
        };
        if now.signed_duration_since(delivered_at.with_timezone(&Utc)) > self.max_age {
            debug!("Rejecting delivery: timestamp {timestamp} is too old");
            return false;
        }

        let primary = self
            .primary_key
            .as_deref()
            .zip(header(headers, PRIMARY_SIGNATURE_HEADER));
        let secondary = self
            .secondary_key
            .as_deref()
            .zip(header(headers, SECONDARY_SIGNATURE_HEADER));

        [primary, secondary]
            .into_iter()
            .flatten()
            .any(|(key, signature)| verify(key, body, timestamp, signature))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn mac(key: &str, body: &[u8], timestamp: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(body);
    mac.update(timestamp.as_bytes());
    Some(mac)
}

fn verify(key: &str, body: &[u8], timestamp: &str, signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    mac(key, body, timestamp).is_some_and(|m| m.verify_slice(&expected).is_ok())
}

/// Signature the platform would send for `body` delivered at `timestamp`.
#[cfg(test)]
pub(crate) fn sign(key: &str, body: &[u8], timestamp: &str) -> String {
    let digest = mac(key, body, timestamp)
        .map(|m| m.finalize().into_bytes().to_vec())
        .unwrap_or_default();
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BODY: &[u8] = br#"{"id":"req-42"}"#;
    const TS: &str = "2024-05-01T12:00:00Z";
    const MAX_AGE: Duration = Duration::from_secs(600);

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:05:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn validator() -> SignatureValidator {
        SignatureValidator::new(Some("primary".into()), Some("secondary".into()), MAX_AGE)
    }

    /// Headers for a delivery signed with the given keys.
    pub(crate) fn signed_headers(
        body: &[u8],
        timestamp: &str,
        primary: Option<&str>,
        secondary: Option<&str>,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(timestamp).unwrap());
        headers.insert(VERSION_HEADER, HeaderValue::from_static("1"));
        headers.insert(ALGORITHM_HEADER, HeaderValue::from_static("HmacSHA256"));
        if let Some(key) = primary {
            headers.insert(
                PRIMARY_SIGNATURE_HEADER,
                HeaderValue::from_str(&sign(key, body, timestamp)).unwrap(),
            );
        }
        if let Some(key) = secondary {
            headers.insert(
                SECONDARY_SIGNATURE_HEADER,
                HeaderValue::from_str(&sign(key, body, timestamp)).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_sign_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        assert_eq!(
            sign("key", b"The quick brown fox jumps over the lazy ", "dog"),
            "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[test]
    fn test_both_signatures_valid() {
        let headers = signed_headers(BODY, TS, Some("primary"), Some("secondary"));
        assert!(validator().validate(BODY, &headers, now()));
    }

    #[test]
    fn test_either_signature_is_enough() {
        let only_secondary = signed_headers(BODY, TS, Some("rotated-away"), Some("secondary"));
        assert!(validator().validate(BODY, &only_secondary, now()));

        let only_primary = signed_headers(BODY, TS, Some("primary"), None);
        assert!(validator().validate(BODY, &only_primary, now()));
    }

    #[test]
    fn test_wrong_keys_rejected() {
        let headers = signed_headers(BODY, TS, Some("nope"), Some("also-nope"));
        assert!(!validator().validate(BODY, &headers, now()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let headers = signed_headers(BODY, TS, Some("primary"), Some("secondary"));
        assert!(!validator().validate(br#"{"id":"req-43"}"#, &headers, now()));
    }

    #[test]
    fn test_stale_delivery_rejected() {
        let headers = signed_headers(BODY, "2024-05-01T11:49:00Z", Some("primary"), None);
        assert!(!validator().validate(BODY, &headers, now()));

        // Exactly at the limit is still fine
        let headers = signed_headers(BODY, "2024-05-01T11:55:00Z", Some("primary"), None);
        assert!(validator().validate(BODY, &headers, now()));
    }

    #[test]
    fn test_version_and_algorithm_checked() {
        let mut headers = signed_headers(BODY, TS, Some("primary"), None);
        headers.insert(VERSION_HEADER, HeaderValue::from_static("2"));
        assert!(!validator().validate(BODY, &headers, now()));

        let mut headers = signed_headers(BODY, TS, Some("primary"), None);
        headers.insert(ALGORITHM_HEADER, HeaderValue::from_static("HmacSHA1"));
        assert!(!validator().validate(BODY, &headers, now()));
    }

    #[test]
    fn test_missing_or_garbled_headers_rejected() {
        assert!(!validator().validate(BODY, &HeaderMap::new(), now()));

        let mut headers = signed_headers(BODY, TS, Some("primary"), None);
        headers.insert(PRIMARY_SIGNATURE_HEADER, HeaderValue::from_static("%%not-base64%%"));
        assert!(!validator().validate(BODY, &headers, now()));

        let headers = signed_headers(BODY, "yesterday", Some("primary"), None);
        assert!(!validator().validate(BODY, &headers, now()));
    }

    #[test]
    fn test_unconfigured_key_never_matches() {
        let v = SignatureValidator::new(None, Some("secondary".into()), MAX_AGE);
        let headers = signed_headers(BODY, TS, Some("primary"), None);
        assert!(!v.validate(BODY, &headers, now()));
    }

    #[test]
    fn test_blank_key_never_matches() {
        let v = SignatureValidator::new(Some("real-secret".into()), Some(String::new()), MAX_AGE);
        let forged = signed_headers(BODY, TS, None, Some(""));
        assert!(!v.validate(BODY, &forged, now()));

        let v = SignatureValidator::new(Some("  ".into()), None, MAX_AGE);
        let forged = signed_headers(BODY, TS, Some("  "), None);
        assert!(!v.validate(BODY, &forged, now()));

        // The real key still works alongside a blank one
        let v = SignatureValidator::new(Some("real-secret".into()), Some(String::new()), MAX_AGE);
        let genuine = signed_headers(BODY, TS, Some("real-secret"), None);
        assert!(v.validate(BODY, &genuine, now()));
    }

    #[test]
    fn test_from_config_uses_max_age() {
        let platform = PlatformConfig {
            primary_key: Some("primary".into()),
            max_message_age_secs: 60,
            ..PlatformConfig::default()
        };
        let v = SignatureValidator::from_config(&platform);
        // Five minutes old, beyond the 60 s window
        let headers = signed_headers(BODY, TS, Some("primary"), None);
        assert!(!v.validate(BODY, &headers, now()));
    }
}
