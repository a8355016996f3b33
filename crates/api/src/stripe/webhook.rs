//! Stripe webhook signature verification and event parsing.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` is an HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint's signing secret. More than one `v1` appears while a secret is
//! being rolled.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use super::PaymentIntent;

/// Maximum age of a signed payload, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("no v1 signature")]
    MissingSignature,

    #[error("timestamp outside tolerance")]
    Stale,

    #[error("signature mismatch")]
    Mismatch,
}

/// Check a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns a `SignatureError` describing the first check that failed.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &SecretString,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let mac = signed_payload_mac(payload, secret, timestamp)?;

    // verify_slice compares in constant time
    if signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a valid `Stripe-Signature` header for `payload`.
///
/// Used by tests and local tooling that replays events.
#[must_use]
pub fn signature_header(payload: &[u8], secret: &SecretString, timestamp: i64) -> String {
    let signature = signed_payload_mac(payload, secret, timestamp)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("t={timestamp},v1={signature}")
}

fn signed_payload_mac(
    payload: &[u8],
    secret: &SecretString,
    timestamp: i64,
) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Parse the event's object as a payment intent.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the object is not a payment intent.
    pub fn payment_intent(&self) -> Result<PaymentIntent, serde_json::Error> {
        PaymentIntent::deserialize(&self.data.object)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stripe::IntentStatus;

    const NOW: i64 = 1_700_000_000;

    fn secret() -> SecretString {
        SecretString::from("whsec_7Fq2Lx9Vm4Rt1Kc8Nz3Bw6Hp5Jd0Ys")
    }

    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_valid_signature() {
        let header = signature_header(PAYLOAD, &secret(), NOW);
        assert_eq!(verify_signature(PAYLOAD, &header, &secret(), NOW), Ok(()));
        assert_eq!(
            verify_signature(PAYLOAD, &header, &secret(), NOW + 299),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = signature_header(PAYLOAD, &secret(), NOW);
        let tampered = br#"{"id":"evt_1","type":"payment_intent.payment_failed"}"#;
        assert_eq!(
            verify_signature(tampered, &header, &secret(), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = signature_header(PAYLOAD, &SecretString::from("whsec_other"), NOW);
        assert_eq!(
            verify_signature(PAYLOAD, &header, &secret(), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = signature_header(PAYLOAD, &secret(), NOW - 301);
        assert_eq!(
            verify_signature(PAYLOAD, &header, &secret(), NOW),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let signature = "ab".repeat(32);
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1={signature}");
            assert_eq!(
                verify_signature(PAYLOAD, &header, &secret(), NOW),
                Err(SignatureError::Stale)
            );
        }
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(PAYLOAD, "", &secret(), NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(PAYLOAD, "t=1700000000", &secret(), NOW),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_signature(PAYLOAD, "t=1700000000,v1=not-hex", &secret(), NOW),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn test_any_of_several_signatures_accepted() {
        let good = signature_header(PAYLOAD, &secret(), NOW);
        let v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v0=abc,v1={},v1={v1}", "00".repeat(32));
        assert_eq!(verify_signature(PAYLOAD, &header, &secret(), NOW), Ok(()));
    }

    #[test]
    fn test_event_payment_intent() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": PAYMENT_SUCCEEDED,
            "data": { "object": {
                "id": "pi_1",
                "amount": 11880,
                "currency": "usd",
                "status": "succeeded",
                "metadata": {}
            }}
        }))
        .unwrap();

        assert_eq!(event.event_type, PAYMENT_SUCCEEDED);
        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.id, "pi_1");
        assert_eq!(intent.status, IntentStatus::Succeeded);
    }
}
