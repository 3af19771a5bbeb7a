//! Signed payment webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;
use nosh_core::payment::PaymentEvent;

/// Seconds of clock skew tolerated before a signed timestamp is a replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(payment_webhook))
}

/// Handle a payment processor webhook.
///
/// The signature covers the raw body, so the body is taken as [`Bytes`] and
/// parsed only after verification. Verification or parse failures are 4xx
/// with no state change; reconciler errors are 5xx so the processor retries.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing signature header".into()))?;

    if !verify_signature(
        &state.webhook_secret,
        signature,
        &body,
        Utc::now().timestamp(),
    ) {
        warn!("webhook signature verification failed");
        return Err(ApiError::BadRequest("invalid signature".into()));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?;
    let event = PaymentEvent::from_json(&payload)?;
    info!(event = ?event, "verified payment webhook");

    let outcome = state.reconciler.reconcile(event).await?;
    Ok(Json(json!({ "outcome": outcome.as_str() })))
}

/// Verify a `t=<unix>,v1=<hex>` signature header: HMAC-SHA256 over
/// `"{t}.{body}"`, with the timestamp bounded to the tolerance window.
fn verify_signature(secret: &str, header: &str, body: &[u8], now: i64) -> bool {
    let mut timestamp = None;
    let mut provided = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => provided = hex::decode(value).ok(),
            _ => {}
        }
    }
    let (Some(timestamp), Some(provided)) = (timestamp, provided) else {
        return false;
    };
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(body);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={digest}")
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign("whsec_test", 1_700_000_000, body);
        assert!(verify_signature("whsec_test", &header, body, 1_700_000_010));
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let body = b"{}";
        let header = sign("whsec_other", 1_700_000_000, body);
        assert!(!verify_signature("whsec_test", &header, body, 1_700_000_000));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let header = sign("whsec_test", 1_700_000_000, b"{\"amount\":100}");
        assert!(!verify_signature(
            "whsec_test",
            &header,
            b"{\"amount\":999}",
            1_700_000_000
        ));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let body = b"{}";
        let header = sign("whsec_test", 1_700_000_000, body);
        assert!(!verify_signature(
            "whsec_test",
            &header,
            body,
            1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1
        ));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(!verify_signature("whsec_test", "", b"{}", 0));
        assert!(!verify_signature("whsec_test", "t=notanumber,v1=ab", b"{}", 0));
        assert!(!verify_signature("whsec_test", "v1=abcd", b"{}", 0));
        assert!(!verify_signature("whsec_test", "t=100,v1=zz", b"{}", 100));
    }
}
