use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

/// Signatures older than this are rejected to blunt replay.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("checkout API responded {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Stale,

    #[error("signature mismatch")]
    Mismatch,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// A bare id, or the expanded intent object depending on the event.
    #[serde(default)]
    pub payment_intent: serde_json::Value,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn payment_intent_id(&self) -> Option<&str> {
        match &self.payment_intent {
            serde_json::Value::String(id) => Some(id),
            serde_json::Value::Object(obj) => obj.get("id").and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// Hosted-checkout client. Sessions are created with manual capture: the
/// card is authorized at checkout and only charged when an operator
/// approves the request.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_url: String,
    app_url: String,
}

impl StripeClient {
    pub fn new(
        http: reqwest::Client,
        secret_key: String,
        webhook_secret: String,
        api_url: String,
        app_url: String,
    ) -> Self {
        Self {
            http,
            secret_key,
            webhook_secret,
            api_url,
            app_url,
        }
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    pub async fn create_checkout_session(
        &self,
        lines: &[CheckoutLine],
        reservation_id: &str,
        cart_metadata: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                "payment_intent_data[capture_method]".into(),
                "manual".into(),
            ),
            (
                "success_url".into(),
                format!(
                    "{}/upsells/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.app_url
                ),
            ),
            ("cancel_url".into(), format!("{}/upsells", self.app_url)),
            ("metadata[reservation_id]".into(), reservation_id.into()),
            ("metadata[items]".into(), cart_metadata.into()),
        ];

        for (i, line) in lines.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                line.currency.to_lowercase(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                line.name.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                line.amount_cents.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), "1".into()));
        }

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Checkout session creation failed: {} {}", status, body);
            return Err(StripeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", self.api_url, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Checkout session fetch failed: {} {}", status, body);
            return Err(StripeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// Webhook signatures
// ============================================================================

/// The `Stripe-Signature` header carries `t=<unix>,v1=<hex hmac>` pairs; the
/// signed payload is `{t}.{raw body}`.
pub fn verify_webhook_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }

    let expected = sign_payload(secret, timestamp, payload);
    if candidates
        .iter()
        .any(|candidate| constant_time_eq(expected.as_bytes(), candidate.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_signature_roundtrip() {
        let payload = br#"{"type":"charge.captured"}"#;
        let now = 1_736_000_000;
        let header = format!("t={},v1={}", now, sign_payload(SECRET, now, payload));
        assert!(verify_webhook_signature(SECRET, &header, payload, now).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_736_000_000;
        let header = format!("t={},v1={}", now, sign_payload(SECRET, now, b"original"));
        assert_eq!(
            verify_webhook_signature(SECRET, &header, b"tampered", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let then = 1_736_000_000;
        let header = format!("t={},v1={}", then, sign_payload(SECRET, then, payload));
        assert_eq!(
            verify_webhook_signature(
                SECRET,
                &header,
                payload,
                then + SIGNATURE_TOLERANCE_SECS + 1
            ),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert_eq!(
            verify_webhook_signature(SECRET, "v1=deadbeef", b"{}", 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_webhook_signature(SECRET, "t=123", b"{}", 123),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_webhook_signature(SECRET, "", b"{}", 0),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_payment_intent_id_accepts_both_shapes() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_intent": "pi_plain",
        }))
        .unwrap();
        assert_eq!(session.payment_intent_id(), Some("pi_plain"));

        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_2",
            "payment_intent": { "id": "pi_expanded", "status": "requires_capture" },
        }))
        .unwrap();
        assert_eq!(session.payment_intent_id(), Some("pi_expanded"));

        let session: CheckoutSession =
            serde_json::from_value(serde_json::json!({ "id": "cs_3" })).unwrap();
        assert_eq!(session.payment_intent_id(), None);
    }

    #[test]
    fn test_signature_is_hex_encoded() {
        let sig = sign_payload(SECRET, 0, b"data");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
