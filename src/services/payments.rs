use std::sync::Arc;

use hmac::{Hmac, Mac};
use http::HeaderMap;
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{PaymentConfig, ProviderCredentials},
    errors::ServiceError,
    services::orders::OrderService,
};

type HmacSha256 = Hmac<Sha256>;

/// Inbound side of the payment gateway integration. The gateway calls back
/// with a signed payload; a verified success event marks the order paid.
/// The client-side gateway protocol is out of scope.
pub struct PaymentService {
    config: PaymentConfig,
    orders: Arc<OrderService>,
}

impl PaymentService {
    pub fn new(config: PaymentConfig, orders: Arc<OrderService>) -> Self {
        Self { config, orders }
    }

    #[instrument(skip(self, headers, payload))]
    pub async fn handle_webhook(
        &self,
        provider: &str,
        headers: &HeaderMap,
        payload: &[u8],
    ) -> Result<(), ServiceError> {
        let credentials = self.credentials_for(provider)?;

        let secret = credentials.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "Webhook secret not configured for provider '{provider}'"
            ))
        })?;

        if !verify_signature(headers, payload, secret, self.config.webhook_tolerance_secs) {
            warn!(provider = %provider, "payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "Invalid webhook signature".to_string(),
            ));
        }

        let json: Value = serde_json::from_slice(payload).map_err(|e| {
            ServiceError::ValidationError(format!("Invalid webhook payload: {e}"))
        })?;

        let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match event_type {
            "payment.succeeded" | "charge.succeeded" => {
                let order_id = extract_order_id(&json).ok_or_else(|| {
                    ServiceError::ValidationError(
                        "Webhook payload carries no order id".to_string(),
                    )
                })?;
                self.orders.mark_paid(order_id).await?;
                info!(provider = %provider, order_id = %order_id, "payment confirmed via webhook");
            }
            "payment.failed" | "charge.failed" => {
                info!(provider = %provider, "payment failure reported via webhook");
            }
            other => {
                info!(provider = %provider, event_type = %other, "unhandled payment webhook type");
            }
        }

        Ok(())
    }

    fn credentials_for(&self, provider: &str) -> Result<&ProviderCredentials, ServiceError> {
        match provider {
            "stripe" => Ok(&self.config.stripe),
            "yookassa" => Ok(&self.config.yookassa),
            other => Err(ServiceError::NotFound(format!(
                "Unknown payment provider '{other}'"
            ))),
        }
    }
}

fn extract_order_id(json: &Value) -> Option<Uuid> {
    json.get("data")
        .and_then(|data| data.get("order_id"))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Generic HMAC verification: `x-timestamp` and `x-signature` headers over
/// `"{timestamp}.{payload}"`, plus Stripe-style `Stripe-Signature: t=..,v1=..`.
pub fn verify_signature(
    headers: &HeaderMap,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return signature_matches(ts, payload, secret, sig);
        }
    }

    if let Some(sig) = headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            return signature_matches(ts, payload, secret, v1);
        }
    }

    false
}

fn signature_matches(timestamp: &str, payload: &[u8], secret: &str, presented: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, presented)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Compute the signature a caller must present for a payload; shared with
/// the test harness.
pub fn sign_payload(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key len");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn signed_headers(secret: &str, payload: &[u8]) -> HeaderMap {
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign_payload(secret, &ts, payload);
        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());
        headers
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"type":"payment.succeeded"}"#;
        let headers = signed_headers("whsec_test", payload);
        assert!(verify_signature(&headers, payload, "whsec_test", 300));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = br#"{"type":"payment.succeeded"}"#;
        let headers = signed_headers("whsec_test", payload);
        assert!(!verify_signature(&headers, payload, "other_secret", 300));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = br#"{"type":"payment.succeeded"}"#;
        let headers = signed_headers("whsec_test", payload);
        assert!(!verify_signature(
            &headers,
            br#"{"type":"payment.failed"}"#,
            "whsec_test",
            300
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"{}";
        let ts = (chrono::Utc::now().timestamp() - 10_000).to_string();
        let sig = sign_payload("whsec_test", &ts, payload);
        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());
        assert!(!verify_signature(&headers, payload, "whsec_test", 300));
    }

    #[test]
    fn stripe_style_header_is_accepted() {
        let payload = br#"{"type":"charge.succeeded"}"#;
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign_payload("whsec_test", &ts, payload);
        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            HeaderValue::from_str(&format!("t={ts},v1={sig}")).unwrap(),
        );
        assert!(verify_signature(&headers, payload, "whsec_test", 300));
    }

    #[test]
    fn missing_headers_are_rejected() {
        assert!(!verify_signature(&HeaderMap::new(), b"{}", "whsec_test", 300));
    }

    #[test]
    fn order_id_extraction() {
        let id = Uuid::new_v4();
        let json: Value =
            serde_json::from_str(&format!(r#"{{"data":{{"order_id":"{id}"}}}}"#)).unwrap();
        assert_eq!(extract_order_id(&json), Some(id));
        assert_eq!(extract_order_id(&serde_json::json!({"data":{}})), None);
    }
}
