//! Payment gateway client.
//!
//! Order creation goes over HTTPS with a bounded timeout; confirmation
//! payloads are verified locally from their HMAC-SHA256 signature, so the
//! verify step needs no gateway round-trip.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::ServiceError;

const REQUEST_TIMEOUT_SECONDS: u64 = 10;

type HmacSha256 = Hmac<Sha256>;

/// An order registered with the gateway, against which the client pays.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Clone)]
pub struct PaymentGatewayClient {
    http: Client,
    config: GatewayConfig,
}

impl PaymentGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Creates an order for `amount` minor units (paise).
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder, ServiceError> {
        if !self.is_configured() {
            return Err(ServiceError::UpstreamMisconfigured(
                "Payment gateway is not configured".to_string(),
            ));
        }

        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(format!("Order creation failed: {err}")))?;

        match response.status().as_u16() {
            401 => {
                return Err(ServiceError::UpstreamMisconfigured(
                    "Payment gateway rejected credentials".to_string(),
                ))
            }
            429 => {
                return Err(ServiceError::UpstreamRateLimited(
                    "Payment gateway rate limit exceeded".to_string(),
                ))
            }
            _ => {}
        }

        let response = response
            .error_for_status()
            .map_err(|err| ServiceError::Upstream(format!("Order creation failed: {err}")))?;

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|err| ServiceError::Upstream(format!("Malformed order response: {err}")))
    }

    /// Verifies a client-supplied confirmation signature in constant time.
    ///
    /// The expected value is HMAC-SHA256 over `"{order_id}|{payment_id}"`
    /// keyed with the gateway secret, hex-encoded.
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(&self.config.key_secret, order_id, payment_id, signature)
    }
}

pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(sig_bytes) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    // verify_slice compares in constant time.
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let sig = sign("secret", "order_1", "pay_1");
        assert!(verify_signature("secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn rejects_tampered_fields() {
        let sig = sign("secret", "order_1", "pay_1");
        assert!(!verify_signature("secret", "order_2", "pay_1", &sig));
        assert!(!verify_signature("secret", "order_1", "pay_2", &sig));
        assert!(!verify_signature("other", "order_1", "pay_1", &sig));
    }

    #[test]
    fn rejects_garbage_signatures() {
        assert!(!verify_signature("secret", "order_1", "pay_1", "not-hex"));
        assert!(!verify_signature("secret", "order_1", "pay_1", ""));
        assert!(!verify_signature("secret", "order_1", "pay_1", "deadbeef"));
    }
}
