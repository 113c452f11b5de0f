//! Razorpay-compatible orders API client and signature verification.
//!
//! The gateway callback signs `orderId|paymentId` with HMAC-SHA256 over
//! the shared key secret; verification recomputes the hex digest and
//! compares exactly.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub enum PaymentError {
    ApiError(String),
    NetworkError(String),
    ParseError(String),
    NotConfigured,
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiError(e) => write!(f, "Gateway API error: {e}"),
            Self::NetworkError(e) => write!(f, "Network error: {e}"),
            Self::ParseError(e) => write!(f, "Parse error: {e}"),
            Self::NotConfigured => write!(f, "Payment gateway is not configured"),
        }
    }
}

impl std::error::Error for PaymentError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentClient {
    key_id: String,
    key_secret: String,
    client: reqwest::Client,
    base_url: String,
}

impl PaymentClient {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }

    /// Creates a gateway order; `amount` is in minor currency units.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        if !self.is_configured() {
            return Err(PaymentError::NotConfigured);
        }

        log::info!(
            "Creating gateway order: {} {} (receipt {})",
            amount,
            currency,
            receipt
        );

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    pub fn compute_signature(&self, order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
        compute_signature(&self.key_secret, order_id, payment_id)
    }

    /// Exact string comparison against the gateway-supplied hex digest.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, PaymentError> {
        Ok(self.compute_signature(order_id, payment_id)? == signature)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct GatewayApiError {
                error: GatewayApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct GatewayApiErrorDetail {
                description: String,
            }

            if let Ok(error) = serde_json::from_str::<GatewayApiError>(&body) {
                return Err(PaymentError::ApiError(error.error.description));
            }

            return Err(PaymentError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::ParseError(e.to_string()))
    }
}

pub fn compute_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
) -> Result<String, PaymentError> {
    let payload = format!("{}|{}", order_id, payment_id);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Random alphanumeric receipt token for order creation.
pub fn generate_receipt() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            let chars = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
            chars[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    // Digest checked against `echo -n "order_1|pay_1" | openssl dgst
    // -sha256 -hmac "s3cret"`.
    const KNOWN_SIGNATURE: &str =
        "44422d618d76e6e81c5f002f4d5108385750b52eb8db4e9c7a4231ddfac02840";

    fn test_client(secret: &str) -> PaymentClient {
        PaymentClient::new(&PaymentConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: secret.to_string(),
            api_url: "https://api.razorpay.com/v1".to_string(),
        })
    }

    #[test]
    fn test_compute_signature_known_vector() {
        test_util::setup();
        let sig = compute_signature("s3cret", "order_1", "pay_1").unwrap();
        assert_eq!(sig, KNOWN_SIGNATURE);
    }

    #[test]
    fn test_verify_signature_accepts_valid() {
        test_util::setup();
        let client = test_client("s3cret");
        assert!(client
            .verify_signature("order_1", "pay_1", KNOWN_SIGNATURE)
            .unwrap());
    }

    #[test]
    fn test_verify_signature_rejects_tampering() {
        test_util::setup();
        let client = test_client("s3cret");
        assert!(!client
            .verify_signature("order_1", "pay_2", KNOWN_SIGNATURE)
            .unwrap());
        assert!(!client
            .verify_signature("order_2", "pay_1", KNOWN_SIGNATURE)
            .unwrap());
        assert!(!client.verify_signature("order_1", "pay_1", "").unwrap());
    }

    #[test]
    fn test_verify_signature_depends_on_secret() {
        test_util::setup();
        let client = test_client("another-secret");
        assert!(!client
            .verify_signature("order_1", "pay_1", KNOWN_SIGNATURE)
            .unwrap());
    }

    #[test]
    fn test_generate_receipt_shape() {
        test_util::setup();
        let receipt = generate_receipt();
        assert_eq!(receipt.len(), 32);
        assert!(receipt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(receipt, generate_receipt());
    }
}
