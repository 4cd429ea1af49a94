//! Payment gateway client.

use crate::config::settings::RazorpaySettings;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id, e.g. `order_Nd3...`
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Creates orders and checks payment signatures.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id the client checkout needs.
    fn key_id(&self) -> &str;

    /// Creates an order for `amount_minor` (paise for INR).
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str)
    -> Result<GatewayOrder>;

    /// Whether `signature` authenticates the `(order_id, payment_id)` pair.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// Razorpay REST client.
#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayClient {
    /// Creates a client with the configured credentials.
    #[must_use]
    pub fn new(settings: &RazorpaySettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id: settings.key_id.clone(),
            key_secret: settings.key_secret.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// HMAC-SHA256 over `order_id|payment_id` keyed with the gateway secret.
fn signing_mac(secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::internal(format!("Invalid gateway secret: {e}")))?;
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    Ok(mac)
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&OrderRequest {
                amount: amount_minor,
                currency,
                receipt,
                payment_capture: 1,
            })
            .send()
            .await
            .map_err(|e| Error::external("payment", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "Order creation rejected: {}", detail);
            return Err(Error::external(
                "payment",
                format!("Order creation rejected with {status}"),
            ));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| Error::external("payment", e))?;
        info!(order_id = %order.id, "Created gateway order");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        signing_mac(&self.key_secret, order_id, payment_id)
            .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

/// Stand-in used when no gateway credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    fn key_id(&self) -> &str {
        ""
    }

    async fn create_order(&self, _: i64, _: &str, _: &str) -> Result<GatewayOrder> {
        Err(Error::external("payment", "Payment gateway is not configured"))
    }

    fn verify_signature(&self, _: &str, _: &str, _: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    /// Hex signature as the gateway would send it.
    fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
        hex::encode(
            signing_mac(secret, order_id, payment_id)
                .unwrap()
                .finalize()
                .into_bytes(),
        )
    }

    fn client() -> RazorpayClient {
        RazorpayClient::new(&RazorpaySettings {
            key_id: "rzp_test_key".to_string(),
            key_secret: "gateway-secret".to_string(),
            base_url: "https://api.razorpay.com/v1/".to_string(),
        })
    }

    #[test]
    fn test_signature_round_trip() {
        let gateway = client();
        let signature = payment_signature("gateway-secret", "order_1", "pay_1");
        assert_eq!(signature.len(), 64);
        assert!(gateway.verify_signature("order_1", "pay_1", &signature));
        assert!(gateway.verify_signature("order_1", "pay_1", &signature.to_uppercase()));
    }

    #[test]
    fn test_tampered_signatures_fail() {
        let gateway = client();
        let signature = payment_signature("gateway-secret", "order_1", "pay_1");
        assert!(!gateway.verify_signature("order_1", "pay_2", &signature));
        assert!(!gateway.verify_signature("order_1", "pay_1", "zz-not-hex"));
        let foreign = payment_signature("other-secret", "order_1", "pay_1");
        assert!(!gateway.verify_signature("order_1", "pay_1", &foreign));
    }

    #[test]
    fn test_accepts_signature_over_order_and_payment_ids() {
        let mut mac = HmacSha256::new_from_slice(b"gateway-secret").unwrap();
        mac.update(b"order_9|pay_9");
        let signature = hex::encode(mac.finalize().into_bytes());
        assert_eq!(signature, payment_signature("gateway-secret", "order_9", "pay_9"));
        assert!(client().verify_signature("order_9", "pay_9", &signature));
        assert!(!client().verify_signature("pay_9", "order_9", &signature));
    }

    #[test]
    fn test_base_url_is_normalized() {
        assert_eq!(client().base_url, "https://api.razorpay.com/v1");
        assert_eq!(client().key_id(), "rzp_test_key");
    }

    #[tokio::test]
    async fn test_disabled_gateway() {
        let gateway = DisabledGateway;
        assert!(!gateway.verify_signature("o", "p", "s"));
        assert!(matches!(
            gateway.create_order(100, "INR", "investment_1").await,
            Err(Error::ExternalService { .. })
        ));
    }
}
