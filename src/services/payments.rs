use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, instrument, warn};

use crate::{config::AppConfig, errors::ServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Customer details forwarded to the gateway's own records.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerMeta {
    pub name: String,
    pub phone: String,
}

/// A gateway-hosted order representing an amount to be collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in the gateway's minor-unit convention (paise)
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    notes: &'a CustomerMeta,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

/// Razorpay adapter: creates gateway orders and verifies payment callbacks.
///
/// Verification recomputes the callback signature server-side; the client's
/// report of the gateway popup outcome is never trusted.
#[derive(Clone)]
pub struct RazorpayGateway {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

/// Converts a major-unit amount to the gateway's minor-unit convention (x100).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).to_i64()
}

/// HMAC-SHA256 over `"{order_id}|{payment_id}"`, hex-encoded. This is the
/// sole proof that money actually moved.
pub fn compute_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
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

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            key_id,
            key_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.razorpay_key_id.clone(),
            cfg.razorpay_key_secret.clone(),
            cfg.razorpay_base_url.clone(),
        )
    }

    /// Creates a gateway order for `amount` major currency units.
    /// The amount is checked before any network call.
    #[instrument(skip(self, meta), fields(amount = %amount, currency = %currency))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        meta: &CustomerMeta,
    ) -> Result<GatewayOrder, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Payment amount must be positive".to_string(),
            ));
        }
        let amount_minor = to_minor_units(amount).ok_or_else(|| {
            ServiceError::InvalidInput("Payment amount out of range".to_string())
        })?;

        let body = CreateOrderBody {
            amount: amount_minor,
            currency,
            notes: meta,
        };

        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gateway order creation request failed");
                ServiceError::GatewayError(format!("order creation request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "Gateway rejected order creation");
            return Err(ServiceError::GatewayError(format!(
                "gateway returned {status} creating order"
            )));
        }

        let created: CreateOrderResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Gateway order creation returned malformed body");
            ServiceError::GatewayError(format!("malformed gateway response: {e}"))
        })?;

        Ok(GatewayOrder {
            id: created.id,
            amount_minor: created.amount,
            currency: created.currency,
        })
    }

    /// Verifies a payment callback. A mismatching signature is an expected,
    /// reportable outcome (`Ok(false)`), not a fault; missing inputs are a
    /// precondition failure.
    #[instrument(skip(self, signature), fields(order_id = %order_id, payment_id = %payment_id))]
    pub fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
            return Err(ServiceError::InvalidInput(
                "order id, payment id and signature are all required for verification"
                    .to_string(),
            ));
        }

        let expected = compute_signature(&self.key_secret, order_id, payment_id);
        let verified = constant_time_eq(&expected, signature);
        if !verified {
            warn!(order_id, payment_id, "Payment signature mismatch");
        }
        Ok(verified)
    }
}
