use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    services::coupons::{CouponOutcome, CouponService},
    services::orders::{NewOrder, NewOrderItem, OrderService, PaymentProof},
    services::payments::{CustomerMeta, RazorpayGateway},
};

/// Customer-supplied shipping details, validated locally before any
/// network call.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ShippingForm {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub email: Option<String>,
}

pub fn validate_shipping(form: &ShippingForm) -> Result<(), ServiceError> {
    if form.name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Name is required".to_string(),
        ));
    }
    if form.phone.len() != 10 || !form.phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::ValidationError(
            "Phone number must be exactly 10 digits".to_string(),
        ));
    }
    if form.address.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Address is required".to_string(),
        ));
    }
    Ok(())
}

/// Price source for a cart line, resolved once at cart-build time so nothing
/// downstream branches on "does this field exist".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinePricing {
    Simple {
        price: Decimal,
    },
    /// A selected variation; its price supersedes the base product price
    Variant {
        variation_id: String,
        variation_name: String,
        price: Decimal,
    },
}

/// One line of the client-owned cart snapshot. The cart is passed explicitly
/// into the orchestrator; price-at-add-time semantics make it authoritative
/// for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub pricing: LinePricing,
}

impl CartLine {
    pub fn unit_price(&self) -> Decimal {
        match &self.pricing {
            LinePricing::Simple { price } => *price,
            LinePricing::Variant { price, .. } => *price,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.pricing {
            LinePricing::Simple { .. } => self.name.clone(),
            LinePricing::Variant { variation_name, .. } => {
                format!("{} ({})", self.name, variation_name)
            }
        }
    }

    fn to_snapshot(&self) -> NewOrderItem {
        NewOrderItem {
            product_id: self.product_id.clone(),
            name: self.display_name(),
            category: self.category.clone(),
            unit_price: self.unit_price(),
            quantity: self.quantity,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

pub fn cart_subtotal(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.unit_price() * Decimal::from(line.quantity))
        .sum()
}

/// Client-reported result of the gateway's own checkout flow, or the
/// explicit pickup designation.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckoutPayment {
    Gateway {
        razorpay_order_id: String,
        razorpay_payment_id: String,
        signature: String,
    },
    PayAtPickup,
}

/// One purchase attempt, from "user clicks pay" to "order exists or the
/// user sees a clear error".
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct PlaceOrder {
    pub customer: ShippingForm,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment: CheckoutPayment,
    #[serde(default = "default_is_delivery")]
    pub is_delivery: bool,
}

fn default_is_delivery() -> bool {
    true
}

/// Gateway order handed back to the client so it can open the gateway's
/// checkout UI.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PaymentIntent {
    pub razorpay_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Coordinates coupon, gateway, and repository for one checkout attempt.
#[derive(Clone)]
pub struct CheckoutService {
    coupons: Arc<CouponService>,
    gateway: Arc<RazorpayGateway>,
    orders: Arc<OrderService>,
    events: EventSender,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        coupons: Arc<CouponService>,
        gateway: Arc<RazorpayGateway>,
        orders: Arc<OrderService>,
        events: EventSender,
        currency: String,
    ) -> Self {
        Self {
            coupons,
            gateway,
            orders,
            events,
            currency,
        }
    }

    /// Resolves the coupon (if any) into a discount amount, surfacing the
    /// rejection reason when it does not apply.
    async fn resolve_discount(
        &self,
        coupon_code: Option<&str>,
        subtotal: Decimal,
    ) -> Result<Decimal, ServiceError> {
        let Some(code) = coupon_code.filter(|c| !c.trim().is_empty()) else {
            return Ok(Decimal::ZERO);
        };
        match self.coupons.validate(code, subtotal).await? {
            CouponOutcome::Applied(application) => Ok(application.discount),
            CouponOutcome::Rejected(rejection) => {
                Err(ServiceError::ValidationError(rejection.to_string()))
            }
        }
    }

    fn totals(subtotal: Decimal, discount: Decimal) -> Decimal {
        // The minimum-spend gate should keep discounts below the subtotal,
        // but clamp anyway
        (subtotal - discount).max(Decimal::ZERO)
    }

    fn validate_cart(items: &[CartLine]) -> Result<(), ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart is empty".to_string(),
            ));
        }
        if items.iter().any(|line| line.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Item quantities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Step 1-3 of a checkout attempt: validate locally, price the cart,
    /// create the gateway order to be paid. Nothing is persisted here; an
    /// unpaid gateway order simply goes stale.
    #[instrument(skip(self, form, items), fields(items = items.len()))]
    pub async fn create_payment_intent(
        &self,
        form: &ShippingForm,
        items: &[CartLine],
        coupon_code: Option<&str>,
    ) -> Result<PaymentIntent, ServiceError> {
        validate_shipping(form)?;
        Self::validate_cart(items)?;

        let subtotal = cart_subtotal(items);
        let discount = self.resolve_discount(coupon_code, subtotal).await?;
        let total = Self::totals(subtotal, discount);

        let meta = CustomerMeta {
            name: form.name.clone(),
            phone: form.phone.clone(),
        };
        let gateway_order = self
            .gateway
            .create_order(total, &self.currency, &meta)
            .await?;

        info!(
            gateway_order_id = %gateway_order.id,
            %total,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            razorpay_order_id: gateway_order.id,
            amount_minor: gateway_order.amount_minor,
            currency: gateway_order.currency,
            subtotal,
            discount,
            total,
        })
    }

    /// Steps 6-8: verify the callback, persist the order, notify the
    /// operator. The order is only created once the signature check passes
    /// or the purchase is explicitly pay-at-pickup.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn place_order(
        &self,
        request: PlaceOrder,
        user_id: Option<Uuid>,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        validate_shipping(&request.customer)?;
        Self::validate_cart(&request.items)?;

        let subtotal = cart_subtotal(&request.items);
        let discount = self
            .resolve_discount(request.coupon_code.as_deref(), subtotal)
            .await?;

        let proof = match &request.payment {
            CheckoutPayment::Gateway {
                razorpay_order_id,
                razorpay_payment_id,
                signature,
            } => {
                let verified = self.gateway.verify_payment(
                    razorpay_order_id,
                    razorpay_payment_id,
                    signature,
                )?;
                if !verified {
                    // Possible tampering: a forged callback would land here
                    warn!(
                        gateway_order_id = %razorpay_order_id,
                        gateway_payment_id = %razorpay_payment_id,
                        "Rejected order placement with unverifiable payment signature"
                    );
                    return Err(ServiceError::PaymentVerificationFailed);
                }
                PaymentProof::Gateway {
                    gateway_order_id: razorpay_order_id.clone(),
                    gateway_payment_id: razorpay_payment_id.clone(),
                }
            }
            CheckoutPayment::PayAtPickup => PaymentProof::PayAtPickup,
        };

        let new_order = NewOrder {
            customer_name: request.customer.name.clone(),
            phone: request.customer.phone.clone(),
            address: request.customer.address.clone(),
            email: request.customer.email.clone(),
            user_id,
            items: request.items.iter().map(CartLine::to_snapshot).collect(),
            discount,
            payment: proof.clone(),
            is_delivery: request.is_delivery,
        };

        let inserted = self.orders.insert(new_order).await;
        let (order_model, item_models) = match (inserted, &proof) {
            (Ok(stored), _) => stored,
            (
                Err(e),
                PaymentProof::Gateway {
                    gateway_order_id,
                    gateway_payment_id,
                },
            ) => {
                // Money has moved but no order record exists. Log both
                // gateway identifiers for manual reconciliation.
                error!(
                    gateway_order_id = %gateway_order_id,
                    gateway_payment_id = %gateway_payment_id,
                    error = %e,
                    "Order insert failed after verified payment"
                );
                return Err(ServiceError::PostPaymentRecordFailure {
                    gateway_order_id: gateway_order_id.clone(),
                    gateway_payment_id: gateway_payment_id.clone(),
                });
            }
            (Err(e), PaymentProof::PayAtPickup) => return Err(e),
        };

        info!(order_id = order_model.id, "Checkout complete");

        // Best-effort operator notice; the order already exists
        if let Err(e) = self
            .events
            .send(Event::OrderPlaced {
                order_id: order_model.id,
            })
            .await
        {
            warn!(order_id = order_model.id, error = %e, "Failed to queue new-order notification");
        }

        Ok((order_model, item_models))
    }

    /// Bare signature verification for clients that confirm the payment
    /// before submitting the full order payload.
    pub fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        self.gateway
            .verify_payment(gateway_order_id, gateway_payment_id, signature)
    }
}
