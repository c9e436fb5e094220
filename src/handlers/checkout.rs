use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::handlers::orders::OrderDetailResponse;
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::checkout::{CartLine, PlaceOrder, ShippingForm},
    AppState,
};

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/intent", post(create_payment_intent))
        .route("/verify", post(verify_payment))
        .route("/order", post(place_order))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutIntentRequest {
    pub customer: ShippingForm,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
}

/// Create a gateway order for the priced cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout/intent",
    request_body = CheckoutIntentRequest,
    responses(
        (status = 200, description = "Gateway order to be paid", body = crate::services::checkout::PaymentIntent),
        (status = 400, description = "Invalid form, cart, or coupon"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    tag = "Checkout"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CheckoutIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = state
        .services
        .checkout
        .create_payment_intent(
            &payload.customer,
            &payload.items,
            payload.coupon_code.as_deref(),
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(intent))
}

/// Verify a payment callback signature
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerifyPaymentResponse),
        (status = 400, description = "Missing verification inputs")
    ),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let verified = state
        .services
        .checkout
        .verify_payment(
            &payload.razorpay_order_id,
            &payload.razorpay_payment_id,
            &payload.signature,
        )
        .map_err(map_service_error)?;

    Ok(success_response(VerifyPaymentResponse { verified }))
}

/// Place an order after payment (or with the pickup flag)
#[utoipa::path(
    post,
    path = "/api/v1/checkout/order",
    request_body = PlaceOrder,
    responses(
        (status = 201, description = "Order placed", body = OrderDetailResponse),
        (status = 400, description = "Invalid form, cart, or coupon"),
        (status = 402, description = "Payment signature did not verify"),
        (status = 500, description = "Payment captured but order not recorded; do not retry payment")
    ),
    tag = "Checkout"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, items) = state
        .services
        .checkout
        .place_order(payload, Some(user.user_id))
        .await
        .map_err(map_service_error)?;

    Ok(created_response(OrderDetailResponse::from_parts(
        order, items,
    )))
}
