use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hamperhouse API",
        version = "0.3.0",
        description = r#"
# Hamperhouse Storefront API

Backend for a gifting/hamper storefront: coupon validation, checkout with
online payment, order tracking, and back-office order and coupon management.

## Authentication

Customer and admin endpoints expect a bearer token minted by the external
identity provider:

```
Authorization: Bearer <token>
```

## Checkout flow

1. `POST /api/v1/checkout/intent` prices the cart (coupon included) and
   creates a gateway order.
2. The client completes payment in the gateway's own checkout UI.
3. `POST /api/v1/checkout/order` verifies the signed callback and persists
   the order; nothing is stored for unpaid or unverifiable attempts.
"#
    ),
    paths(
        crate::handlers::coupons::validate_coupon,
        crate::handlers::coupons::list_coupons,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::update_coupon,
        crate::handlers::coupons::delete_coupon,
        crate::handlers::checkout::create_payment_intent,
        crate::handlers::checkout::verify_payment,
        crate::handlers::checkout::place_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::coupons::ValidateCouponRequest,
        crate::handlers::coupons::CouponValidationResponse,
        crate::handlers::coupons::CouponResponse,
        crate::handlers::checkout::CheckoutIntentRequest,
        crate::handlers::checkout::VerifyPaymentRequest,
        crate::handlers::checkout::VerifyPaymentResponse,
        crate::handlers::orders::OrderResponse,
        crate::handlers::orders::OrderItemResponse,
        crate::handlers::orders::OrderDetailResponse,
        crate::handlers::orders::UpdateStatusRequest,
        crate::services::checkout::ShippingForm,
        crate::services::checkout::CartLine,
        crate::services::checkout::LinePricing,
        crate::services::checkout::CheckoutPayment,
        crate::services::checkout::PlaceOrder,
        crate::services::checkout::PaymentIntent,
        crate::services::coupons::CreateCouponRequest,
        crate::services::coupons::UpdateCouponRequest,
        crate::entities::order::OrderStatus,
        crate::entities::order::PaymentStatus,
    )),
    tags(
        (name = "Coupons", description = "Coupon validation and administration"),
        (name = "Checkout", description = "Payment intent, verification, and order placement"),
        (name = "Orders", description = "Order tracking and lifecycle management"),
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
