use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handlers::common::{
    map_service_error, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item,
    },
    errors::{ApiError, ServiceError},
    services::order_status::Actor,
    services::orders::OrderFilter,
    AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/mine", get(my_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
    pub item_count: i32,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub is_delivery: bool,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            customer_name: model.customer_name,
            phone: model.phone,
            address: model.address,
            email: model.email,
            item_count: model.item_count,
            total_amount: model.total_amount,
            status: model.status,
            payment_status: model.payment_status,
            razorpay_order_id: model.razorpay_order_id,
            razorpay_payment_id: model.razorpay_payment_id,
            is_delivery: model.is_delivery,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub thumbnail: Option<String>,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            product_id: model.product_id,
            name: model.name,
            category: model.category,
            unit_price: model.unit_price,
            quantity: model.quantity,
            thumbnail: model.thumbnail,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

impl OrderDetailResponse {
    pub fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            order: OrderResponse::from(order),
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// List all orders with filter and paging (admin)
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("status" = Option<String>, Query, description = "Status equality filter"),
        ("search" = Option<String>, Query, description = "Substring match across name/email/phone"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Orders page"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        search: query.search,
    };
    let page = state
        .services
        .orders
        .list_paged(filter, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<OrderResponse> = page.orders.into_iter().map(OrderResponse::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data, page.page, page.per_page, page.total,
    )))
}

/// List the authenticated customer's own orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    params(PaginationParams),
    responses((status = 200, description = "Customer's orders page")),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_for_customer(user.user_id, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<OrderResponse> = page.orders.into_iter().map(OrderResponse::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data, page.page, page.per_page, page.total,
    )))
}

/// Fetch one order with its line items (owner or admin)
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = OrderDetailResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .services
        .orders
        .find_with_items(id)
        .await
        .map_err(map_service_error)?;

    let Some((order, items)) = found else {
        return Err(ApiError::NotFound(format!("Order {} not found", id)));
    };

    if !user.is_admin() && order.user_id != Some(user.user_id) {
        return Err(map_service_error(ServiceError::Forbidden(
            "You can only view your own orders".to_string(),
        )));
    }

    Ok(success_response(OrderDetailResponse::from_parts(
        order, items,
    )))
}

/// Advance or cancel an order (admin)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Illegal transition"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .services
        .lifecycle
        .transition(id, payload.status, Actor::Admin)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderResponse::from(updated)))
}

/// Cancel the authenticated customer's own pending order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is no longer pending")
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cancelled = state
        .services
        .lifecycle
        .cancel_own(id, user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderResponse::from(cancelled)))
}
