use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AdminUser,
    entities::coupon,
    errors::ApiError,
    services::coupons::{CouponOutcome, CreateCouponRequest, UpdateCouponRequest},
    AppState,
};

/// Customer-facing validation plus admin CRUD.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_coupon))
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:id", put(update_coupon).delete(delete_coupon))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// Outcome of a validation attempt. `valid: false` is an ordinary response,
/// shown inline next to the coupon input.
#[derive(Debug, Serialize, ToSchema)]
pub struct CouponValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponResponse {
    pub id: i64,
    pub code: String,
    pub percent: i32,
    pub valid_from: NaiveDate,
    pub valid_till: NaiveDate,
    pub min_spend: Decimal,
}

impl From<coupon::Model> for CouponResponse {
    fn from(model: coupon::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            percent: model.percent,
            valid_from: model.valid_from,
            valid_till: model.valid_till,
            min_spend: model.min_spend,
        }
    }
}

/// Check a coupon code against the current cart subtotal
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome", body = CouponValidationResponse)
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .coupons
        .validate(&payload.code, payload.subtotal)
        .await
        .map_err(map_service_error)?;

    let response = match outcome {
        CouponOutcome::Applied(applied) => CouponValidationResponse {
            valid: true,
            code: Some(applied.code),
            percent: Some(applied.percent),
            discount: Some(applied.discount),
            message: None,
        },
        CouponOutcome::Rejected(rejection) => CouponValidationResponse {
            valid: false,
            code: None,
            percent: None,
            discount: None,
            message: Some(rejection.to_string()),
        },
    };

    Ok(success_response(response))
}

/// List coupons (admin)
#[utoipa::path(
    get,
    path = "/api/v1/coupons",
    params(PaginationParams),
    responses(
        (status = 200, description = "Coupons page"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (coupons, total) = state
        .services
        .coupons
        .list(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<CouponResponse> = coupons.into_iter().map(CouponResponse::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Create a coupon (admin)
#[utoipa::path(
    post,
    path = "/api/v1/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = CouponResponse),
        (status = 400, description = "Invalid coupon definition"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .coupons
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(CouponResponse::from(created)))
}

/// Update a coupon (admin)
#[utoipa::path(
    put,
    path = "/api/v1/coupons/{id}",
    params(("id" = i64, Path, description = "Coupon id")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated", body = CouponResponse),
        (status = 404, description = "Coupon not found"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let updated = state
        .services
        .coupons
        .update(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(CouponResponse::from(updated)))
}

/// Delete a coupon (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/coupons/{id}",
    params(("id" = i64, Path, description = "Coupon id")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found"),
        (status = 403, description = "Admin privileges required")
    ),
    tag = "Coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .coupons
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
