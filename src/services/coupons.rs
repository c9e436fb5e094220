use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    entities::coupon::{self, Entity as Coupon, Model as CouponModel},
    errors::ServiceError,
};

/// A successfully applied coupon: the code, its percentage, and the discount
/// it yields for the submitted subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponApplication {
    pub code: String,
    pub percent: i32,
    pub discount: Decimal,
}

/// Why a coupon did not apply. These are expected outcomes surfaced to the
/// customer, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    NotFound,
    NotYetActive { starts: NaiveDate },
    Expired { ended: NaiveDate },
    BelowMinimumSpend { required: Decimal },
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::NotFound => write!(f, "Coupon code not found"),
            CouponRejection::NotYetActive { starts } => {
                write!(f, "Coupon is not active until {}", starts)
            }
            CouponRejection::Expired { ended } => {
                write!(f, "Coupon expired on {}", ended)
            }
            CouponRejection::BelowMinimumSpend { required } => {
                write!(f, "Cart total must be at least {} to use this coupon", required)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponOutcome {
    Applied(CouponApplication),
    Rejected(CouponRejection),
}

/// Normalizes a customer-typed code for lookup; codes are stored uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Discount in whole currency units, rounded half-up.
pub fn discount_for(subtotal: Decimal, percent: i32) -> Decimal {
    (subtotal * Decimal::from(percent) / Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies the validity rules to an already-loaded coupon. The window is
/// inclusive on both boundary dates.
pub fn evaluate(model: &CouponModel, subtotal: Decimal, today: NaiveDate) -> CouponOutcome {
    if today < model.valid_from {
        return CouponOutcome::Rejected(CouponRejection::NotYetActive {
            starts: model.valid_from,
        });
    }
    if today > model.valid_till {
        return CouponOutcome::Rejected(CouponRejection::Expired {
            ended: model.valid_till,
        });
    }
    if subtotal < model.min_spend {
        return CouponOutcome::Rejected(CouponRejection::BelowMinimumSpend {
            required: model.min_spend,
        });
    }

    CouponOutcome::Applied(CouponApplication {
        code: model.code.clone(),
        percent: model.percent,
        discount: discount_for(subtotal, model.percent),
    })
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 40, message = "Coupon code is required"))]
    pub code: String,
    #[validate(range(min = 0, max = 100, message = "Percent must be between 0 and 100"))]
    pub percent: i32,
    pub valid_from: NaiveDate,
    pub valid_till: NaiveDate,
    pub min_spend: Decimal,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateCouponRequest {
    #[validate(range(min = 0, max = 100, message = "Percent must be between 0 and 100"))]
    pub percent: Option<i32>,
    pub valid_from: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
    pub min_spend: Option<Decimal>,
}

/// Coupon validation and administration.
///
/// Validation is read-only: no redemption counter exists, so a coupon may be
/// reused without bound.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Checks a code against today's date and the cart subtotal.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<CouponOutcome, ServiceError> {
        let normalized = normalize_code(code);
        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(normalized))
            .one(&*self.db)
            .await?;

        let Some(model) = found else {
            return Ok(CouponOutcome::Rejected(CouponRejection::NotFound));
        };

        Ok(evaluate(&model, subtotal, Utc::now().date_naive()))
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(&self, request: CreateCouponRequest) -> Result<CouponModel, ServiceError> {
        request.validate()?;
        if request.valid_till < request.valid_from {
            return Err(ServiceError::ValidationError(
                "Coupon validity window ends before it starts".to_string(),
            ));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            code: Set(normalize_code(&request.code)),
            percent: Set(request.percent),
            valid_from: Set(request.valid_from),
            valid_till: Set(request.valid_till),
            min_spend: Set(request.min_spend),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(coupon_id = model.id, code = %model.code, "Coupon created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: i64,
        request: UpdateCouponRequest,
    ) -> Result<CouponModel, ServiceError> {
        request.validate()?;

        let existing = Coupon::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;

        let valid_from = request.valid_from.unwrap_or(existing.valid_from);
        let valid_till = request.valid_till.unwrap_or(existing.valid_till);
        if valid_till < valid_from {
            return Err(ServiceError::ValidationError(
                "Coupon validity window ends before it starts".to_string(),
            ));
        }

        let mut active: coupon::ActiveModel = existing.into();
        if let Some(percent) = request.percent {
            active.percent = Set(percent);
        }
        active.valid_from = Set(valid_from);
        active.valid_till = Set(valid_till);
        if let Some(min_spend) = request.min_spend {
            active.min_spend = Set(min_spend);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        info!(coupon_id = updated.id, "Coupon updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }
        info!(coupon_id = id, "Coupon deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<CouponModel>, u64), ServiceError> {
        let paginator = Coupon::find()
            .order_by_asc(coupon::Column::ValidTill)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((coupons, total))
    }
}
