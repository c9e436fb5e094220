use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{self, Entity as OrderEntity, OrderStatus, PaymentStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
};

/// Proof that the purchase is settled, required before any insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentProof {
    /// Verified gateway payment pair
    Gateway {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// Settlement happens in person; requires this explicit flag
    PayAtPickup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub thumbnail: Option<String>,
}

/// Everything captured at checkout time. The customer and item snapshots are
/// immutable once persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
    pub items: Vec<NewOrderItem>,
    /// Coupon discount already computed upstream; zero when none applied
    pub discount: Decimal,
    pub payment: PaymentProof,
    pub is_delivery: bool,
}

impl NewOrder {
    /// Field presence checks performed before anything is written.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.customer_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Customer phone is required".to_string(),
            ));
        }
        if self.address.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Delivery address is required".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "An order needs at least one item".to_string(),
            ));
        }
        if self.items.iter().any(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "Item quantities must be at least 1".to_string(),
            ));
        }
        if let PaymentProof::Gateway {
            gateway_order_id,
            gateway_payment_id,
        } = &self.payment
        {
            if gateway_order_id.is_empty() || gateway_payment_id.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Gateway orders require both payment identifiers".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Sum of quantities across the snapshot.
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of unit price x quantity, before any discount.
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }

    /// Subtotal net of discount, clamped at zero.
    pub fn total(&self) -> Decimal {
        (self.subtotal() - self.discount).max(Decimal::ZERO)
    }
}

/// Status-equality plus case-insensitive substring search across
/// name/email/phone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

#[derive(Debug)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Durable store of orders. Inserts always capture a point-in-time snapshot
/// of cart contents and computed totals; only `status` changes afterwards.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists a new order with status `pending` and returns the stored
    /// record including its repository-assigned id.
    #[instrument(skip(self, new_order), fields(customer = %new_order.customer_name))]
    pub async fn insert(
        &self,
        new_order: NewOrder,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        new_order.validate()?;

        let payment_status = match &new_order.payment {
            PaymentProof::Gateway { .. } => PaymentStatus::Paid,
            PaymentProof::PayAtPickup => PaymentStatus::PayAtPickup,
        };
        let (razorpay_order_id, razorpay_payment_id) = match &new_order.payment {
            PaymentProof::Gateway {
                gateway_order_id,
                gateway_payment_id,
            } => (
                Some(gateway_order_id.clone()),
                Some(gateway_payment_id.clone()),
            ),
            PaymentProof::PayAtPickup => (None, None),
        };

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order insert");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = order::ActiveModel {
            customer_name: Set(new_order.customer_name.clone()),
            phone: Set(new_order.phone.clone()),
            address: Set(new_order.address.clone()),
            email: Set(new_order.email.clone()),
            user_id: Set(new_order.user_id),
            item_count: Set(new_order.item_count()),
            total_amount: Set(new_order.total()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(payment_status),
            razorpay_order_id: Set(razorpay_order_id),
            razorpay_payment_id: Set(razorpay_payment_id),
            is_delivery: Set(new_order.is_delivery),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut item_models = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let stored = order_item::ActiveModel {
                order_id: Set(order_model.id),
                product_id: Set(item.product_id.clone()),
                name: Set(item.name.clone()),
                category: Set(item.category.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity),
                thumbnail: Set(item.thumbnail.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            item_models.push(stored);
        }

        txn.commit().await?;

        info!(
            order_id = order_model.id,
            total = %order_model.total_amount,
            items = item_models.len(),
            "Order persisted"
        );
        Ok((order_model, item_models))
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, order_id: i64) -> Result<Option<order::Model>, ServiceError> {
        Ok(OrderEntity::find_by_id(order_id).one(&*self.db).await?)
    }

    /// Order together with its line-item snapshot.
    #[instrument(skip(self))]
    pub async fn find_with_items(
        &self,
        order_id: i64,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        let Some(found) = OrderEntity::find_by_id(order_id).one(&*self.db).await? else {
            return Ok(None);
        };
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(Some((found, items)))
    }

    /// Administrative listing: unscoped, newest first.
    #[instrument(skip(self))]
    pub async fn list_paged(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let mut query = OrderEntity::find();

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(term) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", term.trim().to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(order::Column::CustomerName)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(order::Column::Email)))
                            .like(pattern.clone()),
                    )
                    .add(Expr::expr(Func::lower(Expr::col(order::Column::Phone))).like(pattern)),
            );
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Customer-scoped listing: only the requester's own orders.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Unconditional status write. Transition legality belongs to the
    /// lifecycle service; this only fails when the order does not exist.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let found = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                warn!(order_id, "Order not found for status update");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let mut active: order::ActiveModel = found.into();
        active.status = Set(new_status);
        Ok(active.update(&*self.db).await?)
    }

    /// Conditional status write: applies only if the current status still
    /// equals `expected_from` at write time. Returns whether the row was
    /// updated, letting racing transitions resolve to exactly one winner.
    #[instrument(skip(self))]
    pub async fn update_status_if(
        &self,
        order_id: i64,
        expected_from: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<bool, ServiceError> {
        let result = OrderEntity::update_many()
            .set(order::ActiveModel {
                status: Set(new_status),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(expected_from))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32) -> NewOrderItem {
        NewOrderItem {
            product_id: "hamper-festive".to_string(),
            name: "Festive Hamper".to_string(),
            category: "hampers".to_string(),
            unit_price: price,
            quantity,
            thumbnail: None,
        }
    }

    fn base_order() -> NewOrder {
        NewOrder {
            customer_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            address: "12 MG Road, Bengaluru".to_string(),
            email: Some("asha@example.com".to_string()),
            user_id: Some(Uuid::new_v4()),
            items: vec![item(dec!(450), 2), item(dec!(100), 1)],
            discount: Decimal::ZERO,
            payment: PaymentProof::Gateway {
                gateway_order_id: "order_abc".to_string(),
                gateway_payment_id: "pay_xyz".to_string(),
            },
            is_delivery: true,
        }
    }

    #[test]
    fn totals_sum_price_times_quantity() {
        let order = base_order();
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.subtotal(), dec!(1000));
        assert_eq!(order.total(), dec!(1000));
    }

    #[test]
    fn discount_reduces_total_and_clamps_at_zero() {
        let mut order = base_order();
        order.discount = dec!(100);
        assert_eq!(order.total(), dec!(900));

        order.discount = dec!(5000);
        assert_eq!(order.total(), dec!(0));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut order = base_order();
        order.customer_name = "  ".to_string();
        assert!(order.validate().is_err());

        let mut order = base_order();
        order.address = String::new();
        assert!(order.validate().is_err());

        let mut order = base_order();
        order.items.clear();
        assert!(order.validate().is_err());
    }

    #[test]
    fn gateway_order_requires_both_identifiers() {
        let mut order = base_order();
        order.payment = PaymentProof::Gateway {
            gateway_order_id: "order_abc".to_string(),
            gateway_payment_id: String::new(),
        };
        assert!(order.validate().is_err());
    }

    #[test]
    fn pickup_order_needs_no_gateway_identifiers() {
        let mut order = base_order();
        order.payment = PaymentProof::PayAtPickup;
        assert!(order.validate().is_ok());
    }

    #[test]
    fn zero_quantity_items_are_rejected() {
        let mut order = base_order();
        order.items.push(item(dec!(10), 0));
        assert!(order.validate().is_err());
    }
}
