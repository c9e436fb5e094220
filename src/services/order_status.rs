use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    events::{ActorKind, Event, EventSender},
    services::orders::OrderService,
};

/// Who is requesting a transition. Customers must additionally prove
/// ownership of the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Customer { user_id: Uuid },
}

impl Actor {
    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::Admin => ActorKind::Admin,
            Actor::Customer { .. } => ActorKind::Customer,
        }
    }
}

/// The transition table. Anything not listed here is illegal; terminal
/// states accept nothing, and customers may only cancel from `pending`.
pub fn is_allowed(from: OrderStatus, to: OrderStatus, actor: &Actor) -> bool {
    let admin = matches!(actor, Actor::Admin);
    match (from, to) {
        (OrderStatus::Pending, OrderStatus::Processing) => admin,
        (OrderStatus::Pending, OrderStatus::Cancelled) => true,
        (OrderStatus::Processing, OrderStatus::Completed) => admin,
        (OrderStatus::Processing, OrderStatus::Cancelled) => admin,
        _ => false,
    }
}

/// Governs order status transitions and fires exactly one notification per
/// committed transition.
#[derive(Clone)]
pub struct OrderLifecycleService {
    orders: Arc<OrderService>,
    events: EventSender,
}

impl OrderLifecycleService {
    pub fn new(orders: Arc<OrderService>, events: EventSender) -> Self {
        Self { orders, events }
    }

    /// Applies a transition on behalf of `actor`.
    ///
    /// The precondition is enforced twice: once against the freshly-read
    /// status to produce a precise error, and again inside the conditional
    /// write so a racing transition cannot slip through between the two.
    #[instrument(skip(self), fields(order_id = %order_id, to = %to))]
    pub async fn transition(
        &self,
        order_id: i64,
        to: OrderStatus,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let current = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        // Ownership is checked before the state precondition
        if let Actor::Customer { user_id } = &actor {
            if current.user_id != Some(*user_id) {
                warn!(order_id, "Customer attempted to act on an order they do not own");
                return Err(ServiceError::Forbidden(
                    "You can only cancel your own orders".to_string(),
                ));
            }
        }

        let from = current.status;
        if !is_allowed(from, to, &actor) {
            return Err(ServiceError::IllegalTransition { from, to });
        }

        let applied = self.orders.update_status_if(order_id, from, to).await?;
        if !applied {
            // Lost the race: report against whatever won
            return match self.orders.find_by_id(order_id).await? {
                Some(latest) => Err(ServiceError::IllegalTransition {
                    from: latest.status,
                    to,
                }),
                None => Err(ServiceError::NotFound(format!("Order {} not found", order_id))),
            };
        }

        let updated = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        info!(order_id, from = %from, to = %to, "Order status updated");

        // The transition has committed; a failed notification must not undo it
        if let Err(e) = self
            .events
            .send(Event::OrderStatusChanged {
                order_id,
                from,
                to,
                actor: actor.kind(),
            })
            .await
        {
            warn!(order_id, error = %e, "Failed to queue status notification");
        }

        Ok(updated)
    }

    /// Customer-initiated cancellation of their own `pending` order.
    #[instrument(skip(self))]
    pub async fn cancel_own(
        &self,
        order_id: i64,
        user_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Cancelled, Actor::Customer { user_id })
            .await
    }
}
