use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::order::{self, OrderStatus};
use crate::services::notifications::{NotificationKind, NotificationService};

/// Who triggered a status transition. Cancellation notices go to different
/// audiences depending on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Admin,
    Customer,
}

/// Events emitted by the checkout and lifecycle services. Each event is
/// observed after its state change has committed; consumers must never feed
/// back into the triggering operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: i64,
    },
    OrderStatusChanged {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
        actor: ActorKind,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

fn notification_for(event: &Event) -> Option<(i64, NotificationKind)> {
    match event {
        Event::OrderPlaced { order_id } => Some((*order_id, NotificationKind::NewOrder)),
        Event::OrderStatusChanged {
            order_id,
            to: OrderStatus::Processing,
            ..
        } => Some((*order_id, NotificationKind::Accepted)),
        Event::OrderStatusChanged {
            order_id,
            to: OrderStatus::Completed,
            ..
        } => Some((*order_id, NotificationKind::Delivered)),
        Event::OrderStatusChanged {
            order_id,
            to: OrderStatus::Cancelled,
            actor,
            ..
        } => Some((
            *order_id,
            match actor {
                ActorKind::Admin => NotificationKind::AdminCancelled,
                ActorKind::Customer => NotificationKind::CustomerCancelled,
            },
        )),
        Event::OrderStatusChanged { .. } => None,
    }
}

/// Consumes events and dispatches the matching notification for each one.
/// Delivery is at-most-once, best effort: failures are logged and dropped,
/// because the state change being reported has already committed.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    db: Arc<DatabaseConnection>,
    notifier: Arc<NotificationService>,
) {
    while let Some(event) = rx.recv().await {
        let Some((order_id, kind)) = notification_for(&event) else {
            continue;
        };

        let loaded = order::Entity::find_by_id(order_id).one(&*db).await;
        match loaded {
            Ok(Some(order)) => {
                let delivered = notifier.send(kind, &order).await;
                if delivered {
                    info!(order_id, kind = %kind, "Notification dispatched");
                } else {
                    warn!(order_id, kind = %kind, "Notification delivery failed; dropping");
                }
            }
            Ok(None) => {
                warn!(order_id, "Notification skipped: order no longer exists");
            }
            Err(e) => {
                warn!(order_id, error = %e, "Notification skipped: failed to load order");
            }
        }
    }
    info!("Event channel closed; notification dispatcher stopping");
}
