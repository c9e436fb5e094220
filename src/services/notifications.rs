use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::entities::order;

/// What happened, which determines both the message and its audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    Accepted,
    Delivered,
    CustomerCancelled,
    AdminCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Operator,
    Customer,
}

impl NotificationKind {
    /// A customer who cancelled their own order already knows; that notice
    /// goes to the operator instead.
    pub fn audience(self) -> Audience {
        match self {
            NotificationKind::NewOrder | NotificationKind::CustomerCancelled => Audience::Operator,
            NotificationKind::Accepted
            | NotificationKind::Delivered
            | NotificationKind::AdminCancelled => Audience::Customer,
        }
    }
}

/// Renders the subject/body pair for a notification.
pub fn render(kind: NotificationKind, order: &order::Model) -> (String, String) {
    match kind {
        NotificationKind::NewOrder => (
            format!("New order #{} received", order.id),
            format!(
                "{} placed an order of {} item(s) totalling {} ({}).\nPhone: {}\nAddress: {}",
                order.customer_name,
                order.item_count,
                order.total_amount,
                order.payment_status,
                order.phone,
                order.address,
            ),
        ),
        NotificationKind::Accepted => (
            format!("Your order #{} is being prepared", order.id),
            format!(
                "Hi {}, we have started preparing your order of {} item(s). \
                 We will let you know when it is on its way.",
                order.customer_name, order.item_count,
            ),
        ),
        NotificationKind::Delivered => (
            format!("Your order #{} has been delivered", order.id),
            format!(
                "Hi {}, your order has been delivered. Thank you for shopping with us!",
                order.customer_name,
            ),
        ),
        NotificationKind::AdminCancelled => (
            format!("Your order #{} has been cancelled", order.id),
            format!(
                "Hi {}, your order totalling {} has been cancelled. \
                 If you already paid online, the amount will be refunded.",
                order.customer_name, order.total_amount,
            ),
        ),
        NotificationKind::CustomerCancelled => (
            format!("Order #{} cancelled by the customer", order.id),
            format!(
                "{} cancelled order #{} ({} item(s), {}).",
                order.customer_name, order.id, order.item_count, order.total_amount,
            ),
        ),
    }
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Fire-and-forget email dispatch through an external relay endpoint.
/// At most once, best effort: a failure is logged and discarded, never
/// propagated to the operation that triggered it.
#[derive(Clone)]
pub struct NotificationService {
    http: reqwest::Client,
    relay_url: Option<String>,
    operator_email: String,
}

impl NotificationService {
    pub fn new(relay_url: Option<String>, operator_email: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url,
            operator_email,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.notification_relay_url.clone(), cfg.operator_email.clone())
    }

    fn recipient<'a>(&'a self, kind: NotificationKind, order: &'a order::Model) -> Option<&'a str> {
        match kind.audience() {
            Audience::Operator => Some(self.operator_email.as_str()),
            Audience::Customer => order.email.as_deref(),
        }
    }

    /// Attempts delivery and reports whether it succeeded.
    #[instrument(skip(self, order), fields(order_id = order.id, kind = %kind))]
    pub async fn send(&self, kind: NotificationKind, order: &order::Model) -> bool {
        let Some(relay_url) = self.relay_url.as_deref() else {
            debug!("Notification relay not configured; delivery disabled");
            return false;
        };
        let Some(to) = self.recipient(kind, order) else {
            info!("No email on file for this notification; skipping");
            return false;
        };

        let (subject, body) = render(kind, order);
        let message = RelayMessage {
            to,
            subject: &subject,
            body: &body,
        };

        match self.http.post(relay_url).json(&message).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Notification relay rejected message");
                false
            }
            Err(e) => {
                warn!(error = %e, "Notification relay unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::{OrderStatus, PaymentStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_order() -> order::Model {
        order::Model {
            id: 41,
            customer_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            address: "12 MG Road, Bengaluru".to_string(),
            email: Some("asha@example.com".to_string()),
            user_id: None,
            item_count: 3,
            total_amount: dec!(900),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            razorpay_order_id: Some("order_abc".to_string()),
            razorpay_payment_id: Some("pay_xyz".to_string()),
            is_delivery: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cancellation_audiences_differ_by_actor() {
        assert_eq!(NotificationKind::AdminCancelled.audience(), Audience::Customer);
        assert_eq!(
            NotificationKind::CustomerCancelled.audience(),
            Audience::Operator
        );
        assert_eq!(NotificationKind::NewOrder.audience(), Audience::Operator);
    }

    #[test]
    fn rendered_messages_reference_the_order() {
        let order = sample_order();
        for kind in [
            NotificationKind::NewOrder,
            NotificationKind::Accepted,
            NotificationKind::Delivered,
            NotificationKind::CustomerCancelled,
            NotificationKind::AdminCancelled,
        ] {
            let (subject, body) = render(kind, &order);
            assert!(subject.contains("41"), "{kind} subject should carry the order id");
            assert!(!body.is_empty());
        }
    }

    #[test]
    fn customer_notice_needs_an_email_on_file() {
        let service = NotificationService::new(None, "ops@hamperhouse.in".to_string());
        let mut order = sample_order();
        order.email = None;

        assert!(service.recipient(NotificationKind::Accepted, &order).is_none());
        assert_eq!(
            service.recipient(NotificationKind::NewOrder, &order),
            Some("ops@hamperhouse.in")
        );
    }

    #[tokio::test]
    async fn unconfigured_relay_reports_failure_without_error() {
        let service = NotificationService::new(None, "ops@hamperhouse.in".to_string());
        let order = sample_order();
        assert!(!service.send(NotificationKind::NewOrder, &order).await);
    }
}
