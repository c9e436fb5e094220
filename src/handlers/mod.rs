pub mod checkout;
pub mod common;
pub mod coupons;
pub mod orders;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    checkout::CheckoutService, coupons::CouponService, notifications::NotificationService,
    order_status::OrderLifecycleService, orders::OrderService, payments::RazorpayGateway,
};

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub lifecycle: Arc<OrderLifecycleService>,
    pub checkout: Arc<CheckoutService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender, cfg: &AppConfig) -> Self {
        let coupons = Arc::new(CouponService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone()));
        let gateway = Arc::new(RazorpayGateway::from_config(cfg));
        let lifecycle = Arc::new(OrderLifecycleService::new(orders.clone(), events.clone()));
        let checkout = Arc::new(CheckoutService::new(
            coupons.clone(),
            gateway,
            orders.clone(),
            events,
            cfg.currency.clone(),
        ));
        let notifications = Arc::new(NotificationService::from_config(cfg));

        Self {
            coupons,
            orders,
            lifecycle,
            checkout,
            notifications,
        }
    }
}
