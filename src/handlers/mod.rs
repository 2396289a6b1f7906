use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, catalog::CatalogService, notifications::NotificationService,
        orders::OrderService, payments::PaymentService, reviews::ReviewService,
        shipping::ShippingService,
    },
};

pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod reviews;

/// Aggregate of the services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
    pub shipping: Arc<ShippingService>,
    pub orders: Arc<OrderService>,
    pub accounts: Arc<AccountService>,
    pub payments: Arc<PaymentService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        auth_service: Arc<AuthService>,
        config: &AppConfig,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            event_sender.clone(),
            config.email_from.clone(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            reviews: Arc::new(ReviewService::new(db.clone(), event_sender.clone())),
            shipping: Arc::new(ShippingService::new(db.clone())),
            accounts: Arc::new(AccountService::new(
                db,
                auth_service,
                notifications.clone(),
                event_sender,
                config.email_verification_ttl_secs,
                config.password_reset_ttl_secs,
            )),
            payments: Arc::new(PaymentService::new(config.payment.clone(), orders.clone())),
            orders,
            notifications,
        }
    }
}
