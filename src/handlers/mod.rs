pub mod addresses;
pub mod auth;
pub mod carts;
pub mod catalog;
pub mod common;
pub mod orders;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    services::{
        commerce::{AddressService, CartService, CatalogService},
        orders::OrderService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub addresses: Arc<AddressService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    /// Wires every service onto the shared connection pool.
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        let txn_timeout = config.transaction_timeout();
        Self {
            auth: Arc::new(AuthService::new(db.clone(), config.session_ttl())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone())),
            addresses: Arc::new(AddressService::new(db.clone(), txn_timeout)),
            orders: Arc::new(OrderService::new(db, config.pricing(), txn_timeout)),
        }
    }
}
