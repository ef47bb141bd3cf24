pub mod commerce;
pub mod common;
pub mod orders;

use crate::services::{
    commerce::{CartService, CatalogService, CheckoutService, ReviewService, WishlistService},
    orders::OrderService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reviews: Arc<ReviewService>,
    pub wishlist: Arc<WishlistService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone())),
            reviews: Arc::new(ReviewService::new(db.clone())),
            wishlist: Arc::new(WishlistService::new(db)),
        }
    }
}
