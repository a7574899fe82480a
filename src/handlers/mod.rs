pub mod cart;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod users;

use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateways::GatewayRegistry;
use crate::repositories::{OrderRepository, ProductRepository, UserRepository};
use crate::services::{
    cart::CartService, orders::OrderService, products::ProductService, users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub products: Arc<ProductService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        gateways: GatewayRegistry,
        compensate_failed_intents: bool,
    ) -> Self {
        let user_repository = UserRepository::new(db_pool.clone());
        let order_repository = OrderRepository::new(db_pool.clone());
        let product_repository = ProductRepository::new(db_pool);

        let users = Arc::new(UserService::new(
            user_repository.clone(),
            auth_service,
            event_sender.clone(),
        ));
        let products = Arc::new(ProductService::new(
            product_repository,
            event_sender.clone(),
        ));
        let cart = Arc::new(CartService::new(
            user_repository.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            order_repository,
            user_repository,
            gateways,
            event_sender,
            compensate_failed_intents,
        ));

        Self {
            users,
            cart,
            orders,
            products,
        }
    }
}
