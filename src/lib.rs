//! Storefront API Library
//!
//! User accounts, a product catalog, per-user carts and order placement with
//! card and regional payment gateway reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateways;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateways::GatewayRegistry;

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILED: &str = "FAILED";

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires services against the real payment providers named in `config`.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, errors::ServiceError> {
        let gateways = GatewayRegistry::from_config(&config)?;
        Ok(Self::with_gateways(db, config, event_sender, gateways))
    }

    /// Same as [`AppState::new`] with an explicit gateway set.
    pub fn with_gateways(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
        gateways: GatewayRegistry,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let auth = Arc::new(AuthService::from_config(&config));
        let services = handlers::AppServices::new(
            db.clone(),
            event_sender.clone(),
            auth.clone(),
            gateways,
            config.compensate_failed_intents,
        );

        Self {
            db,
            config: Arc::new(config),
            event_sender,
            auth,
            services,
        }
    }
}

/// Response envelope shared by every endpoint.
///
/// Errors use the same shape via [`errors::ErrorResponse`].
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status: &'static str,
    pub msg: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

fn captured_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

impl<T> ApiResponse<T> {
    pub fn success(msg: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            status: STATUS_SUCCESS,
            msg: msg.into(),
            data: Some(data),
            request_id: captured_request_id(),
        }
    }

    /// A handled request whose business outcome was negative
    pub fn declined(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            status: STATUS_FAILED,
            msg: msg.into(),
            data: None,
            request_id: captured_request_id(),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[tokio::test]
    async fn success_response_carries_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok", 1)
            })
            .await;

        assert!(response.success);
        assert_eq!(response.status, "SUCCESS");
        assert_eq!(response.request_id.as_deref(), Some("meta-123"));
    }

    #[test]
    fn declined_response_has_no_data() {
        let response = ApiResponse::<()>::declined("Payment Failed!");
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "status": "FAILED", "msg": "Payment Failed!", "data": null })
        );
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes under `/api`, grouped by the guard they sit behind.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/user/register", post(handlers::users::register))
        .route("/user/login", post(handlers::users::login))
        .route("/user/admin", post(handlers::users::admin_login))
        .route("/product/list", get(handlers::products::list_products))
        // Older clients send the id in a GET body
        .route(
            "/product/get",
            get(handlers::products::get_product).post(handlers::products::get_product),
        )
        // Signature-verified, no token
        .route(
            "/order/webhook/stripe",
            post(handlers::payment_webhooks::card_webhook),
        );

    let user = Router::new()
        .route("/user/me", get(handlers::users::me))
        .route(
            "/user/profile",
            post(handlers::users::update_profile_picture),
        )
        .route(
            "/user/change-password",
            post(handlers::users::change_password),
        )
        .route("/cart/add", post(handlers::cart::add_to_cart))
        .route("/cart/update", post(handlers::cart::update_cart))
        .route("/cart/get", post(handlers::cart::get_cart))
        .route("/order/place", post(handlers::orders::place_cod))
        .route("/order/stripe", post(handlers::orders::place_card))
        .route("/order/razorpay", post(handlers::orders::place_regional))
        .route("/order/verifyStripe", post(handlers::orders::verify_card))
        .route(
            "/order/verifyRazorpay",
            post(handlers::orders::verify_regional),
        )
        .route("/order/userorders", post(handlers::orders::user_orders))
        .route(
            "/product/categories/:category",
            get(handlers::products::products_in_category),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::user_auth,
        ));

    let admin = Router::new()
        .route("/order/list", post(handlers::orders::all_orders))
        .route("/order/status", post(handlers::orders::update_status))
        .route("/user", get(handlers::users::list_users))
        .route("/user/all", get(handlers::users::list_users))
        .route(
            "/user/:user_id",
            put(handlers::users::update_user).delete(handlers::users::delete_user),
        )
        .route("/product/add", post(handlers::products::create_product))
        .route("/product/remove", post(handlers::products::remove_product))
        .route(
            "/product/:product_id",
            put(handlers::products::update_product),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::admin_auth,
        ));

    Router::new().merge(public).merge(user).merge(admin)
}

/// CORS from config: explicit origins win, then the permissive fallback.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        tracing::info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    } else {
        tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

/// Full application router with the middleware stack applied.
pub fn app_router(state: AppState) -> Router {
    let cfg = state.config.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "API Working" }))
        .route("/health", get(health_check))
        .nest("/api", api_routes(&state))
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(cfg.max_body_size))
        .layer(cors_layer(&cfg))
        // Outermost so every response, including rejections, carries the id
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success("Health check", health_data)))
}
