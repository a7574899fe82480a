#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    entities::{order::Model as OrderModel, OrderItem, PaymentMethod},
    errors::ServiceError,
    events::{self, EventSender},
    gateways::{
        to_minor_units, GatewayRegistry, GatewayVerdict, IntentContext, PaymentGateway,
        PaymentIntent, PaymentOutcome, VerificationEvidence,
    },
    services::users::RegisterInput,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const ADMIN_EMAIL: &str = "admin@shop.test";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

/// Scripted stand-in for a payment provider.
///
/// Intents succeed unless [`FakeGateway::fail_intents`] is set. Regional
/// provider orders start as `created` until [`FakeGateway::set_status`]
/// says otherwise.
pub struct FakeGateway {
    method: PaymentMethod,
    fail_intents: AtomicBool,
    intents_created: AtomicUsize,
    provider_orders: Mutex<HashMap<String, (Uuid, String)>>,
}

impl FakeGateway {
    pub fn new(method: PaymentMethod) -> Arc<Self> {
        Arc::new(Self {
            method,
            fail_intents: AtomicBool::new(false),
            intents_created: AtomicUsize::new(0),
            provider_orders: Mutex::new(HashMap::new()),
        })
    }

    pub fn fail_intents(&self, fail: bool) {
        self.fail_intents.store(fail, Ordering::SeqCst);
    }

    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, provider_order_id: &str, status: &str) {
        if let Some(entry) = self
            .provider_orders
            .lock()
            .unwrap()
            .get_mut(provider_order_id)
        {
            entry.1 = status.to_string();
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn create_intent(
        &self,
        order: &OrderModel,
        ctx: &IntentContext,
    ) -> Result<PaymentIntent, ServiceError> {
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError("provider unavailable".into()));
        }
        self.intents_created.fetch_add(1, Ordering::SeqCst);

        match self.method {
            PaymentMethod::Razorpay => {
                let provider_order_id = format!("order_{}", order.id.simple());
                self.provider_orders.lock().unwrap().insert(
                    provider_order_id.clone(),
                    (order.id, "created".to_string()),
                );
                Ok(PaymentIntent::ProviderOrder {
                    provider_order_id,
                    amount: to_minor_units(order.amount)?,
                    currency: "INR".into(),
                    receipt: order.id.to_string(),
                })
            }
            _ => Ok(PaymentIntent::CheckoutSession {
                session_id: format!("cs_test_{}", order.id.simple()),
                session_url: format!("https://checkout.test/pay/{}", order.id.simple()),
                success_url: format!("{}/verify?success=true&orderId={}", ctx.origin, order.id),
                cancel_url: format!("{}/verify?success=false&orderId={}", ctx.origin, order.id),
                reference: order.id,
            }),
        }
    }

    async fn verify(
        &self,
        evidence: VerificationEvidence,
    ) -> Result<Option<GatewayVerdict>, ServiceError> {
        match evidence {
            VerificationEvidence::ClientRedirect { order_id, success } => Ok(Some(GatewayVerdict {
                order_id,
                outcome: if success {
                    PaymentOutcome::Paid
                } else {
                    PaymentOutcome::Failed
                },
            })),
            VerificationEvidence::ProviderOrder { provider_order_id } => {
                let orders = self.provider_orders.lock().unwrap();
                let (order_id, status) = orders
                    .get(&provider_order_id)
                    .cloned()
                    .ok_or_else(|| ServiceError::NotFound("Provider order not found".into()))?;
                let outcome = if status == "paid" {
                    PaymentOutcome::Paid
                } else {
                    PaymentOutcome::Pending
                };
                Ok(Some(GatewayVerdict { order_id, outcome }))
            }
            VerificationEvidence::SignedEvent { .. } => Ok(None),
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    // A single connection keeps every query on the same in-memory database.
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.admin_email = ADMIN_EMAIL.to_string();
    cfg.admin_password = ADMIN_PASSWORD.to_string();
    cfg.cors_allow_any_origin = true;
    cfg
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub card: Arc<FakeGateway>,
    pub regional: Arc<FakeGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let card = FakeGateway::new(PaymentMethod::Stripe);
        let regional = FakeGateway::new(PaymentMethod::Razorpay);
        let gateways = GatewayRegistry::new()
            .register(card.clone())
            .register(regional.clone());
        Self::build(cfg, gateways, card, regional).await
    }

    /// Uses `gateways` as given; the fakes are still exposed but unused.
    pub async fn with_gateways(cfg: AppConfig, gateways: GatewayRegistry) -> Self {
        let card = FakeGateway::new(PaymentMethod::Stripe);
        let regional = FakeGateway::new(PaymentMethod::Razorpay);
        Self::build(cfg, gateways, card, regional).await
    }

    async fn build(
        cfg: AppConfig,
        gateways: GatewayRegistry,
        card: Arc<FakeGateway>,
        regional: Arc<FakeGateway>,
    ) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::with_gateways(
            Arc::new(pool),
            cfg,
            EventSender::new(event_tx),
            gateways,
        );
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            card,
            regional,
            _event_task: event_task,
        }
    }

    /// Registers a user directly through the service and returns its id and token.
    pub async fn register_user(&self, email: &str) -> (Uuid, String) {
        let user = self
            .state
            .services
            .users
            .register(RegisterInput {
                username: "Test Shopper".to_string(),
                email: email.to_string(),
                password: "correct-horse-battery".to_string(),
            })
            .await
            .expect("register test user");
        let token = self
            .state
            .auth
            .issue_user_token(user.id)
            .expect("issue user token");
        (user.id, token)
    }

    pub fn admin_token(&self) -> String {
        self.state.auth.issue_admin_token().expect("issue admin token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a pre-built request (raw bodies, custom headers).
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

pub fn item(item_id: &str, size: &str, quantity: u32, price: Decimal) -> OrderItem {
    OrderItem {
        item_id: item_id.to_string(),
        size: size.to_string(),
        quantity,
        price,
        name: Some(format!("Product {}", item_id)),
    }
}

pub fn address() -> Value {
    json!({
        "firstName": "Asha",
        "lastName": "Rao",
        "street": "12 MG Road",
        "city": "Pune",
        "zipcode": "411001",
        "country": "IN"
    })
}
