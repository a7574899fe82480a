//! Payment provider adapters.
//!
//! Each provider turns a pending order into a [`PaymentIntent`] and turns
//! provider evidence (a redirect flag, a signed webhook, a provider order
//! lookup) into a [`GatewayVerdict`] the order lifecycle can reconcile.

use async_trait::async_trait;
use bytes::Bytes;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::order::Model as OrderModel;
use crate::entities::PaymentMethod;
use crate::errors::ServiceError;

pub mod razorpay;
pub mod signature;
pub mod stripe;

pub use razorpay::{RazorpayConfig, RazorpayGateway};
pub use stripe::{StripeConfig, StripeGateway};

/// Request-scoped inputs for intent creation
#[derive(Debug, Clone)]
pub struct IntentContext {
    /// Storefront origin the provider redirects back to
    pub origin: String,
}

/// What the client needs to complete payment with the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentIntent {
    CheckoutSession {
        session_id: String,
        session_url: String,
        success_url: String,
        cancel_url: String,
        reference: Uuid,
    },
    ProviderOrder {
        #[serde(rename = "id")]
        provider_order_id: String,
        /// Minor units, as the provider reports it
        amount: i64,
        currency: String,
        receipt: String,
    },
}

impl PaymentIntent {
    /// Provider-side identifier stored on the order
    pub fn gateway_ref(&self) -> &str {
        match self {
            PaymentIntent::CheckoutSession { session_id, .. } => session_id,
            PaymentIntent::ProviderOrder {
                provider_order_id, ..
            } => provider_order_id,
        }
    }
}

/// Evidence offered to a gateway when asking whether an order was paid.
#[derive(Debug, Clone)]
pub enum VerificationEvidence {
    /// Flag reported by the client after the checkout redirect
    ClientRedirect { order_id: Uuid, success: bool },
    /// Raw webhook body plus its signature header
    SignedEvent { payload: Bytes, signature: String },
    /// Provider order id to look up
    ProviderOrder { provider_order_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayVerdict {
    pub order_id: Uuid,
    pub outcome: PaymentOutcome,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn create_intent(
        &self,
        order: &OrderModel,
        ctx: &IntentContext,
    ) -> Result<PaymentIntent, ServiceError>;

    /// `Ok(None)` means the evidence concerns no order (an unrelated webhook event).
    async fn verify(
        &self,
        evidence: VerificationEvidence,
    ) -> Result<Option<GatewayVerdict>, ServiceError>;
}

/// Gateways available to the order lifecycle, keyed by payment method.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.method(), gateway);
        self
    }

    /// Card and regional gateways sharing one HTTP client with the configured timeout
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let client = build_http_client(cfg.gateway_timeout())?;
        Ok(Self::new()
            .register(Arc::new(StripeGateway::new(
                client.clone(),
                StripeConfig::from(cfg),
            )))
            .register(Arc::new(RazorpayGateway::new(
                client,
                RazorpayConfig::from(cfg),
            ))))
    }

    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        self.gateways.get(&method).cloned().ok_or_else(|| {
            ServiceError::Internal(format!("no payment gateway registered for {}", method))
        })
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("methods", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Shared outbound client for every provider
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Converts a major-unit amount into provider minor units (x100, rounded).
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::InvalidArgument(format!("amount {} out of range", amount)))
}

/// Pulls a provider error message out of a JSON error body when present.
pub(crate) fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.pointer("/error/description"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
