use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    provider_error_message, to_minor_units, GatewayVerdict, IntentContext, PaymentGateway,
    PaymentIntent, PaymentOutcome, VerificationEvidence,
};
use crate::config::AppConfig;
use crate::entities::order::Model as OrderModel;
use crate::entities::PaymentMethod;
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
    pub currency: String,
}

impl From<&AppConfig> for RazorpayConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            key_id: cfg.razorpay_key_id.clone(),
            key_secret: cfg.razorpay_key_secret.clone(),
            api_base: cfg.razorpay_api_base.trim_end_matches('/').to_string(),
            currency: cfg.currency.to_uppercase(),
        }
    }
}

/// Order-then-pay flow on the regional provider; orders correlate via `receipt`
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct ProviderOrderResponse {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
    #[serde(default)]
    status: String,
}

impl RazorpayGateway {
    pub fn new(client: reqwest::Client, config: RazorpayConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_order(
        &self,
        provider_order_id: &str,
    ) -> Result<ProviderOrderResponse, ServiceError> {
        if !is_provider_order_id(provider_order_id) {
            return Err(ServiceError::InvalidArgument(
                "Invalid provider order id".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}/v1/orders/{}", self.config.api_base, provider_order_id))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "Provider order {} not found",
                provider_order_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("storefront_gateway_errors_total", 1, "provider" => "razorpay");
            warn!(status = status.as_u16(), "provider order lookup failed");
            return Err(ServiceError::GatewayError(provider_error_message(&body)));
        }

        Ok(response.json().await?)
    }
}

/// Provider order ids are `order_` followed by word characters; anything else
/// would let the caller steer the lookup URL.
fn is_provider_order_id(id: &str) -> bool {
    id.strip_prefix("order_").is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Razorpay
    }

    #[instrument(skip(self, order, _ctx), fields(order_id = %order.id))]
    async fn create_intent(
        &self,
        order: &OrderModel,
        _ctx: &IntentContext,
    ) -> Result<PaymentIntent, ServiceError> {
        let request = CreateOrderRequest {
            amount: to_minor_units(order.amount)?,
            currency: &self.config.currency,
            receipt: order.id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("storefront_gateway_errors_total", 1, "provider" => "razorpay");
            warn!(status = status.as_u16(), "provider order creation failed");
            return Err(ServiceError::GatewayError(provider_error_message(&body)));
        }

        let created: ProviderOrderResponse = response.json().await?;
        info!(provider_order_id = %created.id, "provider order created");

        Ok(PaymentIntent::ProviderOrder {
            provider_order_id: created.id,
            amount: created.amount,
            currency: created.currency,
            receipt: created.receipt.unwrap_or(request.receipt),
        })
    }

    async fn verify(
        &self,
        evidence: VerificationEvidence,
    ) -> Result<Option<GatewayVerdict>, ServiceError> {
        let provider_order_id = match evidence {
            VerificationEvidence::ProviderOrder { provider_order_id } => provider_order_id,
            _ => {
                return Err(ServiceError::InvalidArgument(
                    "regional payments are verified by provider order id".to_string(),
                ))
            }
        };

        let provider_order = self.fetch_order(&provider_order_id).await?;
        let order_id = provider_order
            .receipt
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
            .ok_or_else(|| {
                ServiceError::GatewayError(format!(
                    "provider order {} has no usable receipt",
                    provider_order.id
                ))
            })?;

        let outcome = if provider_order.status == "paid" {
            PaymentOutcome::Paid
        } else {
            PaymentOutcome::Pending
        };

        info!(
            %order_id,
            provider_status = %provider_order.status,
            "provider order verified"
        );
        Ok(Some(GatewayVerdict { order_id, outcome }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_order_ids_are_restricted_to_word_characters() {
        assert!(is_provider_order_id("order_Nh3kX9aQ2"));
        assert!(is_provider_order_id("order_wire_1"));
        assert!(!is_provider_order_id("order_"));
        assert!(!is_provider_order_id("pay_123"));
        assert!(!is_provider_order_id("order_x/../../payments/pay_1"));
        assert!(!is_provider_order_id("order_1?expand=payments"));
        assert!(!is_provider_order_id("order_1%2F..%2F"));
    }
}
