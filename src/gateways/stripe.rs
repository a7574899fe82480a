use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    provider_error_message, signature, to_minor_units, GatewayVerdict, IntentContext,
    PaymentGateway, PaymentIntent, PaymentOutcome, VerificationEvidence,
};
use crate::config::AppConfig;
use crate::entities::order::Model as OrderModel;
use crate::entities::PaymentMethod;
use crate::errors::ServiceError;

const DELIVERY_LINE_NAME: &str = "Delivery Charges";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub delivery_charge: Decimal,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: u64,
    /// Honour the client-reported `success` flag
    pub allow_client_verification: bool,
}

impl From<&AppConfig> for StripeConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            secret_key: cfg.stripe_secret_key.clone(),
            api_base: cfg.stripe_api_base.trim_end_matches('/').to_string(),
            currency: cfg.currency.to_lowercase(),
            delivery_charge: cfg.delivery_charge,
            webhook_secret: cfg.stripe_webhook_secret.clone(),
            webhook_tolerance_secs: cfg.stripe_webhook_tolerance_secs,
            allow_client_verification: cfg.card_client_verification,
        }
    }
}

/// Hosted checkout sessions on the card provider
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
struct WebhookEventData {
    object: SessionObject,
}

#[derive(Debug, Default, Deserialize)]
struct SessionObject {
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    payment_status: Option<String>,
}

impl SessionObject {
    fn order_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("order_id"))
                    .and_then(|v| v.as_str())
            })
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

impl StripeGateway {
    pub fn new(client: reqwest::Client, config: StripeConfig) -> Self {
        Self { client, config }
    }

    /// Form fields for a checkout session covering every line plus delivery.
    fn session_form(
        &self,
        order: &OrderModel,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<Vec<(String, String)>, ServiceError> {
        let order_id = order.id.to_string();
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("client_reference_id".to_string(), order_id.clone()),
            ("metadata[order_id]".to_string(), order_id),
        ];

        let mut push_line = |index: usize, name: &str, unit_amount: i64, quantity: u32| {
            let prefix = format!("line_items[{}]", index);
            form.push((
                format!("{}[price_data][currency]", prefix),
                self.config.currency.clone(),
            ));
            form.push((
                format!("{}[price_data][product_data][name]", prefix),
                name.to_string(),
            ));
            form.push((
                format!("{}[price_data][unit_amount]", prefix),
                unit_amount.to_string(),
            ));
            form.push((format!("{}[quantity]", prefix), quantity.to_string()));
        };

        for (index, item) in order.items.0.iter().enumerate() {
            push_line(
                index,
                item.display_name(),
                to_minor_units(item.price)?,
                item.quantity,
            );
        }
        push_line(
            order.items.0.len(),
            DELIVERY_LINE_NAME,
            to_minor_units(self.config.delivery_charge)?,
            1,
        );

        Ok(form)
    }

    fn verify_signed_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<Option<GatewayVerdict>, ServiceError> {
        let secret = self.config.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::InvalidArgument("card webhook secret is not configured".to_string())
        })?;

        signature::verify_signature(
            payload,
            signature_header,
            secret,
            self.config.webhook_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::InvalidArgument(format!("invalid webhook payload: {}", e)))?;

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => {
                if event.data.object.payment_status.as_deref() == Some("paid") {
                    PaymentOutcome::Paid
                } else {
                    PaymentOutcome::Pending
                }
            }
            "checkout.session.async_payment_succeeded" => PaymentOutcome::Paid,
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                PaymentOutcome::Failed
            }
            other => {
                info!(event_type = other, "ignoring card webhook event");
                return Ok(None);
            }
        };

        let order_id = event.data.object.order_id().ok_or_else(|| {
            ServiceError::InvalidArgument("webhook event carries no order reference".to_string())
        })?;

        Ok(Some(GatewayVerdict { order_id, outcome }))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    #[instrument(skip(self, order, ctx), fields(order_id = %order.id))]
    async fn create_intent(
        &self,
        order: &OrderModel,
        ctx: &IntentContext,
    ) -> Result<PaymentIntent, ServiceError> {
        let origin = ctx.origin.trim_end_matches('/');
        let success_url = format!("{}/verify?success=true&orderId={}", origin, order.id);
        let cancel_url = format!("{}/verify?success=false&orderId={}", origin, order.id);
        let form = self.session_form(order, &success_url, &cancel_url)?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("storefront_gateway_errors_total", 1, "provider" => "stripe");
            warn!(status = status.as_u16(), "checkout session creation failed");
            return Err(ServiceError::GatewayError(provider_error_message(&body)));
        }

        let session: CheckoutSessionResponse = response.json().await?;
        let session_url = session.url.ok_or_else(|| {
            ServiceError::GatewayError("checkout session has no redirect URL".to_string())
        })?;

        info!(session_id = %session.id, "checkout session created");
        Ok(PaymentIntent::CheckoutSession {
            session_id: session.id,
            session_url,
            success_url,
            cancel_url,
            reference: order.id,
        })
    }

    async fn verify(
        &self,
        evidence: VerificationEvidence,
    ) -> Result<Option<GatewayVerdict>, ServiceError> {
        match evidence {
            VerificationEvidence::ClientRedirect { order_id, success } => {
                if !self.config.allow_client_verification {
                    return Err(ServiceError::Forbidden(
                        "Client-reported payment status is not accepted; awaiting provider confirmation"
                            .to_string(),
                    ));
                }
                warn!(
                    %order_id,
                    success,
                    "reconciling card payment from client-reported status"
                );
                let outcome = if success {
                    PaymentOutcome::Paid
                } else {
                    PaymentOutcome::Failed
                };
                Ok(Some(GatewayVerdict { order_id, outcome }))
            }
            VerificationEvidence::SignedEvent { payload, signature } => {
                self.verify_signed_event(&payload, &signature)
            }
            VerificationEvidence::ProviderOrder { .. } => Err(ServiceError::InvalidArgument(
                "card payments are verified by redirect or webhook".to_string(),
            )),
        }
    }
}
