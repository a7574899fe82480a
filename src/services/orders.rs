use crate::{
    entities::order::Model as OrderModel,
    entities::{OrderItem, OrderItems, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::{
        GatewayRegistry, IntentContext, PaymentIntent, PaymentOutcome, VerificationEvidence,
    },
    repositories::{NewOrder, OrderRepository, UserRepository},
};
use bytes::Bytes;
use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Raw placement request; every field must be present for placement to proceed.
#[derive(Debug, Clone, Default)]
pub struct PlaceOrderInput {
    pub user_id: Option<Uuid>,
    pub items: Option<Vec<OrderItem>>,
    pub amount: Option<Decimal>,
    pub address: Option<serde_json::Value>,
}

/// A freshly written order and, for gateway methods, what the client pays with
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderModel,
    pub intent: Option<PaymentIntent>,
}

/// Result of applying a gateway verdict to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Order is paid (now or by an earlier delivery)
    Paid,
    /// Unpaid order was deleted
    Abandoned,
    /// Provider has not confirmed payment yet; nothing changed
    Pending,
}

/// Order placement and payment reconciliation.
///
/// ```text
/// (none) --place(cod)--------------> unpaid, cart cleared
/// (none) --place(gateway)----------> unpaid, awaiting provider
/// awaiting --reconcile(Paid)-------> paid, owner's cart cleared
/// awaiting --reconcile(Failed)-----> deleted
/// awaiting --reconcile(Pending)----> unchanged
/// ```
///
/// Every transition is a conditional statement against the order row, so
/// duplicate or racing verifications cannot pay twice or resurrect a deleted
/// order. Payment and the cart clearing it implies commit together.
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    users: UserRepository,
    gateways: GatewayRegistry,
    event_sender: Arc<EventSender>,
    compensate_failed_intents: bool,
}

impl OrderService {
    pub fn new(
        orders: OrderRepository,
        users: UserRepository,
        gateways: GatewayRegistry,
        event_sender: Arc<EventSender>,
        compensate_failed_intents: bool,
    ) -> Self {
        Self {
            orders,
            users,
            gateways,
            event_sender,
            compensate_failed_intents,
        }
    }

    /// Validates and writes a new unpaid order.
    ///
    /// Cash orders clear the owner's cart immediately. Gateway orders create
    /// a payment intent with the provider and leave the cart alone until the
    /// payment is reconciled.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` when a field (or, for gateways, the origin) is missing
    /// * `NotFound` when the user does not exist
    /// * `GatewayError` when the provider rejects or times out; the order
    ///   stays unpaid unless compensation is enabled
    #[instrument(skip(self, input), fields(method = %method))]
    pub async fn place(
        &self,
        input: PlaceOrderInput,
        method: PaymentMethod,
        origin: Option<&str>,
    ) -> Result<PlacedOrder, ServiceError> {
        let (user_id, items, amount, address) = match input {
            PlaceOrderInput {
                user_id: Some(user_id),
                items: Some(items),
                amount: Some(amount),
                address: Some(address),
            } if !items.is_empty() && !address.is_null() => (user_id, items, amount, address),
            _ => return Err(ServiceError::missing_fields()),
        };

        let origin = match (method.uses_gateway(), origin.map(str::trim)) {
            (true, Some(origin)) if !origin.is_empty() => Some(origin),
            (true, _) => return Err(ServiceError::missing_fields()),
            (false, _) => None,
        };

        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ServiceError::InvalidArgument(
                "Amount cannot be negative".to_string(),
            ));
        }
        if items.iter().any(|item| item.quantity == 0 || item.price.is_sign_negative()) {
            return Err(ServiceError::InvalidArgument(
                "Order items need a positive quantity and a non-negative price".to_string(),
            ));
        }

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        let new_order = NewOrder {
            user_id,
            items: OrderItems(items),
            amount,
            address,
            payment_method: method,
        };

        let (order, intent) = match origin {
            None => {
                let (order, cleared) = self.orders.create_clearing_cart(new_order).await?;
                self.cart_cleared(user_id, cleared == 1).await;
                (order, None)
            }
            Some(origin) => {
                let ctx = IntentContext {
                    origin: origin.to_string(),
                };
                let mut order = self.orders.create(new_order).await?;
                let intent = match self.gateways.get(method)?.create_intent(&order, &ctx).await {
                    Ok(intent) => intent,
                    Err(e) => {
                        counter!("storefront_order_intent_failures_total", 1, "method" => method.as_str());
                        error!(order_id = %order.id, error = %e, "payment intent creation failed");
                        if self.compensate_failed_intents {
                            self.orders.delete_unpaid(order.id).await?;
                            warn!(order_id = %order.id, "tentative order removed after intent failure");
                        }
                        return Err(e);
                    }
                };
                self.orders
                    .set_gateway_ref(order.id, intent.gateway_ref())
                    .await?;
                order.gateway_ref = Some(intent.gateway_ref().to_string());
                (order, Some(intent))
            }
        };

        counter!("storefront_orders_placed_total", 1, "method" => method.as_str());
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                user_id,
                payment_method: method,
                amount,
            })
            .await;
        info!(order_id = %order.id, %user_id, "order placed");

        Ok(PlacedOrder { order, intent })
    }

    /// Client-reported result of the card checkout redirect.
    #[instrument(skip(self))]
    pub async fn verify_card_redirect(
        &self,
        requester: Uuid,
        order_id: Uuid,
        success: bool,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let verdict = self
            .gateways
            .get(PaymentMethod::Stripe)?
            .verify(VerificationEvidence::ClientRedirect { order_id, success })
            .await?
            .ok_or_else(|| ServiceError::Internal("card gateway returned no verdict".to_string()))?;

        self.reconcile_checked(verdict.order_id, verdict.outcome, Some(requester))
            .await
    }

    /// Signed card-provider webhook.
    ///
    /// `Ok(None)` for events that concern no order, and for failure events
    /// arriving after the order was paid.
    #[instrument(skip(self, payload, signature))]
    pub async fn verify_card_event(
        &self,
        payload: Bytes,
        signature: String,
    ) -> Result<Option<ReconcileOutcome>, ServiceError> {
        let verdict = self
            .gateways
            .get(PaymentMethod::Stripe)?
            .verify(VerificationEvidence::SignedEvent { payload, signature })
            .await?;

        let Some(verdict) = verdict else {
            return Ok(None);
        };

        // Providers can deliver an expiry after the completion that paid the order.
        if verdict.outcome == PaymentOutcome::Failed {
            if let Some(order) = self.orders.find_by_id(verdict.order_id).await? {
                if order.payment {
                    info!(order_id = %order.id, "stale failure event for paid order ignored");
                    return Ok(None);
                }
            }
        }

        self.reconcile_checked(verdict.order_id, verdict.outcome, None)
            .await
            .map(Some)
    }

    /// Looks up the provider order and reconciles the order named by its receipt.
    #[instrument(skip(self))]
    pub async fn verify_regional(
        &self,
        requester: Uuid,
        provider_order_id: &str,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if provider_order_id.trim().is_empty() {
            return Err(ServiceError::missing_fields());
        }

        let verdict = self
            .gateways
            .get(PaymentMethod::Razorpay)?
            .verify(VerificationEvidence::ProviderOrder {
                provider_order_id: provider_order_id.trim().to_string(),
            })
            .await?
            .ok_or_else(|| {
                ServiceError::Internal("regional gateway returned no verdict".to_string())
            })?;

        self.reconcile_checked(verdict.order_id, verdict.outcome, Some(requester))
            .await
    }

    /// Applies a payment outcome to a gateway order.
    ///
    /// * `Paid` marks the order paid and clears the owner's cart; repeats are no-ops.
    /// * `Failed` deletes the unpaid order; repeats fail with `NotFound` and a
    ///   paid order is never deleted.
    /// * `Pending` changes nothing.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        order_id: Uuid,
        outcome: PaymentOutcome,
    ) -> Result<ReconcileOutcome, ServiceError> {
        self.reconcile_checked(order_id, outcome, None).await
    }

    async fn reconcile_checked(
        &self,
        order_id: Uuid,
        outcome: PaymentOutcome,
        owner: Option<Uuid>,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let order = self.load(order_id).await?;
        if owner.is_some_and(|owner| owner != order.user_id) {
            warn!(%order_id, "verification attempted for another user's order");
            return Err(order_not_found());
        }
        if !order.payment_method.uses_gateway() {
            return Err(ServiceError::InvalidArgument(
                "Cash on delivery orders have no payment to verify".to_string(),
            ));
        }

        let result = match outcome {
            PaymentOutcome::Paid => {
                let settlement = self
                    .orders
                    .settle_paid(order_id)
                    .await?
                    .ok_or_else(order_not_found)?;
                if !settlement.order.payment {
                    return Err(ServiceError::Conflict(
                        "Order changed during verification".to_string(),
                    ));
                }
                if settlement.cart_cleared {
                    self.cart_cleared(order.user_id, true).await;
                }
                if settlement.newly_paid {
                    self.event_sender
                        .send_or_log(Event::OrderPaid {
                            order_id,
                            user_id: order.user_id,
                        })
                        .await;
                    info!(%order_id, "order marked paid");
                } else {
                    info!(%order_id, cart_cleared = settlement.cart_cleared, "order already paid");
                }
                ReconcileOutcome::Paid
            }
            PaymentOutcome::Failed => {
                if order.payment {
                    return Err(paid_order_not_abandonable());
                }
                if self.orders.delete_unpaid(order_id).await? == 0 {
                    return match self.orders.find_by_id(order_id).await? {
                        Some(_) => Err(paid_order_not_abandonable()),
                        None => Err(order_not_found()),
                    };
                }
                self.event_sender
                    .send_or_log(Event::OrderAbandoned {
                        order_id,
                        user_id: order.user_id,
                    })
                    .await;
                info!(%order_id, "unpaid order deleted after failed payment");
                ReconcileOutcome::Abandoned
            }
            PaymentOutcome::Pending => {
                info!(%order_id, "payment still pending");
                ReconcileOutcome::Pending
            }
        };

        counter!(
            "storefront_order_reconciliations_total",
            1,
            "method" => order.payment_method.as_str(),
            "outcome" => outcome_label(result)
        );
        Ok(result)
    }

    /// Every order, newest first
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(self.orders.find_all().await?)
    }

    /// A user's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(self.orders.find_by_user(user_id).await?)
    }

    /// Overwrites the free-text status. Payment state is untouched.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: &str,
    ) -> Result<OrderModel, ServiceError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ServiceError::missing_fields());
        }
        if self.orders.update_status(order_id, status).await? == 0 {
            return Err(order_not_found());
        }

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                new_status: status.to_string(),
            })
            .await;
        self.load(order_id).await
    }

    async fn load(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(order_not_found)
    }

    async fn cart_cleared(&self, user_id: Uuid, cleared: bool) {
        if !cleared {
            warn!(%user_id, "cart owner no longer exists");
            return;
        }
        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
    }
}

fn order_not_found() -> ServiceError {
    ServiceError::NotFound("Order not found".to_string())
}

fn paid_order_not_abandonable() -> ServiceError {
    ServiceError::InvalidArgument("Paid orders cannot be abandoned".to_string())
}

fn outcome_label(outcome: ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Paid => "paid",
        ReconcileOutcome::Abandoned => "abandoned",
        ReconcileOutcome::Pending => "pending",
    }
}
