use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::PaymentMethod;

/// Domain events emitted by the services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        payment_method: PaymentMethod,
        amount: Decimal,
    },
    OrderPaid {
        order_id: Uuid,
        user_id: Uuid,
    },
    /// A gateway order that was reported failed and deleted
    OrderAbandoned {
        order_id: Uuid,
        user_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        new_status: String,
    },
    CartCleared(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    /// An administrator removed the account; its orders are kept
    UserDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    ///
    /// Events are informational; a missing consumer never fails a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Drains the event channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                user_id,
                payment_method,
                amount,
            } => info!(
                %order_id,
                %user_id,
                payment_method = %payment_method,
                %amount,
                "order placed"
            ),
            Event::OrderPaid { order_id, user_id } => {
                info!(%order_id, %user_id, "order paid")
            }
            Event::OrderAbandoned { order_id, user_id } => {
                info!(%order_id, %user_id, "order abandoned")
            }
            Event::OrderStatusChanged {
                order_id,
                new_status,
            } => info!(%order_id, new_status = %new_status, "order status changed"),
            Event::CartCleared(user_id) => info!(%user_id, "cart cleared"),
            Event::ProductCreated(product_id) => info!(%product_id, "product created"),
            Event::ProductUpdated(product_id) => info!(%product_id, "product updated"),
            Event::ProductDeleted(product_id) => info!(%product_id, "product deleted"),
            Event::UserDeleted(user_id) => info!(%user_id, "user deleted"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let user_id = Uuid::new_v4();

        sender.send(Event::CartCleared(user_id)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::CartCleared(user_id)));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::CartCleared(Uuid::nil())).await.is_err());
        sender.send_or_log(Event::CartCleared(Uuid::nil())).await;
    }
}
