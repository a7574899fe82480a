use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::CartData,
    repositories::UserRepository,
};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Attempts at a cart read-modify-write before giving up with `Conflict`
pub const MAX_CART_WRITE_ATTEMPTS: usize = 5;

/// Per-user cart stored on the user row.
///
/// Every mutation reads the whole cart, applies the change in memory and
/// writes it back only if the row version is unchanged. Concurrent writers
/// therefore never lose each other's increments; a writer that keeps losing
/// the race gives up with [`ServiceError::Conflict`].
#[derive(Clone)]
pub struct CartService {
    users: UserRepository,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(users: UserRepository, event_sender: Arc<EventSender>) -> Self {
        Self {
            users,
            event_sender,
        }
    }

    /// Adds one unit of `(item_id, size)`.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the user does not exist
    /// * `Conflict` if the write keeps losing to concurrent updates
    #[instrument(skip(self))]
    pub async fn add_one(
        &self,
        user_id: Uuid,
        item_id: &str,
        size: &str,
    ) -> Result<CartData, ServiceError> {
        let cart = self
            .mutate(user_id, |cart| {
                cart.add_one(item_id, size);
                Ok(())
            })
            .await?;
        info!(%user_id, item_id, size, "added to cart");
        Ok(cart)
    }

    /// Sets the quantity of `(item_id, size)`; zero removes the entry.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` for negative quantities, or zero on a pair that
    ///   is not in the cart
    /// * `NotFound` if the user does not exist
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        item_id: &str,
        size: &str,
        quantity: i64,
    ) -> Result<CartData, ServiceError> {
        let cart = self
            .mutate(user_id, |cart| cart.set_quantity(item_id, size, quantity))
            .await?;
        info!(%user_id, item_id, size, quantity, "cart updated");
        Ok(cart)
    }

    /// Current cart contents (`{}` when nothing was ever added)
    #[instrument(skip(self))]
    pub async fn read(&self, user_id: Uuid) -> Result<CartData, ServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        Ok(user.cart_data)
    }

    /// Empties the cart in a single statement.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if self.users.clear_cart(user_id).await? == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
        debug!(%user_id, "cart cleared");
        Ok(())
    }

    async fn mutate<F>(&self, user_id: Uuid, apply: F) -> Result<CartData, ServiceError>
    where
        F: Fn(&mut CartData) -> Result<(), ServiceError>,
    {
        for attempt in 1..=MAX_CART_WRITE_ATTEMPTS {
            let user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

            let mut cart = user.cart_data;
            apply(&mut cart)?;

            if self
                .users
                .swap_cart(user_id, user.version, cart.clone())
                .await?
            {
                return Ok(cart);
            }

            counter!("storefront_cart_write_conflicts_total", 1);
            debug!(%user_id, attempt, "cart write lost a race, retrying");
        }

        warn!(%user_id, "cart write abandoned after repeated conflicts");
        Err(ServiceError::Conflict(
            "Cart was modified concurrently, please retry".to_string(),
        ))
    }
}
