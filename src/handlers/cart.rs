use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use super::common::{success_response, JsonBody};
use crate::{auth::AuthUser, errors::ServiceError, AppState};

/// `userId` may still be sent by older clients; the token decides whose cart it is.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub size: String,
    pub quantity: Option<i64>,
}

fn require_item(item_id: &str, size: &str) -> Result<(), ServiceError> {
    if item_id.trim().is_empty() || size.trim().is_empty() {
        return Err(ServiceError::missing_fields());
    }
    Ok(())
}

/// POST /api/cart/add
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<AddToCartRequest>,
) -> Result<Response, ServiceError> {
    require_item(&payload.item_id, &payload.size)?;
    let cart = state
        .services
        .cart
        .add_one(user.user_id, payload.item_id.trim(), payload.size.trim())
        .await?;
    Ok(success_response("Added to Cart!", cart))
}

/// POST /api/cart/update
pub async fn update_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<UpdateCartRequest>,
) -> Result<Response, ServiceError> {
    require_item(&payload.item_id, &payload.size)?;
    let quantity = payload.quantity.ok_or_else(ServiceError::missing_fields)?;
    let cart = state
        .services
        .cart
        .set_quantity(
            user.user_id,
            payload.item_id.trim(),
            payload.size.trim(),
            quantity,
        )
        .await?;
    Ok(success_response("Cart updated successfully", cart))
}

/// POST /api/cart/get
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.read(user.user_id).await?;
    Ok(success_response("User Cart Data!", cart))
}
