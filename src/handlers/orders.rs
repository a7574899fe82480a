use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Response,
    Extension,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::common::{declined_response, success_response, JsonBody};
use crate::{
    auth::AuthUser,
    entities::{OrderItem, PaymentMethod},
    errors::ServiceError,
    gateways::PaymentIntent,
    services::orders::{PlaceOrderInput, ReconcileOutcome},
    AppState,
};

/// Body shared by the three placement routes. `userId` is accepted and ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Option<Vec<OrderItem>>,
    pub amount: Option<Decimal>,
    pub address: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCardRequest {
    pub order_id: Option<Uuid>,
    /// `true`/`false`, either as a boolean or the string older clients send
    pub success: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRegionalRequest {
    #[serde(default)]
    pub razorpay_order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub status: String,
}

fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}

fn placement_input(user: &AuthUser, payload: PlaceOrderRequest) -> PlaceOrderInput {
    PlaceOrderInput {
        user_id: Some(user.user_id),
        items: payload.items,
        amount: payload.amount,
        address: payload.address,
    }
}

fn parse_success_flag(value: Option<&serde_json::Value>) -> Option<bool> {
    match value? {
        serde_json::Value::Bool(flag) => Some(*flag),
        serde_json::Value::String(raw) => match raw.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// POST /api/order/place
pub async fn place_cod(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<PlaceOrderRequest>,
) -> Result<Response, ServiceError> {
    let placed = state
        .services
        .orders
        .place(placement_input(&user, payload), PaymentMethod::Cod, None)
        .await?;
    Ok(success_response("Order Placed!", placed.order))
}

/// POST /api/order/stripe
pub async fn place_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<PlaceOrderRequest>,
) -> Result<Response, ServiceError> {
    let placed = state
        .services
        .orders
        .place(
            placement_input(&user, payload),
            PaymentMethod::Stripe,
            request_origin(&headers),
        )
        .await?;

    let session_url = match &placed.intent {
        Some(PaymentIntent::CheckoutSession { session_url, .. }) => session_url.clone(),
        _ => {
            return Err(ServiceError::Internal(
                "card placement produced no checkout session".to_string(),
            ))
        }
    };

    Ok(success_response(
        "Checkout session created",
        json!({ "session_url": session_url, "order": placed.order }),
    ))
}

/// POST /api/order/razorpay
pub async fn place_regional(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<PlaceOrderRequest>,
) -> Result<Response, ServiceError> {
    let placed = state
        .services
        .orders
        .place(
            placement_input(&user, payload),
            PaymentMethod::Razorpay,
            request_origin(&headers),
        )
        .await?;

    Ok(success_response(
        "Provider order created",
        json!({ "order": placed.intent, "orderId": placed.order.id }),
    ))
}

/// POST /api/order/verifyStripe
pub async fn verify_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<VerifyCardRequest>,
) -> Result<Response, ServiceError> {
    let order_id = payload.order_id.ok_or_else(ServiceError::missing_fields)?;
    let success =
        parse_success_flag(payload.success.as_ref()).ok_or_else(ServiceError::missing_fields)?;

    match state
        .services
        .orders
        .verify_card_redirect(user.user_id, order_id, success)
        .await?
    {
        ReconcileOutcome::Paid => Ok(success_response(
            "Order Placed!",
            json!({ "orderId": order_id }),
        )),
        ReconcileOutcome::Abandoned | ReconcileOutcome::Pending => {
            Ok(declined_response("Payment verification failed."))
        }
    }
}

/// POST /api/order/verifyRazorpay
pub async fn verify_regional(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<VerifyRegionalRequest>,
) -> Result<Response, ServiceError> {
    match state
        .services
        .orders
        .verify_regional(user.user_id, &payload.razorpay_order_id)
        .await?
    {
        ReconcileOutcome::Paid => Ok(success_response(
            "Payment Successful!",
            serde_json::Value::Null,
        )),
        ReconcileOutcome::Abandoned | ReconcileOutcome::Pending => {
            Ok(declined_response("Payment Failed!"))
        }
    }
}

/// POST /api/order/userorders
pub async fn user_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list_for_user(user.user_id).await?;
    Ok(success_response("User Orders!", orders))
}

/// POST /api/order/list
pub async fn all_orders(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list_all().await?;
    Ok(success_response("All Orders!", orders))
}

/// POST /api/order/status
pub async fn update_status(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateStatusRequest>,
) -> Result<Response, ServiceError> {
    let order_id = payload.order_id.ok_or_else(ServiceError::missing_fields)?;
    let order = state
        .services
        .orders
        .update_status(order_id, &payload.status)
        .await?;
    Ok(success_response("Status Updated!", order))
}
