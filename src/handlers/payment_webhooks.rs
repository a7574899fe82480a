use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{info, warn};

use super::common::success_response;
use crate::{errors::ServiceError, AppState};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// POST /api/order/webhook/stripe
//
// Unauthenticated; trust comes from the signature over the raw body.
pub async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            warn!("card webhook without signature header");
            ServiceError::Unauthorized("missing webhook signature".to_string())
        })?;

    match state
        .services
        .orders
        .verify_card_event(body, signature)
        .await
    {
        Ok(Some(outcome)) => Ok(success_response(
            "Webhook processed",
            serde_json::json!({ "outcome": format!("{:?}", outcome).to_lowercase() }),
        )),
        Ok(None) => {
            info!("card webhook event ignored");
            Ok((StatusCode::OK, "ok").into_response())
        }
        // Redeliveries of an already-applied failure find nothing left to delete.
        Err(ServiceError::NotFound(msg)) => {
            info!(%msg, "card webhook for unknown order");
            Ok((StatusCode::OK, "ok").into_response())
        }
        Err(e) => Err(e),
    }
}
