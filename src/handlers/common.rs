use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, ApiResponse};

/// `200 OK` with the success envelope
pub fn success_response<T: Serialize>(msg: impl Into<String>, data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(msg, data))).into_response()
}

/// `201 Created` with the success envelope
pub fn created_response<T: Serialize>(msg: impl Into<String>, data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(msg, data))).into_response()
}

/// `200 OK` carrying `success: false`.
///
/// Used where the request itself was fine but the business outcome was
/// negative, e.g. a payment that has not gone through.
pub fn declined_response(msg: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::<()>::declined(msg))).into_response()
}

/// Parses an id taken from the URL path.
pub fn parse_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::InvalidArgument(format!("Invalid id: {}", raw)))
}

/// JSON body extractor whose rejections use the error envelope.
///
/// Malformed bodies, wrong field types and missing content types all become
/// `400` with `success: false` instead of axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
