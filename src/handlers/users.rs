use axum::{
    extract::{Path, State},
    response::Response,
    Extension,
};
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, parse_id, success_response, JsonBody};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::users::{RegisterInput, UpdateUserInput},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureRequest {
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterInput>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.register(payload).await?;
    let token = state.auth.issue_user_token(user.id)?;
    Ok(created_response(
        "User Registration is Success!",
        json!({ "token": token, "user": user }),
    ))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .users
        .login(&payload.email, &payload.password)
        .await?;
    Ok(success_response(
        format!("Welcome Back! {}", outcome.user.username),
        json!({ "token": outcome.token, "user": outcome.user }),
    ))
}

/// POST /api/user/admin
pub async fn admin_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Response, ServiceError> {
    let token = state
        .services
        .users
        .admin_login(&payload.email, &payload.password)?;
    Ok(success_response(
        format!("Welcome Back! {}", payload.email),
        json!({ "token": token }),
    ))
}

/// GET /api/user/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let profile = state.services.users.me(user.user_id).await?;
    Ok(success_response("Current User Data", profile))
}

/// POST /api/user/profile
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<ProfilePictureRequest>,
) -> Result<Response, ServiceError> {
    let profile = state
        .services
        .users
        .update_image(user.user_id, &payload.image_url)
        .await?;
    Ok(success_response("Profile Picture is Updated!", profile))
}

/// POST /api/user/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Response, ServiceError> {
    state
        .services
        .users
        .change_password(user.user_id, &payload.password)
        .await?;
    Ok(success_response(
        "Password has changed successfully!",
        serde_json::Value::Null,
    ))
}

/// GET /api/user
pub async fn list_users(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let users = state.services.users.list_all().await?;
    Ok(success_response("All Users", users))
}

/// PUT /api/user/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    JsonBody(payload): JsonBody<UpdateUserInput>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .users
        .update_account(parse_id(&user_id)?, payload)
        .await?;
    Ok(success_response("User is Updated Successfully!", user))
}

/// DELETE /api/user/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .users
        .delete_account(parse_id(&user_id)?)
        .await?;
    Ok(success_response(
        format!("The User {} is Deleted!", user.username),
        serde_json::Value::Null,
    ))
}
