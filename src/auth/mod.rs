//! Token issuance and the request guards for user and admin routes.
//!
//! Tokens are HS256 JWTs. The guards accept `Authorization: Bearer <jwt>` and,
//! for older clients, a bare `token` header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub mod password;

pub use password::{hash_password, verify_password};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Legacy header carrying the raw token
pub const LEGACY_TOKEN_HEADER: &str = "token";

const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,  // user id, or the admin email for admin tokens
    pub role: String, // "user" | "admin"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated customer, inserted into request extensions by [`user_auth`]
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Authenticated administrator, inserted by [`admin_auth`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser {
    pub email: String,
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    user_token_ttl: Duration,
    admin_email: String,
    admin_password: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("user_token_ttl", &self.user_token_ttl)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        jwt_secret: impl Into<String>,
        user_token_ttl: Duration,
        admin_email: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            user_token_ttl,
            admin_email: admin_email.into(),
            admin_password: admin_password.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
            config.admin_email.clone(),
            config.admin_password.clone(),
        )
    }

    fn sign(
        &self,
        sub: String,
        role: &str,
        email: Option<String>,
        ttl: Duration,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|_| ServiceError::Internal("Invalid token duration".to_string()))?;
        let claims = Claims {
            sub,
            role: role.to_string(),
            email,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("token signing failed: {}", e)))
    }

    pub fn issue_user_token(&self, user_id: Uuid) -> Result<String, ServiceError> {
        self.sign(user_id.to_string(), ROLE_USER, None, self.user_token_ttl)
    }

    pub fn issue_admin_token(&self) -> Result<String, ServiceError> {
        self.sign(
            self.admin_email.clone(),
            ROLE_ADMIN,
            Some(self.admin_email.clone()),
            ADMIN_TOKEN_TTL,
        )
    }

    /// Decodes and checks signature and expiry.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token expired".to_string())
            }
            _ => ServiceError::Unauthorized("Not Authorized Login Again".to_string()),
        })
    }

    /// Compares against the configured admin credentials.
    pub fn check_admin_credentials(&self, email: &str, password: &str) -> bool {
        !self.admin_email.is_empty()
            && constant_time_eq(email.as_bytes(), self.admin_email.as_bytes())
            && constant_time_eq(password.as_bytes(), self.admin_password.as_bytes())
    }

    pub fn authenticate_user(&self, headers: &HeaderMap) -> Result<AuthUser, ServiceError> {
        let claims = self.validate_token(&extract_token(headers)?)?;
        if claims.role != ROLE_USER {
            return Err(ServiceError::Unauthorized(
                "Not Authorized Login Again".to_string(),
            ));
        }
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Not Authorized Login Again".to_string()))?;
        Ok(AuthUser { user_id })
    }

    pub fn authenticate_admin(&self, headers: &HeaderMap) -> Result<AdminUser, ServiceError> {
        let claims = self.validate_token(&extract_token(headers)?)?;
        match claims.email {
            Some(email) if claims.role == ROLE_ADMIN && email == self.admin_email => {
                Ok(AdminUser { email })
            }
            _ => {
                warn!("rejected non-admin token on admin route");
                Err(ServiceError::Unauthorized(
                    "Not Authorized Login Again".to_string(),
                ))
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Pulls the raw token from `Authorization: Bearer` or the legacy `token` header
fn extract_token(headers: &HeaderMap) -> Result<String, ServiceError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    let legacy = || {
        headers
            .get(LEGACY_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    bearer
        .or_else(legacy)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Not Authorized Login Again".to_string()))
}

/// Guard for customer routes
pub async fn user_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = auth.authenticate_user(request.headers())?;
    debug!(user_id = %user.user_id, "authenticated user");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Guard for admin routes
pub async fn admin_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let admin = auth.authenticate_admin(request.headers())?;
    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}
