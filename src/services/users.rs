use crate::{
    auth::{hash_password, verify_password, AuthService},
    entities::user::Model as UserModel,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{NewUser, UserChanges, UserRepository},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

const MIN_PASSWORD_LEN: usize = 8;
const DUPLICATE_EMAIL: &str = "User with this Email already exists";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Please enter a strong password"))]
    pub password: String,
}

/// Administrator edit of an account. Absent or blank fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(max = 100, message = "Username is too long"))]
    pub username: Option<String>,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: Option<String>,
}

/// A logged-in user and their token
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserModel,
    pub token: String,
}

/// Avatar URL derived from the email (size 200, pg rating, mystery-man fallback)
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=200&r=pg&d=mm",
        hex::encode(digest)
    )
}

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(
        users: UserRepository,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            users,
            auth,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserModel, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(DUPLICATE_EMAIL.to_string()));
        }

        let user = self
            .users
            .create(NewUser {
                username: input.username.trim().to_string(),
                image_url: gravatar_url(&email),
                password_hash: hash_password(&input.password).await?,
                email,
            })
            .await
            // A concurrent registration can pass the lookup above; the unique index decides.
            .map_err(|e| ServiceError::on_unique_violation(e, DUPLICATE_EMAIL))?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid Email ID".to_string()))?;

        if !verify_password(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(ServiceError::Unauthorized("Invalid Password".to_string()));
        }

        let token = self.auth.issue_user_token(user.id)?;
        Ok(LoginOutcome { user, token })
    }

    #[instrument(skip(self, password))]
    pub fn admin_login(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Please provide both email and password".to_string(),
            ));
        }
        if !self.auth.check_admin_credentials(email, password) {
            warn!("admin login rejected");
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
        self.auth.issue_admin_token()
    }

    #[instrument(skip(self))]
    pub async fn me(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn update_image(
        &self,
        user_id: Uuid,
        image_url: &str,
    ) -> Result<UserModel, ServiceError> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Image Url is Required".to_string(),
            ));
        }
        if self.users.update_image_url(user_id, image_url).await? == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        self.me(user_id).await
    }

    #[instrument(skip(self, password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        password: &str,
    ) -> Result<(), ServiceError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::InvalidArgument(
                "Strong Password is Required".to_string(),
            ));
        }
        let hash = hash_password(password).await?;
        if self.users.update_password_hash(user_id, &hash).await? == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        info!(%user_id, "password changed");
        Ok(())
    }

    /// Every account, newest first
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<UserModel>, ServiceError> {
        Ok(self.users.find_all().await?)
    }

    /// Administrator edit of username and email.
    ///
    /// The email is normalised like at registration and must stay unique.
    #[instrument(skip(self, input))]
    pub async fn update_account(
        &self,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> Result<UserModel, ServiceError> {
        let username = input
            .username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let email = input
            .email
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty());
        UpdateUserInput {
            username: username.clone(),
            email: email.clone(),
        }
        .validate()?;

        if let Some(email) = &email {
            if let Some(owner) = self.users.find_by_email(email).await? {
                if owner.id != user_id {
                    return Err(ServiceError::AlreadyExists(DUPLICATE_EMAIL.to_string()));
                }
            }
        }

        let user = self
            .users
            .update_account(user_id, UserChanges { username, email })
            .await
            .map_err(|e| ServiceError::on_unique_violation(e, DUPLICATE_EMAIL))?
            .ok_or_else(|| ServiceError::NotFound("The User does not exist!".to_string()))?;

        info!(%user_id, "user updated by administrator");
        Ok(user)
    }

    /// Removes an account and returns it. Orders placed by it are kept.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User is not Found!".to_string()))?;
        if self.users.delete(user_id).await? == 0 {
            return Err(ServiceError::NotFound("User is not Found!".to_string()));
        }

        self.event_sender.send_or_log(Event::UserDeleted(user_id)).await;
        info!(%user_id, "user deleted");
        Ok(user)
    }
}
