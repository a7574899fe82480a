use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::user::{
    ActiveModel as UserActiveModel, Column, Entity as User, Model as UserModel,
};
use crate::models::CartData;
use crate::repositories::Repository;

use super::BaseRepository;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
}

/// Account fields an administrator may overwrite; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Repository for user rows and the cart embedded in them
#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, new_user: NewUser) -> Result<UserModel, DbErr> {
        let now = Utc::now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            image_url: Set(new_user.image_url),
            cart_data: Set(CartData::new()),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        user.insert(self.get_db()).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserModel>, DbErr> {
        User::find_by_id(id).one(self.get_db()).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, DbErr> {
        User::find()
            .filter(Column::Email.eq(email))
            .one(self.get_db())
            .await
    }

    /// Every account, newest first
    pub async fn find_all(&self) -> Result<Vec<UserModel>, DbErr> {
        User::find()
            .order_by_desc(Column::CreatedAt)
            .all(self.get_db())
            .await
    }

    /// Applies `changes`. `None` when the user does not exist.
    pub async fn update_account(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<UserModel>, DbErr> {
        let Some(user) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut user = user.into_active_model();
        if let Some(username) = changes.username {
            user.username = Set(username);
        }
        if let Some(email) = changes.email {
            user.email = Set(email);
        }
        user.updated_at = Set(Utc::now());
        user.update(self.get_db()).await.map(Some)
    }

    pub async fn delete(&self, id: Uuid) -> Result<u64, DbErr> {
        let result = User::delete_by_id(id).exec(self.get_db()).await?;
        Ok(result.rows_affected)
    }

    /// Replace the cart only if the row is still at `expected_version`.
    ///
    /// Returns false when another writer got there first.
    pub async fn swap_cart(
        &self,
        id: Uuid,
        expected_version: i32,
        cart: CartData,
    ) -> Result<bool, DbErr> {
        let result = User::update_many()
            .col_expr(Column::CartData, Expr::value(cart))
            .col_expr(Column::Version, Expr::value(expected_version + 1))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::Version.eq(expected_version))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Unconditionally empty the cart. Returns the number of rows changed.
    pub async fn clear_cart(&self, id: Uuid) -> Result<u64, DbErr> {
        clear_cart_on(self.get_db(), id).await
    }

    pub async fn update_image_url(&self, id: Uuid, image_url: &str) -> Result<u64, DbErr> {
        let result = User::update_many()
            .col_expr(Column::ImageUrl, Expr::value(image_url))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<u64, DbErr> {
        let result = User::update_many()
            .col_expr(Column::PasswordHash, Expr::value(password_hash))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Empties a cart on any connection, so order writes can share a transaction.
pub(crate) async fn clear_cart_on<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    let result = User::update_many()
        .col_expr(Column::CartData, Expr::value(CartData::new()))
        .col_expr(Column::Version, Expr::col(Column::Version).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

impl Repository for UserRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
