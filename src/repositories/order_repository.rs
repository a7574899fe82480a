use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel,
    DEFAULT_ORDER_STATUS,
};
use crate::entities::{OrderItems, PaymentMethod};
use crate::repositories::Repository;

use super::user_repository::clear_cart_on;
use super::BaseRepository;

/// Fields supplied when an order is first written
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: OrderItems,
    pub amount: Decimal,
    pub address: serde_json::Value,
    pub payment_method: PaymentMethod,
}

/// State of a gateway order after a successful payment has been applied
#[derive(Debug, Clone)]
pub struct PaidSettlement {
    pub order: OrderModel,
    /// This call flipped `payment`; false on redelivery
    pub newly_paid: bool,
    /// This call emptied the owner's cart (and found the owner)
    pub cart_cleared: bool,
}

/// Repository for order operations.
///
/// Every mutation after insert is a conditional statement; callers inspect
/// the affected row count rather than re-reading the row first. Writes that
/// also touch the owner's cart run in one transaction.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Insert a new unpaid order in the default status
    pub async fn create(&self, new_order: NewOrder) -> Result<OrderModel, DbErr> {
        insert_on(self.get_db(), new_order, false).await
    }

    /// Insert a cash order and empty the owner's cart in the same transaction.
    ///
    /// Returns the order and the number of cart rows cleared.
    pub async fn create_clearing_cart(
        &self,
        new_order: NewOrder,
    ) -> Result<(OrderModel, u64), DbErr> {
        let txn = self.get_db().begin().await?;
        let user_id = new_order.user_id;
        let order = insert_on(&txn, new_order, true).await?;
        let cleared = clear_cart_on(&txn, user_id).await?;
        txn.commit().await?;
        Ok((order, cleared))
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, DbErr> {
        Order::find_by_id(id).one(self.get_db()).await
    }

    /// Every order, newest first
    pub async fn find_all(&self) -> Result<Vec<OrderModel>, DbErr> {
        Order::find()
            .order_by_desc(Column::Date)
            .order_by_desc(Column::CreatedAt)
            .all(self.get_db())
            .await
    }

    /// Orders owned by one user, newest first
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<OrderModel>, DbErr> {
        Order::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::Date)
            .order_by_desc(Column::CreatedAt)
            .all(self.get_db())
            .await
    }

    /// Record the provider reference returned by intent creation
    pub async fn set_gateway_ref(&self, id: Uuid, gateway_ref: &str) -> Result<u64, DbErr> {
        let result = Order::update_many()
            .col_expr(Column::GatewayRef, Expr::value(gateway_ref.to_string()))
            .col_expr(Column::Version, Expr::col(Column::Version).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    /// Flip `payment` to true for an unpaid gateway order.
    ///
    /// Returns the number of rows changed: 0 when the order is missing,
    /// already paid, or a cash order. The cart is left alone; see
    /// [`OrderRepository::settle_paid`].
    pub async fn mark_paid(&self, id: Uuid) -> Result<u64, DbErr> {
        mark_paid_on(self.get_db(), id).await
    }

    /// Mark a gateway order paid and empty its owner's cart exactly once.
    ///
    /// Both steps commit together. The cart step is claimed through the
    /// order's `cart_cleared` flag, so a redelivery for an order that is
    /// already paid still finishes a clearing that never happened, and never
    /// clears the cart a second time. `None` when the order does not exist.
    pub async fn settle_paid(&self, id: Uuid) -> Result<Option<PaidSettlement>, DbErr> {
        let txn = self.get_db().begin().await?;
        let newly_paid = mark_paid_on(&txn, id).await? == 1;

        let Some(mut order) = Order::find_by_id(id).one(&txn).await? else {
            txn.commit().await?;
            return Ok(None);
        };

        let mut cart_cleared = false;
        if order.payment {
            let claimed = Order::update_many()
                .col_expr(Column::CartCleared, Expr::value(true))
                .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(Column::Id.eq(id))
                .filter(Column::Payment.eq(true))
                .filter(Column::CartCleared.eq(false))
                .exec(&txn)
                .await?
                .rows_affected
                == 1;
            if claimed {
                cart_cleared = clear_cart_on(&txn, order.user_id).await? == 1;
                order.cart_cleared = true;
            }
        }

        txn.commit().await?;
        Ok(Some(PaidSettlement {
            order,
            newly_paid,
            cart_cleared,
        }))
    }

    /// Delete an order only while it is still unpaid
    pub async fn delete_unpaid(&self, id: Uuid) -> Result<u64, DbErr> {
        let result = Order::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::Payment.eq(false))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    /// Overwrite the free-text status, leaving payment untouched
    pub async fn update_status(&self, id: Uuid, status: &str) -> Result<u64, DbErr> {
        let result = Order::update_many()
            .col_expr(Column::Status, Expr::value(status.to_string()))
            .col_expr(Column::Version, Expr::col(Column::Version).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }
}

async fn insert_on<C: ConnectionTrait>(
    conn: &C,
    new_order: NewOrder,
    cart_cleared: bool,
) -> Result<OrderModel, DbErr> {
    let now = Utc::now();
    let order = OrderActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(new_order.user_id),
        items: Set(new_order.items),
        amount: Set(new_order.amount),
        address: Set(new_order.address),
        status: Set(DEFAULT_ORDER_STATUS.to_string()),
        payment_method: Set(new_order.payment_method),
        payment: Set(false),
        gateway_ref: Set(None),
        cart_cleared: Set(cart_cleared),
        date: Set(now),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };
    order.insert(conn).await
}

async fn mark_paid_on<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    let result = Order::update_many()
        .col_expr(Column::Payment, Expr::value(true))
        .col_expr(Column::Version, Expr::col(Column::Version).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(id))
        .filter(Column::Payment.eq(false))
        .filter(Column::PaymentMethod.ne(PaymentMethod::Cod))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
