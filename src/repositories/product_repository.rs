use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::product::{
    ActiveModel as ProductActiveModel, Column, Entity as Product, Model as ProductModel,
};
use crate::entities::StringList;
use crate::repositories::Repository;

use super::BaseRepository;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub brand: String,
    pub price: Decimal,
    pub category: String,
    pub sub_category: String,
    pub sizes: Vec<String>,
    pub bestseller: bool,
}

/// Fields an update may overwrite; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sizes: Option<Vec<String>>,
    pub bestseller: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, new_product: NewProduct) -> Result<ProductModel, DbErr> {
        let now = Utc::now();
        let product = ProductActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new_product.name),
            description: Set(new_product.description),
            images: Set(StringList(new_product.images)),
            brand: Set(new_product.brand),
            price: Set(new_product.price),
            category: Set(new_product.category),
            sub_category: Set(new_product.sub_category),
            sizes: Set(StringList(new_product.sizes)),
            bestseller: Set(new_product.bestseller),
            date: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };
        product.insert(self.get_db()).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ProductModel>, DbErr> {
        Product::find_by_id(id).one(self.get_db()).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<ProductModel>, DbErr> {
        Product::find()
            .filter(Column::Name.eq(name))
            .one(self.get_db())
            .await
    }

    /// Whole catalog, newest first
    pub async fn find_all(&self) -> Result<Vec<ProductModel>, DbErr> {
        Product::find()
            .order_by_desc(Column::Date)
            .order_by_asc(Column::Name)
            .all(self.get_db())
            .await
    }

    pub async fn find_by_category(&self, category: &str) -> Result<Vec<ProductModel>, DbErr> {
        Product::find()
            .filter(Column::Category.eq(category))
            .order_by_desc(Column::Date)
            .order_by_asc(Column::Name)
            .all(self.get_db())
            .await
    }

    /// Applies `changes` to a stored product. `None` when it does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<ProductModel>, DbErr> {
        let Some(product) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut product = product.into_active_model();
        if let Some(name) = changes.name {
            product.name = Set(name);
        }
        if let Some(description) = changes.description {
            product.description = Set(description);
        }
        if let Some(images) = changes.images {
            product.images = Set(StringList(images));
        }
        if let Some(brand) = changes.brand {
            product.brand = Set(brand);
        }
        if let Some(price) = changes.price {
            product.price = Set(price);
        }
        if let Some(category) = changes.category {
            product.category = Set(category);
        }
        if let Some(sub_category) = changes.sub_category {
            product.sub_category = Set(sub_category);
        }
        if let Some(sizes) = changes.sizes {
            product.sizes = Set(StringList(sizes));
        }
        if let Some(bestseller) = changes.bestseller {
            product.bestseller = Set(bestseller);
        }
        product.updated_at = Set(Utc::now());

        product.update(self.get_db()).await.map(Some)
    }

    pub async fn delete(&self, id: Uuid) -> Result<u64, DbErr> {
        let result = Product::delete_by_id(id).exec(self.get_db()).await?;
        Ok(result.rows_affected)
    }
}

impl Repository for ProductRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
