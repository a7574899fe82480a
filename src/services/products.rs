use crate::{
    entities::product::Model as ProductModel,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{NewProduct, ProductChanges, ProductRepository},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

const DUPLICATE_NAME: &str = "The Product with this name is already exists!";
const PRODUCT_NOT_FOUND: &str = "Product is not Found!";

fn image_urls(images: &[String]) -> Result<(), ValidationError> {
    if images.is_empty() {
        return Err(ValidationError::new("At least one product image is required"));
    }
    if images.iter().any(|url| !validator::validate_url(url.as_str())) {
        return Err(ValidationError::new("Product images must be URLs"));
    }
    Ok(())
}

fn non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("Price cannot be negative"));
    }
    Ok(())
}

/// New catalog entry. Images are URLs of already-hosted files.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default, alias = "image")]
    #[validate(custom = "image_urls")]
    pub images: Vec<String>,
    #[serde(default)]
    pub brand: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub bestseller: bool,
}

/// Partial edit; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255, message = "Product name cannot be blank"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "image")]
    #[validate(custom = "image_urls")]
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, message = "Category cannot be blank"))]
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sizes: Option<Vec<String>>,
    pub bestseller: Option<bool>,
}

/// Product catalog: administrators write, shoppers read.
#[derive(Clone)]
pub struct ProductService {
    products: ProductRepository,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(products: ProductRepository, event_sender: Arc<EventSender>) -> Self {
        Self {
            products,
            event_sender,
        }
    }

    /// # Errors
    ///
    /// * `InvalidArgument` when a required field is blank or an image is not a URL
    /// * `AlreadyExists` when another product has the same name
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        let input = CreateProductInput {
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            ..input
        };
        input.validate()?;

        if self.products.find_by_name(&input.name).await?.is_some() {
            return Err(ServiceError::AlreadyExists(DUPLICATE_NAME.to_string()));
        }

        let product = self
            .products
            .create(NewProduct {
                name: input.name,
                description: input.description,
                images: input.images,
                brand: input.brand,
                price: input.price,
                category: input.category,
                sub_category: input.sub_category,
                sizes: input.sizes,
                bestseller: input.bestseller,
            })
            .await
            .map_err(|e| ServiceError::on_unique_violation(e, DUPLICATE_NAME))?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(self.products.find_all().await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        self.products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.to_string()))
    }

    /// Exact, case-sensitive category match
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(ServiceError::missing_fields());
        }
        Ok(self.products.find_by_category(category).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let input = UpdateProductInput {
            name: input.name.map(|name| name.trim().to_string()),
            category: input.category.map(|category| category.trim().to_string()),
            ..input
        };
        input.validate()?;

        if let Some(name) = &input.name {
            if let Some(existing) = self.products.find_by_name(name).await? {
                if existing.id != product_id {
                    return Err(ServiceError::AlreadyExists(DUPLICATE_NAME.to_string()));
                }
            }
        }

        let product = self
            .products
            .update(
                product_id,
                ProductChanges {
                    name: input.name,
                    description: input.description,
                    images: input.images,
                    brand: input.brand,
                    price: input.price,
                    category: input.category,
                    sub_category: input.sub_category,
                    sizes: input.sizes,
                    bestseller: input.bestseller,
                },
            )
            .await
            .map_err(|e| ServiceError::on_unique_violation(e, DUPLICATE_NAME))?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(product)
    }

    /// Removes a product and returns it. Orders keep their own item snapshots.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = self.get(product_id).await?;
        if self.products.delete(product_id).await? == 0 {
            return Err(ServiceError::NotFound(PRODUCT_NOT_FOUND.to_string()));
        }

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!(%product_id, name = %product.name, "product deleted");
        Ok(product)
    }
}
