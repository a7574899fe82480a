use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use super::common::{created_response, parse_id, success_response, JsonBody};
use crate::{
    errors::ServiceError,
    services::products::{CreateProductInput, UpdateProductInput},
    AppState,
};

/// Body of the single-product lookup and removal routes
#[derive(Debug, Deserialize)]
pub struct ProductIdRequest {
    #[serde(alias = "productId")]
    pub id: Option<Uuid>,
}

/// POST /api/product/add
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(
        "New Product is Created Successfully!",
        product,
    ))
}

/// PUT /api/product/:product_id
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    JsonBody(payload): JsonBody<UpdateProductInput>,
) -> Result<Response, ServiceError> {
    let product_id = parse_id(&product_id)?;
    let product = state
        .services
        .products
        .update(product_id, payload)
        .await?;
    Ok(success_response("Product is Updated Successfully!", product))
}

/// GET /api/product/list
pub async fn list_products(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let products = state.services.products.list().await?;
    Ok(success_response("All Products", products))
}

/// GET or POST /api/product/get
pub async fn get_product(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ProductIdRequest>,
) -> Result<Response, ServiceError> {
    let product_id = payload.id.ok_or_else(ServiceError::missing_fields)?;
    let product = state.services.products.get(product_id).await?;
    Ok(success_response("Product Found", product))
}

/// POST /api/product/remove
pub async fn remove_product(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ProductIdRequest>,
) -> Result<Response, ServiceError> {
    let product_id = payload.id.ok_or_else(ServiceError::missing_fields)?;
    let product = state.services.products.delete(product_id).await?;
    Ok(success_response(
        format!("The Product {} is Deleted!", product.name),
        serde_json::Value::Null,
    ))
}

/// GET /api/product/categories/:category
pub async fn products_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, ServiceError> {
    let products = state.services.products.list_by_category(&category).await?;
    Ok(success_response("All the products based on Category", products))
}
