//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::Product;
use serde::{Deserialize, Serialize};
use store::FulfillmentStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock_quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock_quantity: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price_cents: product.price.cents(),
            stock_quantity: product.stock_quantity,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// GET /products — the full catalog, served through the read cache.
#[tracing::instrument(skip(state))]
pub async fn list<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.store.list_products().await?;
    Ok(Json(products.iter().map(ProductResponse::from).collect()))
}

/// GET /products/:id — one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = ProductId::from_uuid(id);
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products — create a catalog product (internal/seeding use).
#[tracing::instrument(skip(state, req))]
pub async fn create<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    if req.price_cents <= 0 {
        return Err(ApiError::BadRequest("price must be positive".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be blank".to_string()));
    }

    let product = Product::new(
        req.name,
        req.description,
        Money::from_cents(req.price_cents),
        req.stock_quantity,
    );
    state.store.insert_product(product.clone()).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}
