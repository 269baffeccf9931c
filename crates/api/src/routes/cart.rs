//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::ProductId;
use serde::{Deserialize, Serialize};
use store::FulfillmentStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;
use crate::routes::user_id_from_headers;

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total_cents: i64,
}

// -- Handlers --

/// GET /cart — the caller's cart with current product prices.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let lines = state.cart.get_cart(user_id).await?;

    let total_cents = lines.iter().map(|line| line.total_price().cents()).sum();
    Ok(Json(CartResponse {
        items: lines
            .iter()
            .map(|line| CartLineResponse {
                product_id: line.product_id.to_string(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                total_cents: line.total_price().cents(),
            })
            .collect(),
        total_cents,
    }))
}

/// POST /cart/items — add a product to the caller's cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let item = state
        .cart
        .add_item(user_id, ProductId::from_uuid(req.product_id), req.quantity)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CartItemResponse {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
        }),
    ))
}

/// DELETE /cart/items/:product_id — remove one product from the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    state
        .cart
        .remove_item(user_id, ProductId::from_uuid(product_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
