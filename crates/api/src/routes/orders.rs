//! Order endpoints and shared application state.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Order, OrderStatus};
use events::InMemoryEventBus;
use fulfillment::{CartService, FulfillmentService};
use serde::{Deserialize, Serialize};
use store::FulfillmentStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::{identity_from_headers, user_id_from_headers};

/// Shared application state accessible from all handlers.
pub struct AppState<S: FulfillmentStore> {
    pub fulfillment: Arc<FulfillmentService<S, InMemoryEventBus>>,
    pub cart: CartService<S>,
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub current_status: OrderStatus,
    pub new_status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_time_cents: i64,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status(),
            total_cents: order.total_price().cents(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    price_at_time_cents: item.price_at_time.cents(),
                    total_cents: item.total_price().cents(),
                })
                .collect(),
            created_at: order.created_at(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderHistoryResponse {
    pub orders: Vec<OrderResponse>,
}

// -- Handlers --

/// POST /orders — convert the caller's cart into an order.
#[tracing::instrument(skip(state, headers))]
pub async fn create<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let identity = identity_from_headers(&headers)?;
    let order = state
        .fulfillment
        .create_order_from_cart(identity.id, &identity)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders — the caller's order history, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn history<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<OrderHistoryResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let orders = state.fulfillment.orders_history(user_id).await?;
    Ok(Json(OrderHistoryResponse {
        orders: orders.iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /orders/:id — one order, if it belongs to the caller.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state.fulfillment.order_details(order_id, user_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/:id/status — forward-only status update from another
/// service (confirmation, completion).
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_status<S: FulfillmentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .fulfillment
        .update_order_status(order_id, user_id, req.current_status, req.new_status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    Uuid::parse_str(id)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))
}
