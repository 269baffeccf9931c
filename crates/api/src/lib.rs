//! HTTP API server for the order fulfillment pipeline.
//!
//! Provides the cart, order, and catalog endpoints, with structured
//! logging (tracing) and Prometheus metrics. The caller's identity arrives
//! as `X-User-*` headers from the out-of-scope gateway.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use events::InMemoryEventBus;
use fulfillment::{CartService, FulfillmentService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::FulfillmentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: FulfillmentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::history::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", patch(routes::orders::update_status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store and bus.
pub fn create_state<S: FulfillmentStore + Clone>(
    store: S,
    bus: InMemoryEventBus,
) -> Arc<AppState<S>> {
    let fulfillment = Arc::new(FulfillmentService::new(store.clone(), bus));
    let cart = CartService::new(store.clone());
    Arc::new(AppState {
        fulfillment,
        cart,
        store,
    })
}
