//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Fulfillment service error.
    Fulfillment(FulfillmentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match &err {
        FulfillmentError::EmptyCart(_)
        | FulfillmentError::IdentityMismatch { .. }
        | FulfillmentError::InvalidQuantity
        | FulfillmentError::Transition(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        FulfillmentError::Store(store_err) => match store_err {
            StoreError::ProductNotFound(_) | StoreError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InsufficientStock { .. } | StoreError::LockTimeout => StatusCode::CONFLICT,
            StoreError::Order(_) => StatusCode::BAD_REQUEST,
            StoreError::Database(_) | StoreError::Serialization(_) => {
                tracing::error!(error = %store_err, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    };
    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Fulfillment(FulfillmentError::Store(err))
    }
}
