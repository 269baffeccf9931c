//! Store error types.

use common::{OrderId, ProductId};
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur in the persistence layer.
///
/// Business errors (`ProductNotFound`, `InsufficientStock`, `OrderNotFound`,
/// `Order`) are surfaced to the caller unchanged and never retried;
/// `LockTimeout` is the one retryable infrastructure failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A reservation asked for more units than are in stock.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Row lock acquisition exceeded the configured bound.
    #[error("lock acquisition timed out")]
    LockTimeout,

    /// The order state machine rejected a transition.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout)
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
