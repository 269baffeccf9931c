//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors produced by the order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status change is not a forward transition.
    #[error("invalid order status transition: {current} -> {target}")]
    InvalidTransition {
        current: OrderStatus,
        target: OrderStatus,
    },
}
