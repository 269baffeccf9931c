//! Fulfillment error types.

use common::{OrderId, UserId};
use domain::OrderError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the fulfillment services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Checkout was attempted with an empty cart.
    #[error("cart is empty for user {0}")]
    EmptyCart(UserId),

    /// The caller's user id does not match the supplied identity.
    #[error("user id {user_id} does not match identity id {identity_id}")]
    IdentityMismatch {
        user_id: UserId,
        identity_id: UserId,
    },

    /// The order does not exist (or is not visible to this user).
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Cart quantities must be positive.
    #[error("quantity must be positive")]
    InvalidQuantity,

    /// The order state machine rejected a transition.
    #[error(transparent)]
    Transition(#[from] OrderError),

    /// Persistence layer error, business or infrastructure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
