//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// The five forward statuses carry a fixed total order:
///
/// ```text
/// Created ─► Reserved ─► PaymentProcessed ─► Confirmed ─► Completed
///     │          │               │               │
///     └──────────┴───────────────┴───────────────┴──► Cancelled
/// ```
///
/// The generic transition guard accepts any target strictly later in that
/// sequence, so a step may be skipped in a single call. `Cancelled` sits
/// outside the sequence and is reachable only through the dedicated
/// compensation path on [`Order`](crate::Order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order exists but inventory has not been touched. Kept for backward
    /// compatibility; new orders are persisted directly in `Reserved`.
    Created,

    /// Inventory has been committed, awaiting the payment outcome.
    Reserved,

    /// Payment succeeded.
    PaymentProcessed,

    /// Order confirmed by a downstream service.
    Confirmed,

    /// Order fulfilled (terminal).
    Completed,

    /// Order cancelled and its inventory released (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Position in the forward sequence; `None` for `Cancelled`.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Created => Some(0),
            OrderStatus::Reserved => Some(1),
            OrderStatus::PaymentProcessed => Some(2),
            OrderStatus::Confirmed => Some(3),
            OrderStatus::Completed => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if the generic forward-only guard allows moving from
    /// `self` to `target`.
    pub fn can_advance_to(self, target: OrderStatus) -> bool {
        match (self.rank(), target.rank()) {
            (Some(current), Some(target)) => target > current,
            _ => false,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Reserved => "RESERVED",
            OrderStatus::PaymentProcessed => "PAYMENT_PROCESSED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "RESERVED" => Ok(OrderStatus::Reserved),
            "PAYMENT_PROCESSED" => Ok(OrderStatus::PaymentProcessed),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
