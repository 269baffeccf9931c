//! Shared types for the order fulfillment services.
//!
//! Identifier newtypes keep the various UUID-keyed entities from being
//! mixed up at compile time; [`Money`] is the fixed-point amount type used
//! for all prices and totals.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, PaymentId, ProductId, UserId};
