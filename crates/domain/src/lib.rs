//! Domain layer for the order fulfillment pipeline.
//!
//! This crate provides the entities shared by the services:
//! - [`Product`] catalog rows with their stock counts
//! - [`CartItem`] / [`CartLine`] cart entries and snapshots
//! - [`Order`] aggregate with its [`OrderStatus`] state machine
//! - [`UserIdentity`] contact data captured at order time

pub mod cart;
pub mod error;
pub mod identity;
pub mod order;
pub mod product;

pub use cart::{CartItem, CartLine};
pub use error::OrderError;
pub use identity::UserIdentity;
pub use order::{Order, OrderItem, OrderStatus};
pub use product::Product;
