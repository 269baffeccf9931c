//! Cart entries and cart snapshots.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A single product entry in a user's cart.
///
/// Keyed by `(user_id, product_id)`; adding the same product again
/// increments the quantity rather than creating a second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Owning user.
    pub user_id: UserId,

    /// Product in the cart.
    pub product_id: ProductId,

    /// Quantity, always positive.
    pub quantity: u32,
}

/// One line of a cart snapshot: a cart entry joined with its product.
///
/// `unit_price` is the price observed at read time and is informational
/// only; order creation re-reads the price under the product row lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Product in the cart.
    pub product_id: ProductId,

    /// Product name at read time.
    pub product_name: String,

    /// Quantity in the cart.
    pub quantity: u32,

    /// Product price at read time.
    pub unit_price: Money,
}

impl CartLine {
    /// Returns the line total at the snapshot price.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
