//! Catalog products and their stock counts.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A catalog product row.
///
/// `stock_quantity` is unsigned, so the no-negative-stock invariant holds
/// by construction; all mutations go through the inventory ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,

    /// Unique display name.
    pub name: String,

    /// Free-form description.
    pub description: String,

    /// Current unit price.
    pub price: Money,

    /// Units available for reservation.
    pub stock_quantity: u32,

    /// Last stock or price change.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            description: description.into(),
            price,
            stock_quantity,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_gets_an_id() {
        let a = Product::new("Beans", "Arabica, 1kg", Money::from_cents(1000), 5);
        let b = Product::new("Filter", "Paper, 100pc", Money::from_cents(500), 5);
        assert_ne!(a.id, b.id);
        assert_eq!(a.stock_quantity, 5);
    }
}
