//! Cart mutation service.

use common::{ProductId, UserId};
use domain::{CartItem, CartLine};
use store::{FulfillmentStore, StoreError};

use crate::error::FulfillmentError;

/// Cart operations on top of the store.
pub struct CartService<S> {
    store: S,
}

impl<S: FulfillmentStore> CartService<S> {
    /// Creates a new cart service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart joined with product data.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, FulfillmentError> {
        Ok(self.store.cart_snapshot(user_id).await?)
    }

    /// Adds a product to the cart, incrementing the quantity if the entry
    /// already exists.
    ///
    /// Stock is validated against the current count as a courtesy check;
    /// the authoritative check happens again under lock at checkout.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, FulfillmentError> {
        if quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity);
        }

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        if product.stock_quantity < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            }
            .into());
        }

        let item = self
            .store
            .upsert_cart_item(user_id, product_id, quantity)
            .await?;
        tracing::info!(quantity = item.quantity, "added item to cart");
        Ok(item)
    }

    /// Removes one product from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), FulfillmentError> {
        self.store.remove_cart_item(user_id, product_id).await?;
        tracing::info!("removed item from cart");
        Ok(())
    }

    /// Empties the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<usize, FulfillmentError> {
        let deleted = self.store.clear_cart(user_id).await?;
        tracing::info!(deleted, "cleared cart");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::Product;
    use store::{MemoryStore, ProductStore};

    async fn setup() -> (CartService<MemoryStore>, ProductId) {
        let store = MemoryStore::new();
        let product = Product::new("Beans", "Arabica, 1kg", Money::from_cents(1000), 5);
        let product_id = product.id;
        store.insert_product(product).await.unwrap();
        (CartService::new(store), product_id)
    }

    #[tokio::test]
    async fn add_item_upserts_quantity() {
        let (cart, product_id) = setup().await;
        let user = UserId::new();

        cart.add_item(user, product_id, 2).await.unwrap();
        let item = cart.add_item(user, product_id, 1).await.unwrap();
        assert_eq!(item.quantity, 3);

        let lines = cart.get_cart(user).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn add_item_rejects_zero_quantity() {
        let (cart, product_id) = setup().await;
        let result = cart.add_item(UserId::new(), product_id, 0).await;
        assert!(matches!(result, Err(FulfillmentError::InvalidQuantity)));
    }

    #[tokio::test]
    async fn add_item_rejects_unknown_product() {
        let (cart, _) = setup().await;
        let result = cart.add_item(UserId::new(), ProductId::new(), 1).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::Store(StoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn add_item_rejects_more_than_stock() {
        let (cart, product_id) = setup().await;
        let result = cart.add_item(UserId::new(), product_id, 6).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::Store(StoreError::InsufficientStock { .. }))
        ));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let (cart, product_id) = setup().await;
        let user = UserId::new();
        cart.add_item(user, product_id, 2).await.unwrap();

        cart.remove_item(user, product_id).await.unwrap();
        assert!(cart.get_cart(user).await.unwrap().is_empty());

        cart.add_item(user, product_id, 1).await.unwrap();
        assert_eq!(cart.clear(user).await.unwrap(), 1);
        assert!(cart.get_cart(user).await.unwrap().is_empty());
    }
}
