//! Local read cache over product rows.
//!
//! The cache is instance-local; entries are invalidated synchronously as
//! part of every stock mutation's effects. The full-catalog listing is
//! cached separately and dropped whenever any product changes.

use std::collections::HashMap;
use std::sync::RwLock;

use common::ProductId;
use domain::Product;

/// Read-through cache for catalog display.
#[derive(Debug, Default)]
pub struct ProductCache {
    by_id: RwLock<HashMap<ProductId, Product>>,
    listing: RwLock<Option<Vec<Product>>>,
}

impl ProductCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached product, if present.
    pub fn get(&self, product_id: ProductId) -> Option<Product> {
        self.by_id.read().unwrap().get(&product_id).cloned()
    }

    /// Caches a product row.
    pub fn put(&self, product: Product) {
        self.by_id.write().unwrap().insert(product.id, product);
    }

    /// Returns the cached catalog listing, if present.
    pub fn listing(&self) -> Option<Vec<Product>> {
        self.listing.read().unwrap().clone()
    }

    /// Caches the catalog listing.
    pub fn put_listing(&self, products: Vec<Product>) {
        *self.listing.write().unwrap() = Some(products);
    }

    /// Drops the entries for the given products and the catalog listing.
    pub fn invalidate<I: IntoIterator<Item = ProductId>>(&self, product_ids: I) {
        let mut by_id = self.by_id.write().unwrap();
        for id in product_ids {
            by_id.remove(&id);
        }
        *self.listing.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn product(name: &str) -> Product {
        Product::new(name, "test", Money::from_cents(1000), 5)
    }

    #[test]
    fn get_after_put() {
        let cache = ProductCache::new();
        let p = product("Beans");
        let id = p.id;
        cache.put(p);
        assert!(cache.get(id).is_some());
    }

    #[test]
    fn invalidate_drops_entry_and_listing() {
        let cache = ProductCache::new();
        let p = product("Beans");
        let id = p.id;
        cache.put(p.clone());
        cache.put_listing(vec![p]);

        cache.invalidate([id]);
        assert!(cache.get(id).is_none());
        assert!(cache.listing().is_none());
    }

    #[test]
    fn invalidating_one_product_keeps_others() {
        let cache = ProductCache::new();
        let a = product("Beans");
        let b = product("Filter");
        let (a_id, b_id) = (a.id, b.id);
        cache.put(a);
        cache.put(b);

        cache.invalidate([a_id]);
        assert!(cache.get(a_id).is_none());
        assert!(cache.get(b_id).is_some());
    }
}
