use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CatalogProduct, Customer, CustomerDirectory, CustomerId, NewOrder, Order, OrderId,
    OrderStore, ProductCatalog, ProductId, QuantityUpdate, Result, StoreError,
};

#[derive(Debug, Default)]
struct InMemoryState {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, CatalogProduct>,
    orders: HashMap<OrderId, Order>,
    catalog_reads: usize,
    quantity_update_batches: usize,
    fail_on_create: bool,
    fail_on_update_quantities: bool,
    fail_on_delete: bool,
}

/// In-memory customer directory, product catalog and order store.
///
/// Implements the same contracts as [`PostgresStore`](crate::PostgresStore).
/// Every operation runs under a single lock, which makes order creation and
/// batched quantity updates atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a customer.
    pub async fn insert_customer(&self, customer: Customer) {
        let mut state = self.state.write().await;
        state.customers.insert(customer.id.clone(), customer);
    }

    /// Adds or replaces a catalog product.
    pub async fn insert_product(&self, product: CatalogProduct) {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
    }

    /// Returns the current stock of a product, if it is listed.
    pub async fn product_quantity(&self, id: &ProductId) -> Option<u32> {
        self.state.read().await.products.get(id).map(|p| p.quantity)
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns how many times the catalog has been read.
    pub async fn catalog_reads(&self) -> usize {
        self.state.read().await.catalog_reads
    }

    /// Returns how many quantity update batches have been applied.
    pub async fn quantity_update_batches(&self) -> usize {
        self.state.read().await.quantity_update_batches
    }

    /// Configures the store to fail order creation.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures the store to fail quantity updates.
    pub async fn set_fail_on_update_quantities(&self, fail: bool) {
        self.state.write().await.fail_on_update_quantities = fail;
    }

    /// Configures the store to fail order deletion.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>> {
        let mut state = self.state.write().await;
        state.catalog_reads += 1;

        let mut found: Vec<CatalogProduct> = Vec::with_capacity(ids.len());
        for id in ids {
            if found.iter().any(|p| &p.id == id) {
                continue;
            }
            if let Some(product) = state.products.get(id) {
                found.push(product.clone());
            }
        }
        Ok(found)
    }

    async fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_update_quantities {
            return Err(StoreError::Injected("quantity update failed".to_string()));
        }

        // Stage every update first so a conflict leaves the catalog untouched.
        let mut staged: HashMap<&ProductId, u32> = HashMap::new();
        for update in updates {
            let current = match staged.get(&update.product_id) {
                Some(quantity) => Some(*quantity),
                None => state.products.get(&update.product_id).map(|p| p.quantity),
            };
            if current != Some(update.expected) {
                return Err(StoreError::QuantityConflict(update.product_id.clone()));
            }
            staged.insert(&update.product_id, update.quantity);
        }

        for (id, quantity) in staged {
            if let Some(product) = state.products.get_mut(id) {
                product.quantity = quantity;
            }
        }
        state.quantity_update_batches += 1;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(StoreError::Injected("order creation failed".to_string()));
        }

        let order = Order::from_new(new_order, Utc::now());
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_delete {
            return Err(StoreError::Injected("order deletion failed".to_string()));
        }

        state.orders.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, NewLineItem};

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_product(CatalogProduct::new("SKU-001", "Widget", Money::from_cents(1000), 5))
            .await;
        store
            .insert_product(CatalogProduct::new("SKU-002", "Gadget", Money::from_cents(250), 1))
            .await;
        store
    }

    fn update(id: &str, expected: u32, quantity: u32) -> QuantityUpdate {
        QuantityUpdate {
            product_id: ProductId::new(id),
            expected,
            quantity,
        }
    }

    #[tokio::test]
    async fn find_customer() {
        let store = InMemoryStore::new();
        store
            .insert_customer(Customer::new("cust-1", "Ada", "ada@example.com"))
            .await;

        let found = store.find_customer(&CustomerId::new("cust-1")).await.unwrap();
        assert_eq!(found.unwrap().name, "Ada");

        let missing = store.find_customer(&CustomerId::new("nobody")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn find_products_skips_unknown_and_duplicate_ids() {
        let store = seeded_store().await;
        let ids = vec![
            ProductId::new("SKU-001"),
            ProductId::new("SKU-404"),
            ProductId::new("SKU-001"),
        ];

        let found = store.find_products(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "SKU-001");
        assert_eq!(store.catalog_reads().await, 1);
    }

    #[tokio::test]
    async fn update_quantities_applies_whole_batch() {
        let store = seeded_store().await;

        store
            .update_quantities(&[update("SKU-001", 5, 2), update("SKU-002", 1, 0)])
            .await
            .unwrap();

        assert_eq!(store.product_quantity(&"SKU-001".into()).await, Some(2));
        assert_eq!(store.product_quantity(&"SKU-002".into()).await, Some(0));
        assert_eq!(store.quantity_update_batches().await, 1);
    }

    #[tokio::test]
    async fn update_quantities_conflict_leaves_catalog_untouched() {
        let store = seeded_store().await;

        let result = store
            .update_quantities(&[update("SKU-001", 5, 2), update("SKU-002", 7, 0)])
            .await;

        assert!(matches!(
            result,
            Err(StoreError::QuantityConflict(ref id)) if id.as_str() == "SKU-002"
        ));
        assert_eq!(store.product_quantity(&"SKU-001".into()).await, Some(5));
        assert_eq!(store.product_quantity(&"SKU-002".into()).await, Some(1));
        assert_eq!(store.quantity_update_batches().await, 0);
    }

    #[tokio::test]
    async fn update_quantities_unknown_product_conflicts() {
        let store = seeded_store().await;
        let result = store.update_quantities(&[update("SKU-404", 0, 0)]).await;
        assert!(matches!(result, Err(StoreError::QuantityConflict(_))));
    }

    #[tokio::test]
    async fn create_find_and_delete_order() {
        let store = InMemoryStore::new();
        let new_order = NewOrder {
            customer: Customer::new("cust-1", "Ada", "ada@example.com"),
            line_items: vec![NewLineItem {
                product_id: ProductId::new("SKU-001"),
                price: Money::from_cents(1000),
                quantity: 3,
            }],
        };

        let order = store.create_order(new_order).await.unwrap();
        assert_eq!(store.order_count().await, 1);

        let loaded = store.find_order(order.id).await.unwrap();
        assert_eq!(loaded, Some(order.clone()));

        store.delete_order(order.id).await.unwrap();
        assert_eq!(store.order_count().await, 0);
        assert!(store.find_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = seeded_store().await;
        store.set_fail_on_create(true).await;
        store.set_fail_on_update_quantities(true).await;
        store.set_fail_on_delete(true).await;

        let created = store
            .create_order(NewOrder {
                customer: Customer::new("cust-1", "Ada", "ada@example.com"),
                line_items: vec![],
            })
            .await;
        assert!(matches!(created, Err(StoreError::Injected(_))));

        let updated = store.update_quantities(&[update("SKU-001", 5, 4)]).await;
        assert!(matches!(updated, Err(StoreError::Injected(_))));
        assert_eq!(store.product_quantity(&"SKU-001".into()).await, Some(5));

        let deleted = store.delete_order(OrderId::new()).await;
        assert!(matches!(deleted, Err(StoreError::Injected(_))));
    }
}
