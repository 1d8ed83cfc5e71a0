use async_trait::async_trait;

use crate::{
    CatalogProduct, Customer, CustomerId, NewOrder, Order, OrderId, ProductId, QuantityUpdate,
    Result,
};

/// Resolves customer identifiers to customer records.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Looks up a customer.
    ///
    /// Returns None if the directory has no such customer.
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>>;
}

/// Read and stock-update access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Resolves a batch of product ids.
    ///
    /// Unknown ids are skipped rather than reported, so the result may hold
    /// fewer products than requested. Order of the result is unspecified.
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>>;

    /// Applies a batch of conditional quantity updates.
    ///
    /// The batch is all-or-nothing: if any product's current quantity differs
    /// from its `expected` value, nothing is written and
    /// [`StoreError::QuantityConflict`](crate::StoreError::QuantityConflict)
    /// names that product.
    async fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()>;
}

/// Persistence for orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order together with all of its line items atomically.
    ///
    /// Line items in the returned order keep the order of `new_order`.
    async fn create_order(&self, new_order: NewOrder) -> Result<Order>;

    /// Loads an order with its line items.
    ///
    /// Returns None if the order doesn't exist.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Removes an order and its line items. Removing a missing order is a no-op.
    async fn delete_order(&self, id: OrderId) -> Result<()>;
}
