//! Input types for order creation.

use common::{CustomerId, ProductId};
use serde::{Deserialize, Serialize};

/// One requested product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A request to place an order.
///
/// Items are kept in the order given. Repeated product ids are not merged:
/// each entry becomes its own line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<RequestedItem>,
}

impl OrderRequest {
    pub fn new(customer_id: impl Into<CustomerId>, items: Vec<RequestedItem>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items,
        }
    }

    /// Adds an item, builder style.
    pub fn item(mut self, product_id: impl Into<ProductId>, quantity: u32) -> Self {
        self.items.push(RequestedItem::new(product_id, quantity));
        self
    }

    /// Requested product ids without repeats, in first-appearance order.
    pub fn distinct_product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }
        ids
    }
}
