//! Records exchanged between the order workflow and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, LineItemId, Money, OrderId, ProductId};

/// A customer as known to the customer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}

impl Customer {
    pub fn new(
        id: impl Into<CustomerId>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A product as listed in the catalog, with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Units currently available.
    pub quantity: u32,
}

impl CatalogProduct {
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
        }
    }
}

/// Conditional stock update for one product.
///
/// The catalog sets the quantity to `quantity` only if it still equals
/// `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityUpdate {
    pub product_id: ProductId,
    pub expected: u32,
    pub quantity: u32,
}

/// A line item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub price: Money,
    pub quantity: u32,
}

/// An order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: Customer,
    pub line_items: Vec<NewLineItem>,
}

/// A persisted order line item.
///
/// `price` is the catalog price captured when the order was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub price: Money,
    pub quantity: u32,
}

impl OrderLineItem {
    /// Returns `price * quantity`.
    pub fn total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    pub line_items: Vec<OrderLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of all line item totals.
    pub fn total(&self) -> Money {
        self.line_items.iter().map(OrderLineItem::total).sum()
    }

    /// Builds a persisted order from its unpersisted form, assigning fresh ids.
    pub fn from_new(new_order: NewOrder, now: DateTime<Utc>) -> Self {
        let line_items = new_order
            .line_items
            .into_iter()
            .map(|item| OrderLineItem {
                id: LineItemId::new(),
                product_id: item.product_id,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        Self {
            id: OrderId::new(),
            customer: new_order.customer,
            line_items,
            created_at: now,
            updated_at: now,
        }
    }
}
