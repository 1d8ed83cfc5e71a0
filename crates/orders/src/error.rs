//! Order workflow error types.

use common::{CustomerId, OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while creating or loading an order.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// A requested quantity was zero.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// None of the requested products exist in the catalog.
    #[error("Products not found")]
    ProductsNotFound,

    /// The first requested product, in request order, missing from the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The first requested product, in request order, without enough stock.
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),

    /// The order total does not fit the money representation.
    #[error("Order total exceeds the supported amount")]
    TotalOutOfRange,

    /// Stock changed between validation and decrement. The order was removed.
    #[error("Stock of product {0} changed while the order was being placed")]
    StockChanged(ProductId),

    /// A collaborator failed while reading.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The order store failed to persist the order.
    #[error("Failed to persist order: {0}")]
    Persistence(#[source] StoreError),

    /// The order was persisted but stock could not be decremented.
    #[error("Order {order_id} was persisted but stock was not updated: {source}")]
    StockUpdate {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },
}

impl OrderError {
    /// Returns true if the error stems from the request or current stock,
    /// rather than from a storage fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrderError::CustomerNotFound(_)
                | OrderError::InvalidQuantity { .. }
                | OrderError::ProductsNotFound
                | OrderError::ProductNotFound(_)
                | OrderError::OutOfStock(_)
                | OrderError::TotalOutOfRange
                | OrderError::StockChanged(_)
        )
    }

    /// Short label used for rejection metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::CustomerNotFound(_) => "customer_not_found",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ProductsNotFound => "products_not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::OutOfStock(_) => "out_of_stock",
            OrderError::TotalOutOfRange => "total_out_of_range",
            OrderError::StockChanged(_) => "stock_changed",
            OrderError::Store(_) => "store",
            OrderError::Persistence(_) => "persistence",
            OrderError::StockUpdate { .. } => "stock_update",
        }
    }
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
