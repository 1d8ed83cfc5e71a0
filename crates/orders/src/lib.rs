//! Order creation workflow.
//!
//! [`CreateOrderService`] validates a customer and the requested products
//! against the catalog, captures line-item prices, persists the order and
//! then decrements stock in one conditional batch.

pub mod error;
pub mod request;
pub mod service;

pub use error::{OrderError, Result};
pub use request::{OrderRequest, RequestedItem};
pub use service::CreateOrderService;
