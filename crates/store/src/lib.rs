//! Storage collaborators for order intake.
//!
//! Defines the narrow traits the order workflow consumes
//! ([`CustomerDirectory`], [`ProductCatalog`], [`OrderStore`]) together with
//! an in-memory adapter for tests and a PostgreSQL adapter for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{CustomerId, LineItemId, Money, OrderId, ProductId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    CatalogProduct, Customer, NewLineItem, NewOrder, Order, OrderLineItem, QuantityUpdate,
};
pub use postgres::PostgresStore;
pub use store::{CustomerDirectory, OrderStore, ProductCatalog};
