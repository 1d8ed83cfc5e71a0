//! Shared types for the order intake system.
//!
//! Identifiers are newtypes so customer, product, order and line-item ids
//! cannot be mixed up, and money is carried as integer cents.

mod ids;
mod money;

pub use ids::{CustomerId, LineItemId, OrderId, ProductId};
pub use money::Money;
