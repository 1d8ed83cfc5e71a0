//! The order creation workflow.

use std::collections::HashMap;
use std::time::Instant;

use common::{Money, OrderId, ProductId};
use store::{
    CatalogProduct, CustomerDirectory, NewLineItem, NewOrder, Order, OrderLineItem, OrderStore,
    ProductCatalog, QuantityUpdate, StoreError,
};

use crate::error::{OrderError, Result};
use crate::request::{OrderRequest, RequestedItem};

/// Places orders against the product catalog.
///
/// Validation (customer, product existence, stock) only reads, so a rejected
/// request leaves no trace. A valid request is persisted first and the stock
/// decrement follows as a single conditional batch. If another order changed
/// the stock in between, the freshly created order is deleted again and the
/// request fails with [`OrderError::StockChanged`].
pub struct CreateOrderService<C, P, O>
where
    C: CustomerDirectory,
    P: ProductCatalog,
    O: OrderStore,
{
    customers: C,
    products: P,
    orders: O,
}

impl<C, P, O> CreateOrderService<C, P, O>
where
    C: CustomerDirectory,
    P: ProductCatalog,
    O: OrderStore,
{
    /// Creates a new service over the given collaborators.
    pub fn new(customers: C, products: P, orders: O) -> Self {
        Self {
            customers,
            products,
            orders,
        }
    }

    /// Creates an order for a customer, decrementing stock on success.
    ///
    /// Calling this twice with the same request places two orders.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, items = request.items.len())
    )]
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.place(request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_creation_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id,
                    line_items = order.line_items.len(),
                    total = %order.total(),
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.reason()).increment(1);
                if err.is_client_error() {
                    tracing::warn!(error = %err, "order rejected");
                } else {
                    tracing::error!(error = %err, "order creation failed");
                }
            }
        }

        result
    }

    /// Loads a previously created order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.find_order(order_id).await?)
    }

    async fn place(&self, request: OrderRequest) -> Result<Order> {
        let customer = self
            .customers
            .find_customer(&request.customer_id)
            .await?
            .ok_or_else(|| OrderError::CustomerNotFound(request.customer_id.clone()))?;

        if let Some(item) = request.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            });
        }

        let found = self
            .products
            .find_products(&request.distinct_product_ids())
            .await?;
        if found.is_empty() {
            return Err(OrderError::ProductsNotFound);
        }
        let catalog: HashMap<&ProductId, &CatalogProduct> =
            found.iter().map(|product| (&product.id, product)).collect();

        let resolved = resolve_items(&request.items, &catalog)?;
        check_stock(&resolved)?;
        order_total(&resolved)?;

        // Prices are captured here and never looked up again.
        let line_items = resolved
            .iter()
            .map(|(item, product)| NewLineItem {
                product_id: item.product_id.clone(),
                price: product.price,
                quantity: item.quantity,
            })
            .collect();

        let order = self
            .orders
            .create_order(NewOrder {
                customer,
                line_items,
            })
            .await
            .map_err(OrderError::Persistence)?;

        let outcome = match stock_decrements(&order.line_items, &catalog) {
            Ok(updates) => self.products.update_quantities(&updates).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            return Err(self.handle_failed_decrement(order.id, err).await);
        }

        Ok(order)
    }

    async fn handle_failed_decrement(&self, order_id: OrderId, err: StoreError) -> OrderError {
        match err {
            StoreError::QuantityConflict(product_id) => {
                metrics::counter!("order_stock_conflicts_total").increment(1);
                match self.orders.delete_order(order_id).await {
                    Ok(()) => {
                        tracing::warn!(
                            %order_id,
                            %product_id,
                            "stock changed concurrently, order withdrawn"
                        );
                        OrderError::StockChanged(product_id)
                    }
                    Err(delete_err) => {
                        metrics::counter!("order_inconsistencies_total").increment(1);
                        tracing::error!(
                            %order_id,
                            %product_id,
                            error = %delete_err,
                            "stock changed concurrently and the order could not be withdrawn; \
                             order exists without a stock decrement"
                        );
                        OrderError::StockUpdate {
                            order_id,
                            source: delete_err,
                        }
                    }
                }
            }
            other => {
                metrics::counter!("order_inconsistencies_total").increment(1);
                tracing::error!(
                    %order_id,
                    error = %other,
                    "order persisted but stock was not decremented; manual reconciliation required"
                );
                OrderError::StockUpdate {
                    order_id,
                    source: other,
                }
            }
        }
    }
}

/// Pairs every requested item with its catalog entry, failing on the first
/// item the catalog does not know.
fn resolve_items<'a>(
    items: &'a [RequestedItem],
    catalog: &HashMap<&ProductId, &'a CatalogProduct>,
) -> Result<Vec<(&'a RequestedItem, &'a CatalogProduct)>> {
    items
        .iter()
        .map(|item| match catalog.get(&item.product_id) {
            Some(product) => Ok((item, *product)),
            None => Err(OrderError::ProductNotFound(item.product_id.clone())),
        })
        .collect()
}

/// Each entry must fit the stock on its own; entries for the same product
/// must also fit together.
fn check_stock(resolved: &[(&RequestedItem, &CatalogProduct)]) -> Result<()> {
    if let Some((item, _)) = resolved
        .iter()
        .find(|(item, product)| product.quantity < item.quantity)
    {
        return Err(OrderError::OutOfStock(item.product_id.clone()));
    }

    let mut requested: HashMap<&ProductId, u64> = HashMap::new();
    for (item, product) in resolved {
        let total = requested.entry(&item.product_id).or_insert(0);
        *total += u64::from(item.quantity);
        if *total > u64::from(product.quantity) {
            return Err(OrderError::OutOfStock(item.product_id.clone()));
        }
    }

    Ok(())
}

/// Sum of `price * quantity` over the resolved items, refusing totals that
/// cannot be represented.
fn order_total(resolved: &[(&RequestedItem, &CatalogProduct)]) -> Result<Money> {
    resolved
        .iter()
        .try_fold(Money::zero(), |total, (item, product)| {
            product
                .price
                .checked_multiply(item.quantity)
                .and_then(|line| total.checked_add(line))
        })
        .ok_or(OrderError::TotalOutOfRange)
}

/// One conditional update per product, in first-appearance order, covering
/// every persisted line item.
fn stock_decrements(
    line_items: &[OrderLineItem],
    catalog: &HashMap<&ProductId, &CatalogProduct>,
) -> std::result::Result<Vec<QuantityUpdate>, StoreError> {
    let mut updates: Vec<QuantityUpdate> = Vec::new();

    for line in line_items {
        let index = match updates.iter().position(|u| u.product_id == line.product_id) {
            Some(index) => index,
            None => {
                let product = catalog.get(&line.product_id).ok_or_else(|| {
                    StoreError::InvalidRecord(format!(
                        "persisted line item references unrequested product {}",
                        line.product_id
                    ))
                })?;
                updates.push(QuantityUpdate {
                    product_id: line.product_id.clone(),
                    expected: product.quantity,
                    quantity: product.quantity,
                });
                updates.len() - 1
            }
        };

        let update = &mut updates[index];
        update.quantity = update.quantity.checked_sub(line.quantity).ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "line items exceed stock of product {}",
                line.product_id
            ))
        })?;
    }

    Ok(updates)
}
