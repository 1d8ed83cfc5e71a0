use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogProduct, Customer, CustomerDirectory, CustomerId, LineItemId, Money, NewOrder, Order,
    OrderId, OrderLineItem, OrderStore, ProductCatalog, ProductId, QuantityUpdate, Result,
    StoreError,
};

/// PostgreSQL-backed customer directory, product catalog and order store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a customer, or refreshes its name and email if it exists.
    pub async fn upsert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                updated_at = NOW()
            "#,
        )
        .bind(customer.id.as_str())
        .bind(&customer.name)
        .bind(&customer.email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a product, or overwrites its name, price and quantity if it exists.
    pub async fn upsert_product(&self, product: &CatalogProduct) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<CatalogProduct> {
        Ok(CatalogProduct {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: to_quantity(row.try_get("quantity")?)?,
        })
    }

    fn row_to_line_item(row: PgRow) -> Result<OrderLineItem> {
        Ok(OrderLineItem {
            id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: to_quantity(row.try_get("quantity")?)?,
        })
    }
}

fn to_quantity(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("quantity {value} out of range")))
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn find_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, name, email FROM customers WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(Customer {
                id: CustomerId::new(row.try_get::<String, _>("id")?),
                name: row.try_get("name")?,
                email: row.try_get("email")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, quantity
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn update_quantities(&self, updates: &[QuantityUpdate]) -> Result<()> {
        // Rows are always locked in product id order so that two batches
        // touching the same products cannot deadlock.
        let mut ordered: Vec<&QuantityUpdate> = updates.iter().collect();
        ordered.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut tx = self.pool.begin().await?;

        for update in ordered {
            // A concurrent writer holding the row makes this wait, then the
            // predicate is re-checked against the committed quantity.
            let result = sqlx::query(
                r#"
                UPDATE products
                SET quantity = $1, updated_at = NOW()
                WHERE id = $2 AND quantity = $3
                "#,
            )
            .bind(i64::from(update.quantity))
            .bind(update.product_id.as_str())
            .bind(i64::from(update.expected))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(product_id = %update.product_id, "conditional quantity update missed");
                return Err(StoreError::QuantityConflict(update.product_id.clone()));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let order = Order::from_new(new_order, Utc::now());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer.id.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.line_items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::InvalidRecord("too many line items".to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO order_line_items
                    (id, order_id, product_id, position, price_cents, quantity, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(position)
            .bind(item.price.cents())
            .bind(i64::from(item.quantity))
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT o.id, o.created_at, o.updated_at,
                   c.id AS customer_id, c.name AS customer_name, c.email AS customer_email
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE o.id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id, product_id, price_cents, quantity
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let line_items = item_rows
            .into_iter()
            .map(Self::row_to_line_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer: Customer {
                id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
                name: row.try_get("customer_name")?,
                email: row.try_get("customer_email")?,
            },
            line_items,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
