//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use store::{
    CatalogProduct, Customer, CustomerDirectory, CustomerId, Money, NewLineItem, NewOrder,
    OrderId, OrderStore, PostgresStore, ProductCatalog, ProductId, QuantityUpdate, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool, cleared tables and a seeded catalog
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_line_items, orders, products, customers")
        .execute(&pool)
        .await
        .unwrap();

    let store = PostgresStore::new(pool);
    store
        .upsert_customer(&Customer::new("cust-1", "Ada", "ada@example.com"))
        .await
        .unwrap();
    store
        .upsert_product(&CatalogProduct::new(
            "SKU-001",
            "Widget",
            Money::from_cents(1000),
            5,
        ))
        .await
        .unwrap();
    store
        .upsert_product(&CatalogProduct::new(
            "SKU-002",
            "Gadget",
            Money::from_cents(250),
            2,
        ))
        .await
        .unwrap();
    store
}

fn new_order(items: &[(&str, i64, u32)]) -> NewOrder {
    NewOrder {
        customer: Customer::new("cust-1", "Ada", "ada@example.com"),
        line_items: items
            .iter()
            .map(|(id, cents, quantity)| NewLineItem {
                product_id: ProductId::new(*id),
                price: Money::from_cents(*cents),
                quantity: *quantity,
            })
            .collect(),
    }
}

async fn quantity_of(store: &PostgresStore, id: &str) -> u32 {
    store
        .find_products(&[ProductId::new(id)])
        .await
        .unwrap()
        .pop()
        .unwrap()
        .quantity
}

#[tokio::test]
async fn find_customer_by_id() {
    let store = get_test_store().await;

    let customer = store
        .find_customer(&CustomerId::new("cust-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.email, "ada@example.com");

    let missing = store.find_customer(&CustomerId::new("nobody")).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn find_products_returns_only_known_ids() {
    let store = get_test_store().await;

    let mut products = store
        .find_products(&[
            ProductId::new("SKU-001"),
            ProductId::new("SKU-404"),
            ProductId::new("SKU-002"),
        ])
        .await
        .unwrap();
    products.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id.as_str(), "SKU-001");
    assert_eq!(products[0].price, Money::from_cents(1000));
    assert_eq!(products[1].quantity, 2);
}

#[tokio::test]
async fn create_and_find_order_round_trip() {
    let store = get_test_store().await;

    let created = store
        .create_order(new_order(&[("SKU-002", 250, 1), ("SKU-001", 1000, 3)]))
        .await
        .unwrap();

    let loaded = store.find_order(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.customer, created.customer);
    assert_eq!(loaded.line_items, created.line_items);
    assert_eq!(loaded.total().cents(), 3250);
}

#[tokio::test]
async fn find_missing_order_returns_none() {
    let store = get_test_store().await;
    assert!(store.find_order(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_order_is_atomic() {
    let store = get_test_store().await;

    // The second line item references an unknown product, so the foreign key
    // rejects it and the order row must not survive either.
    let result = store
        .create_order(new_order(&[("SKU-001", 1000, 1), ("SKU-404", 100, 1)]))
        .await;
    assert!(matches!(result, Err(StoreError::Database(_))));

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
async fn delete_order_cascades_line_items() {
    let store = get_test_store().await;
    let order = store
        .create_order(new_order(&[("SKU-001", 1000, 1)]))
        .await
        .unwrap();

    store.delete_order(order.id).await.unwrap();

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_line_items")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(items, 0);
    assert!(store.find_order(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_quantities_applies_batch() {
    let store = get_test_store().await;

    store
        .update_quantities(&[
            QuantityUpdate {
                product_id: ProductId::new("SKU-001"),
                expected: 5,
                quantity: 2,
            },
            QuantityUpdate {
                product_id: ProductId::new("SKU-002"),
                expected: 2,
                quantity: 0,
            },
        ])
        .await
        .unwrap();

    assert_eq!(quantity_of(&store, "SKU-001").await, 2);
    assert_eq!(quantity_of(&store, "SKU-002").await, 0);
}

#[tokio::test]
async fn update_quantities_conflict_rolls_back_batch() {
    let store = get_test_store().await;

    let result = store
        .update_quantities(&[
            QuantityUpdate {
                product_id: ProductId::new("SKU-001"),
                expected: 5,
                quantity: 2,
            },
            QuantityUpdate {
                product_id: ProductId::new("SKU-002"),
                expected: 9,
                quantity: 0,
            },
        ])
        .await;

    assert!(matches!(
        result,
        Err(StoreError::QuantityConflict(ref id)) if id.as_str() == "SKU-002"
    ));
    assert_eq!(quantity_of(&store, "SKU-001").await, 5);
    assert_eq!(quantity_of(&store, "SKU-002").await, 2);
}

#[tokio::test]
async fn concurrent_conditional_updates_allow_one_winner() {
    let store = get_test_store().await;

    let update = [QuantityUpdate {
        product_id: ProductId::new("SKU-001"),
        expected: 5,
        quantity: 2,
    }];

    let (first, second) = tokio::join!(
        store.update_quantities(&update),
        store.update_quantities(&update)
    );

    let winners = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(quantity_of(&store, "SKU-001").await, 2);
}

#[tokio::test]
async fn opposite_order_batches_conflict_instead_of_deadlocking() {
    let store = get_test_store().await;

    let forward = [
        QuantityUpdate {
            product_id: ProductId::new("SKU-001"),
            expected: 5,
            quantity: 4,
        },
        QuantityUpdate {
            product_id: ProductId::new("SKU-002"),
            expected: 2,
            quantity: 1,
        },
    ];
    let backward = [forward[1].clone(), forward[0].clone()];

    let (first, second) = tokio::join!(
        store.update_quantities(&forward),
        store.update_quantities(&backward)
    );

    match (first, second) {
        (Ok(()), Err(StoreError::QuantityConflict(_)))
        | (Err(StoreError::QuantityConflict(_)), Ok(())) => {}
        (first, second) => {
            panic!("expected one winner and one conflict, got {first:?} and {second:?}")
        }
    }
    assert_eq!(quantity_of(&store, "SKU-001").await, 4);
    assert_eq!(quantity_of(&store, "SKU-002").await, 1);
}

#[tokio::test]
async fn negative_quantity_rejected_by_schema() {
    let store = get_test_store().await;

    let result = sqlx::query("UPDATE products SET quantity = -1 WHERE id = 'SKU-001'")
        .execute(store.pool())
        .await;
    assert!(result.is_err());
}
