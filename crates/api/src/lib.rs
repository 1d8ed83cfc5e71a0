//! HTTP API server for order intake.
//!
//! Exposes order creation and lookup over REST, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Money;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::CreateOrderService;
use store::{
    CatalogProduct, Customer, CustomerDirectory, InMemoryStore, OrderStore, ProductCatalog,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// A storage backend serving all three collaborators of the order workflow.
pub trait Backend: CustomerDirectory + ProductCatalog + OrderStore + Clone + 'static {}

impl<T> Backend for T where T: CustomerDirectory + ProductCatalog + OrderStore + Clone + 'static {}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with the given backend serving as customer
/// directory, product catalog and order store.
pub fn create_state<S: Backend>(backend: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: CreateOrderService::new(backend.clone(), backend.clone(), backend),
    })
}

/// Customer seeded into the demo store.
pub const DEMO_CUSTOMER_ID: &str = "demo-customer";

/// Builds an in-memory store with one customer and a small catalog, so a
/// server started without a database can take orders right away.
pub async fn demo_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_customer(Customer::new(
            DEMO_CUSTOMER_ID,
            "Demo Customer",
            "demo@example.com",
        ))
        .await;
    for (id, name, cents, quantity) in [
        ("SKU-001", "Widget", 1000, 100),
        ("SKU-002", "Gadget", 250, 50),
        ("SKU-003", "Gizmo", 4999, 10),
    ] {
        store
            .insert_product(CatalogProduct::new(id, name, Money::from_cents(cents), quantity))
            .await;
    }
    store
}
