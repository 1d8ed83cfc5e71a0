//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use orders::{CreateOrderService, OrderRequest, RequestedItem};
use serde::{Deserialize, Serialize};
use store::{Order, OrderLineItem};

use crate::Backend;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Backend> {
    pub order_service: CreateOrderService<S, S, S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub products: Vec<OrderProductRequest>,
}

#[derive(Deserialize)]
pub struct OrderProductRequest {
    pub id: String,
    pub quantity: u32,
}

impl From<CreateOrderRequest> for OrderRequest {
    fn from(req: CreateOrderRequest) -> Self {
        OrderRequest::new(
            req.customer_id,
            req.products
                .into_iter()
                .map(|p| RequestedItem::new(p.id, p.quantity))
                .collect(),
        )
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer: CustomerResponse,
    pub line_items: Vec<LineItemResponse>,
    pub total_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub id: String,
    pub product_id: String,
    pub price_cents: i64,
    pub quantity: u32,
}

impl From<&OrderLineItem> for LineItemResponse {
    fn from(item: &OrderLineItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            price_cents: item.price.cents(),
            quantity: item.quantity,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            total_cents: order.total().cents(),
            line_items: order.line_items.iter().map(LineItemResponse::from).collect(),
            customer: CustomerResponse {
                id: order.customer.id.to_string(),
                name: order.customer.name,
                email: order.customer.email,
            },
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order for an existing customer.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.order_service.create_order(req.into()).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// GET /orders/:id: load an order with its line items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .order_service
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from(uuid))
}
