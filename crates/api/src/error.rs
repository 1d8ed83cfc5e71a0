//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order workflow error.
    Order(OrderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => order_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    let status = match &err {
        OrderError::CustomerNotFound(_)
        | OrderError::InvalidQuantity { .. }
        | OrderError::ProductsNotFound
        | OrderError::ProductNotFound(_) => StatusCode::BAD_REQUEST,
        OrderError::OutOfStock(_) | OrderError::TotalOutOfRange => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OrderError::StockChanged(_) => StatusCode::CONFLICT,
        OrderError::Store(_) | OrderError::Persistence(_) | OrderError::StockUpdate { .. } => {
            tracing::error!(error = %err, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    (status, err.to_string())
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}
