//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use broker::BrokerError;
use event_store::EventStoreError;
use orders::OrderError;
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order intake or audit query error.
    Orders(OrderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Orders(err) => order_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match &err {
        OrderError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderError::Store(_) | OrderError::Publish(_) | OrderError::Encode(_) => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Orders(err)
    }
}

/// Errors raised while bringing the process up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
