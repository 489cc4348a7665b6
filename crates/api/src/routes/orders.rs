//! Order intake endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{Money, Order, OrderLine, Product};
use orders::CreateOrderRequest;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderBody {
    #[serde(default)]
    pub products: Vec<OrderLineBody>,
}

#[derive(Deserialize)]
pub struct OrderLineBody {
    pub product: ProductBody,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ProductBody {
    pub code: String,
    pub unit_value_cents: i64,
}

impl CreateOrderBody {
    fn into_request(self) -> Result<CreateOrderRequest, ApiError> {
        let products = self
            .products
            .into_iter()
            .map(|line| {
                if line.product.unit_value_cents < 0 {
                    return Err(ApiError::BadRequest(format!(
                        "Unit value of product {} must not be negative",
                        line.product.code
                    )));
                }
                Ok(OrderLine::new(
                    Product::new(line.product.code, Money::from_cents(line.product.unit_value_cents)),
                    line.quantity,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CreateOrderRequest { products })
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub transaction_id: String,
    pub created_at: String,
    pub products: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub code: String,
    pub unit_value_cents: i64,
    pub quantity: u32,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            transaction_id: order.transaction_id.to_string(),
            created_at: order.created_at.to_rfc3339(),
            products: order
                .products
                .into_iter()
                .map(|line| OrderLineResponse {
                    code: line.product.code,
                    unit_value_cents: line.product.unit_value.cents(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /api/order: accept an order and start its saga.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let request = body.into_request()?;
    let order = state.orders.create_order(request).await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}
