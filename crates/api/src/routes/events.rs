//! Audit queries over the saga event log.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::{OrderId, TransactionId};
use domain::Event;
use orders::EventFilter;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
}

impl EventQuery {
    fn into_filter(self) -> Result<EventFilter, ApiError> {
        let order_id = self
            .order_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| {
                uuid::Uuid::parse_str(id.trim())
                    .map(OrderId::from_uuid)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid order_id: {e}")))
            })
            .transpose()?;

        Ok(EventFilter {
            order_id,
            transaction_id: self.transaction_id.map(TransactionId::new),
        })
    }
}

/// GET /api/event: latest event for an order or transaction.
#[tracing::instrument(skip(state))]
pub async fn find_by_filter(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Event>, ApiError> {
    let filter = query.into_filter()?;
    Ok(Json(state.events.find_by_filter(&filter).await?))
}

/// GET /api/event/all: every recorded event, newest first.
pub async fn find_all(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.find_all().await?))
}
