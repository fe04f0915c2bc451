//! Read-only view of the dead-letter backlog.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use outbox_store::{OutboxRecord, OutboxStore};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<usize>,
}

/// GET /dead-letters?limit=N: lists dead-lettered records, oldest first.
pub async fn list<S: OutboxStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<DeadLetterQuery>,
) -> Result<Json<Vec<OutboxRecord>>, ApiError> {
    let limit = match query.limit {
        Some(0) => return Err(ApiError::BadRequest("limit must be positive".to_string())),
        Some(limit) => limit.min(MAX_LIMIT),
        None => DEFAULT_LIMIT,
    };

    let records = state.store.list_dead_letters(limit).await?;
    Ok(Json(records))
}
