//! Outbox health endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use delivery::{HealthReport, HealthStatus};
use outbox_store::OutboxStore;

use crate::AppState;
use crate::error::ApiError;

/// GET /health: runs the outbox health check.
///
/// Healthy and Degraded answer 200 so a lagging worker stays in rotation;
/// Unhealthy answers 503.
pub async fn check<S: OutboxStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<(StatusCode, Json<HealthReport>), ApiError> {
    let report = state.health.check().await?;
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, Json(report)))
}
