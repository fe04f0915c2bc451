//! Notifications held by the in-process inbox.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::UserId;
use delivery::Notification;
use outbox_store::OutboxStore;

use crate::AppState;

/// GET /notifications/{user_id}: notifications delivered to one user.
pub async fn list<S: OutboxStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.notifications_for(user_id).await)
}
