//! Outbox delivery worker.
//!
//! Hosts the background poller next to a small HTTP surface exposing the
//! outbox health check, the dead-letter backlog, delivered notifications and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::SharedClock;
use delivery::{
    AuditLogSubscriber, CollaboratorNotificationSubscriber, HealthCheckOptions,
    InMemoryNotificationInbox, OutboxHealthCheck, SubscriberRegistry,
};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox_store::OutboxStore;
use tower_http::trace::TraceLayer;

/// Shared state of the HTTP handlers.
pub struct AppState<S: OutboxStore> {
    pub store: S,
    pub health: OutboxHealthCheck<S>,
    pub notifications: InMemoryNotificationInbox,
}

impl<S: OutboxStore + Clone> AppState<S> {
    pub fn new(
        store: S,
        clock: SharedClock,
        health: HealthCheckOptions,
        notifications: InMemoryNotificationInbox,
    ) -> Self {
        Self {
            health: OutboxHealthCheck::new(store.clone(), clock, health),
            store,
            notifications,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OutboxStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/dead-letters", get(routes::dead_letters::list::<S>))
        .route("/notifications/{user_id}", get(routes::notifications::list::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Builds the registry of subscribers the worker delivers to.
///
/// Returns the notification inbox the collaborator subscriber writes to, which
/// [`AppState`] serves back over HTTP.
pub fn default_registry() -> (SubscriberRegistry, InMemoryNotificationInbox) {
    let inbox = InMemoryNotificationInbox::new();
    let mut registry = SubscriberRegistry::new();
    AuditLogSubscriber::register(&mut registry);
    CollaboratorNotificationSubscriber::new(inbox.clone()).register(&mut registry);
    (registry, inbox)
}
